use anyhow::Result;
use serde::Deserialize;

/// How forgiving a copy is, and what it's allowed to make up.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Copy entities even if they have field-level errors
    pub allow_entity_errors: bool,
    /// Copy entities even if a foreign key doesn't resolve. The key is left as it was in the
    /// source.
    pub allow_reference_errors: bool,
    /// Fill in missing stop time distances and times
    pub interpolate_stop_times: bool,
    /// Make up a shape from the stops for trips without one
    pub create_missing_shapes: bool,
    /// Give services that only appear in calendar_dates.txt a calendar.txt row
    pub normalize_service_ids: bool,
    /// Collapse extended route types into the basic 0-7 range
    pub use_basic_route_types: bool,
    /// How many stop times to write at once
    pub batch_size: usize,
    /// How many examples of each kind of error to keep per file
    pub error_limit: usize,
    /// Filled into routes and fare attributes with no agency_id. If unset and the feed has
    /// exactly one agency, that agency is used.
    pub default_agency_id: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_entity_errors: false,
            allow_reference_errors: false,
            interpolate_stop_times: false,
            create_missing_shapes: false,
            normalize_service_ids: false,
            use_basic_route_types: false,
            batch_size: 1000,
            error_limit: 1000,
            default_agency_id: None,
        }
    }
}

impl Options {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| anyhow!("bad copy options: {err}"))
    }
}
