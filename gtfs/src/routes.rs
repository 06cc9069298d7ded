use serde::{Deserialize, Serialize};

use crate::entity::{entity_basics, is_blank, require};
use crate::{files, Entity, EntityError, EntityMap, ErrorKind, Problems};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
    #[serde(default)]
    pub route_desc: Option<String>,
    pub route_type: i32,
    #[serde(default)]
    pub route_url: Option<String>,
    #[serde(default)]
    pub route_color: Option<String>,
    #[serde(default)]
    pub route_text_color: Option<String>,
    #[serde(default)]
    pub route_sort_order: Option<i32>,

    #[serde(skip)]
    pub problems: Problems,
}

/// The basic GTFS route types. Extended types collapse onto these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RouteType {
    Tram = 0,
    Subway = 1,
    Rail = 2,
    Bus = 3,
    Ferry = 4,
    CableTram = 5,
    AerialLift = 6,
    Funicular = 7,
}

impl RouteType {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Maps a basic or extended route type to the closest basic type. Types with no sensible
    /// basic equivalent, like air service or taxis, return None.
    pub fn basic(code: i32) -> Option<Self> {
        use RouteType::*;
        match code {
            0 => Some(Tram),
            1 => Some(Subway),
            2 => Some(Rail),
            3 => Some(Bus),
            4 => Some(Ferry),
            5 => Some(CableTram),
            6 => Some(AerialLift),
            7 => Some(Funicular),
            // Trolleybus and monorail
            11 => Some(Bus),
            12 => Some(Rail),
            100..=199 => Some(Rail),
            200..=299 => Some(Bus),
            300..=399 => Some(Rail),
            400..=699 => Some(Subway),
            700..=899 => Some(Bus),
            900..=999 => Some(Tram),
            1000..=1099 => Some(Ferry),
            1200..=1299 => Some(Ferry),
            1300..=1399 => Some(AerialLift),
            1400..=1499 => Some(Funicular),
            _ => None,
        }
    }
}

/// Basic types, the two newer basic ones, and the extended ranges
pub fn is_known_route_type(code: i32) -> bool {
    matches!(code, 0..=7 | 11 | 12 | 100..=1799)
}

impl Entity for Route {
    entity_basics!(files::ROUTES, route_id);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "route_id", &self.route_id);
        if is_blank(&self.route_short_name) && is_blank(&self.route_long_name) {
            errors.push(
                EntityError::required("route_short_name")
                    .message("route_short_name or route_long_name must be set"),
            );
        }
        if !is_known_route_type(self.route_type) {
            errors.push(EntityError::invalid("route_type", self.route_type));
        }
        for (field, color) in [
            ("route_color", &self.route_color),
            ("route_text_color", &self.route_text_color),
        ] {
            if let Some(color) = color {
                if !is_color(color) {
                    errors.push(EntityError::invalid(field, color));
                }
            }
        }
        errors
    }

    fn check_warnings(&self) -> Vec<EntityError> {
        let mut warnings = Vec::new();
        if let (Some(short), Some(long)) = (&self.route_short_name, &self.route_long_name) {
            if !short.is_empty() && short == long {
                warnings.push(
                    EntityError::new(ErrorKind::RouteNamesEqual)
                        .field("route_long_name")
                        .value(long),
                );
            }
        }
        warnings
    }

    fn update_keys(&mut self, emap: &EntityMap) -> Result<(), EntityError> {
        emap.resolve_optional(files::AGENCY, "agency_id", &mut self.agency_id)
    }
}

fn is_color(x: &str) -> bool {
    x.is_empty() || (x.len() == 6 && x.chars().all(|c| c.is_ascii_hexdigit()))
}
