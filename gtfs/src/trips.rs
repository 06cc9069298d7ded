use serde::{Deserialize, Serialize};

use crate::entity::{entity_basics, require};
use crate::{files, Entity, EntityError, EntityMap, Problems};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub route_id: String,
    pub service_id: String,
    pub trip_id: String,
    #[serde(default)]
    pub trip_headsign: Option<String>,
    #[serde(default)]
    pub trip_short_name: Option<String>,
    /// 0 and 1 are arbitrary, but consistent within a route
    #[serde(default)]
    pub direction_id: Option<i32>,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub shape_id: Option<String>,
    #[serde(default)]
    pub wheelchair_accessible: Option<i32>,
    #[serde(default)]
    pub bikes_allowed: Option<i32>,

    /// Assigned while copying; trips visiting the same stops in the same order share this
    #[serde(skip)]
    pub stop_pattern_id: i32,
    #[serde(skip)]
    pub problems: Problems,
}

impl Trip {
    pub fn shape(&self) -> Option<&str> {
        self.shape_id.as_deref().filter(|x| !x.is_empty())
    }
}

impl Entity for Trip {
    entity_basics!(files::TRIPS, trip_id);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "trip_id", &self.trip_id);
        require(&mut errors, "route_id", &self.route_id);
        require(&mut errors, "service_id", &self.service_id);
        for (field, value, max) in [
            ("direction_id", self.direction_id, 1),
            ("wheelchair_accessible", self.wheelchair_accessible, 2),
            ("bikes_allowed", self.bikes_allowed, 2),
        ] {
            if let Some(x) = value {
                if !(0..=max).contains(&x) {
                    errors.push(EntityError::invalid(field, x));
                }
            }
        }
        errors
    }

    fn update_keys(&mut self, emap: &EntityMap) -> Result<(), EntityError> {
        emap.resolve(files::ROUTES, "route_id", &mut self.route_id)?;
        emap.resolve(files::CALENDAR, "service_id", &mut self.service_id)?;
        emap.resolve_optional(files::SHAPES, "shape_id", &mut self.shape_id)
    }
}
