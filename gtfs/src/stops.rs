use serde::{Deserialize, Serialize};

use crate::entity::{entity_basics, is_blank, require, require_optional};
use crate::{files, Entity, EntityError, EntityMap, ErrorKind, Problems};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    #[serde(default)]
    pub stop_code: Option<String>,
    #[serde(default)]
    pub stop_name: Option<String>,
    #[serde(default)]
    pub stop_desc: Option<String>,
    #[serde(default)]
    pub stop_lat: Option<f64>,
    #[serde(default)]
    pub stop_lon: Option<f64>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub stop_url: Option<String>,
    #[serde(default)]
    pub location_type: Option<i32>,
    #[serde(default)]
    pub parent_station: Option<String>,
    #[serde(default)]
    pub stop_timezone: Option<String>,
    #[serde(default)]
    pub wheelchair_boarding: Option<i32>,
    #[serde(default)]
    pub platform_code: Option<String>,

    #[serde(skip)]
    pub problems: Problems,
}

/// location_type values
pub const STOP_OR_PLATFORM: i32 = 0;
pub const STATION: i32 = 1;
pub const ENTRANCE: i32 = 2;
pub const GENERIC_NODE: i32 = 3;
pub const BOARDING_AREA: i32 = 4;

impl Stop {
    /// An empty location_type means a stop or platform
    pub fn location_type(&self) -> i32 {
        self.location_type.unwrap_or(STOP_OR_PLATFORM)
    }

    /// (lon, lat), if both are present
    pub fn lon_lat(&self) -> Option<(f64, f64)> {
        match (self.stop_lon, self.stop_lat) {
            (Some(lon), Some(lat)) => Some((lon, lat)),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent_station.as_deref().filter(|x| !x.is_empty())
    }

    /// The location type a declared parent must have, if this kind of stop may have a parent.
    pub fn expected_parent_type(&self) -> Option<i32> {
        match self.location_type() {
            STOP_OR_PLATFORM | ENTRANCE | GENERIC_NODE => Some(STATION),
            BOARDING_AREA => Some(STOP_OR_PLATFORM),
            _ => None,
        }
    }
}

impl Entity for Stop {
    entity_basics!(files::STOPS, stop_id);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "stop_id", &self.stop_id);
        let location_type = self.location_type();
        if !(STOP_OR_PLATFORM..=BOARDING_AREA).contains(&location_type) {
            errors.push(EntityError::invalid("location_type", location_type));
            return errors;
        }

        // Stops, stations and entrances must be locatable and named
        if location_type <= ENTRANCE {
            require_optional(&mut errors, "stop_name", &self.stop_name);
            match self.stop_lat {
                None => errors.push(EntityError::required("stop_lat")),
                Some(lat) if !(-90.0..=90.0).contains(&lat) => {
                    errors.push(EntityError::invalid("stop_lat", lat))
                }
                _ => {}
            }
            match self.stop_lon {
                None => errors.push(EntityError::required("stop_lon")),
                Some(lon) if !(-180.0..=180.0).contains(&lon) => {
                    errors.push(EntityError::invalid("stop_lon", lon))
                }
                _ => {}
            }
        }

        if location_type == STATION && !is_blank(&self.parent_station) {
            errors.push(
                EntityError::new(ErrorKind::InvalidParentStation)
                    .field("parent_station")
                    .value(self.parent().unwrap_or(""))
                    .message("stations can't have a parent"),
            );
        }
        if location_type >= ENTRANCE && is_blank(&self.parent_station) {
            errors.push(EntityError::required("parent_station"));
        }
        if let Some(wheelchair) = self.wheelchair_boarding {
            if !(0..=2).contains(&wheelchair) {
                errors.push(EntityError::invalid("wheelchair_boarding", wheelchair));
            }
        }
        errors
    }

    fn check_warnings(&self) -> Vec<EntityError> {
        let mut warnings = Vec::new();
        if let Some((lon, lat)) = self.lon_lat() {
            if lon == 0.0 && lat == 0.0 {
                warnings.push(EntityError::new(ErrorKind::ZeroCoordinates).field("stop_lat"));
            }
        }
        warnings
    }

    fn update_keys(&mut self, emap: &EntityMap) -> Result<(), EntityError> {
        emap.resolve_optional(files::STOPS, "parent_station", &mut self.parent_station)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, location_type: i32) -> Stop {
        Stop {
            stop_id: id.to_string(),
            stop_name: Some(id.to_string()),
            stop_lat: Some(47.6),
            stop_lon: Some(-122.3),
            location_type: Some(location_type),
            ..Default::default()
        }
    }

    #[test]
    fn platforms_may_omit_parents() {
        assert!(stop("p", STOP_OR_PLATFORM).validate().is_empty());
    }

    #[test]
    fn nodes_need_parents() {
        let errors = stop("n", GENERIC_NODE).validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "parent_station");
    }

    #[test]
    fn stations_cant_have_parents() {
        let mut station = stop("st", STATION);
        station.parent_station = Some("other".to_string());
        let errors = station.validate();
        assert_eq!(errors[0].kind, ErrorKind::InvalidParentStation);
    }

    #[test]
    fn coordinates_are_checked() {
        let mut platform = stop("p", STOP_OR_PLATFORM);
        platform.stop_lat = Some(91.0);
        platform.stop_lon = None;
        let fields: Vec<String> = platform.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["stop_lat", "stop_lon"]);
    }
}
