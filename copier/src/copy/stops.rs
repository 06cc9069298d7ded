use gtfs::{files, Entity, EntityError, ErrorKind, Stop, BOARDING_AREA, STATION};

use super::Copier;

impl<'a> Copier<'a> {
    /// Stations first, then what can sit in a station, then boarding areas, which sit on
    /// platforms. Each pass can check a stop's parent was copied with the right location type.
    pub(super) fn copy_stops(&mut self) {
        for pass in 0..3 {
            let Some(stops) = self.read(files::STOPS, |r| r.stops()) else {
                return;
            };
            for stop in stops {
                let in_pass = match stop.location_type() {
                    STATION => 0,
                    BOARDING_AREA => 2,
                    _ => 1,
                };
                if in_pass == pass {
                    self.copy_stop(stop);
                }
            }
        }
        info!("Copied {} stops", self.result.written(files::STOPS));
    }

    fn copy_stop(&mut self, mut stop: Stop) {
        if let (Some(parent), Some(expected)) = (stop.parent(), stop.expected_parent_type()) {
            // A parent that wasn't copied at all shows up as a reference error instead
            if let Some(actual) = self.location_types.get(parent) {
                if *actual != expected {
                    let err = EntityError::new(ErrorKind::InvalidParentStation)
                        .field("parent_station")
                        .value(parent)
                        .message(format!(
                            "parent has location_type {actual}, but should have {expected}"
                        ));
                    stop.add_error(err);
                }
            }
        }

        let source = stop.clone();
        if self.copy_entity(stop).is_some() {
            self.geom.add_stop(&source);
            let location_type = source.location_type();
            self.location_types.insert(source.stop_id, location_type);
        }
    }

    pub(super) fn copy_fares(&mut self) {
        if let Some(fares) = self.read(files::FARE_ATTRIBUTES, |r| r.fare_attributes()) {
            for mut fare in fares {
                if fare.agency_id.as_deref().unwrap_or("").is_empty() {
                    fare.agency_id = self.default_agency_id.clone();
                }
                self.copy_entity(fare);
            }
        }
        if let Some(rules) = self.read(files::FARE_RULES, |r| r.fare_rules()) {
            for rule in rules {
                self.copy_entity(rule);
            }
        }
    }
}
