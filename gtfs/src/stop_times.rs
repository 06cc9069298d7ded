use serde::{Deserialize, Serialize};

use crate::entity::{entity_basics, require};
use crate::serde_helpers::{deserialize_optional_time, serialize_optional_time};
use crate::{files, Entity, EntityError, EntityMap, ErrorKind, Problems};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    /// Seconds after midnight of the service day
    #[serde(
        default,
        deserialize_with = "deserialize_optional_time",
        serialize_with = "serialize_optional_time"
    )]
    pub arrival_time: Option<u32>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_time",
        serialize_with = "serialize_optional_time"
    )]
    pub departure_time: Option<u32>,
    pub stop_id: String,
    pub stop_sequence: u32,
    #[serde(default)]
    pub stop_headsign: Option<String>,
    #[serde(default)]
    pub pickup_type: Option<i32>,
    #[serde(default)]
    pub drop_off_type: Option<i32>,
    #[serde(default)]
    pub shape_dist_traveled: Option<f64>,
    #[serde(default)]
    pub timepoint: Option<i32>,

    /// Set when the times were filled in, rather than coming from the source
    #[serde(skip)]
    pub interpolated: bool,
    #[serde(skip)]
    pub problems: Problems,
}

impl StopTime {
    /// The time a vehicle leaves this stop, preferring departure_time
    pub fn leaves_at(&self) -> Option<u32> {
        self.departure_time.or(self.arrival_time)
    }

    /// The time a vehicle reaches this stop, preferring arrival_time
    pub fn arrives_at(&self) -> Option<u32> {
        self.arrival_time.or(self.departure_time)
    }

    pub fn has_times(&self) -> bool {
        self.arrival_time.is_some() || self.departure_time.is_some()
    }

    /// A stop with only one of arrival_time and departure_time dwells for zero seconds. Returns
    /// true if a time was copied over.
    pub fn fill_counterpart_time(&mut self) -> bool {
        match (self.arrival_time, self.departure_time) {
            (Some(arrival), None) => {
                self.departure_time = Some(arrival);
                true
            }
            (None, Some(departure)) => {
                self.arrival_time = Some(departure);
                true
            }
            _ => false,
        }
    }
}

impl Entity for StopTime {
    entity_basics!(files::STOP_TIMES);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "trip_id", &self.trip_id);
        require(&mut errors, "stop_id", &self.stop_id);
        if let (Some(arrival), Some(departure)) = (self.arrival_time, self.departure_time) {
            if arrival > departure {
                errors.push(
                    EntityError::invalid("departure_time", departure)
                        .message(format!("departs before arriving at {arrival}")),
                );
            }
        }
        for (field, value) in [
            ("pickup_type", self.pickup_type),
            ("drop_off_type", self.drop_off_type),
        ] {
            if let Some(x) = value {
                if !(0..=3).contains(&x) {
                    errors.push(EntityError::invalid(field, x));
                }
            }
        }
        if let Some(timepoint) = self.timepoint {
            if !(0..=1).contains(&timepoint) {
                errors.push(EntityError::invalid("timepoint", timepoint));
            }
        }
        if let Some(dist) = self.shape_dist_traveled {
            if dist < 0.0 {
                errors.push(EntityError::invalid("shape_dist_traveled", dist));
            }
        }
        errors
    }

    fn update_keys(&mut self, emap: &EntityMap) -> Result<(), EntityError> {
        emap.resolve(files::TRIPS, "trip_id", &mut self.trip_id)?;
        emap.resolve(files::STOPS, "stop_id", &mut self.stop_id)
    }
}

/// Validates all of the stop times for one trip, already sorted by stop_sequence. Returns the
/// problems with the sequence as a whole, followed by the problems with individual rows.
pub fn validate_stop_time_sequence(stop_times: &[StopTime]) -> Vec<EntityError> {
    let mut errors = Vec::new();
    let trip_id = stop_times
        .first()
        .map(|st| st.trip_id.clone())
        .unwrap_or_default();

    if stop_times.len() < 2 {
        errors.push(
            EntityError::new(ErrorKind::SequenceTooFewStops)
                .field("stop_sequence")
                .value(stop_times.len()),
        );
    }
    if let Some(first) = stop_times.first() {
        if !first.has_times() {
            errors.push(
                EntityError::new(ErrorKind::SequenceMissingTime)
                    .field("departure_time")
                    .message("the first stop must have a time"),
            );
        }
    }
    if let Some(last) = stop_times.last() {
        if stop_times.len() > 1 && !last.has_times() {
            errors.push(
                EntityError::new(ErrorKind::SequenceMissingTime)
                    .field("arrival_time")
                    .message("the last stop must have a time"),
            );
        }
    }

    let mut last_time: Option<u32> = None;
    for pair in stop_times.windows(2) {
        if pair[1].stop_sequence <= pair[0].stop_sequence {
            errors.push(
                EntityError::invalid("stop_sequence", pair[1].stop_sequence)
                    .message("stop_sequence must increase"),
            );
        }
    }
    for st in stop_times {
        if let Some(arrival) = st.arrives_at() {
            if let Some(prev) = last_time {
                if arrival < prev {
                    errors.push(
                        EntityError::new(ErrorKind::SequenceTimeDecrease)
                            .field("arrival_time")
                            .value(crate::serde_helpers::format_time(arrival)),
                    );
                }
            }
        }
        if let Some(t) = st.leaves_at() {
            last_time = Some(t);
        }
    }

    for st in stop_times {
        errors.extend(st.errors());
    }
    errors
        .into_iter()
        .map(|err| err.in_entity(files::STOP_TIMES, &trip_id))
        .collect()
}
