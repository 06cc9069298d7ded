use serde::{Deserialize, Serialize};

use crate::entity::{entity_basics, require};
use crate::serde_helpers::{deserialize_time, serialize_time};
use crate::{files, Entity, EntityError, EntityMap, Problems};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    pub trip_id: String,
    #[serde(deserialize_with = "deserialize_time", serialize_with = "serialize_time")]
    pub start_time: u32,
    #[serde(deserialize_with = "deserialize_time", serialize_with = "serialize_time")]
    pub end_time: u32,
    pub headway_secs: u32,
    #[serde(default)]
    pub exact_times: Option<i32>,

    #[serde(skip)]
    pub problems: Problems,
}

impl Entity for Frequency {
    entity_basics!(files::FREQUENCIES);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "trip_id", &self.trip_id);
        if self.end_time <= self.start_time {
            errors.push(
                EntityError::invalid("end_time", self.end_time)
                    .message("must be after start_time"),
            );
        }
        if self.headway_secs == 0 {
            errors.push(EntityError::invalid("headway_secs", self.headway_secs));
        }
        if let Some(exact) = self.exact_times {
            if !(0..=1).contains(&exact) {
                errors.push(EntityError::invalid("exact_times", exact));
            }
        }
        errors
    }

    fn update_keys(&mut self, emap: &EntityMap) -> Result<(), EntityError> {
        emap.resolve(files::TRIPS, "trip_id", &mut self.trip_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub from_stop_id: String,
    pub to_stop_id: String,
    #[serde(default)]
    pub transfer_type: i32,
    #[serde(default)]
    pub min_transfer_time: Option<u32>,

    #[serde(skip)]
    pub problems: Problems,
}

/// Transfers of this type need min_transfer_time
pub const TIMED_TRANSFER: i32 = 2;

impl Entity for Transfer {
    entity_basics!(files::TRANSFERS);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "from_stop_id", &self.from_stop_id);
        require(&mut errors, "to_stop_id", &self.to_stop_id);
        if !(0..=5).contains(&self.transfer_type) {
            errors.push(EntityError::invalid("transfer_type", self.transfer_type));
        }
        if self.transfer_type == TIMED_TRANSFER && self.min_transfer_time.is_none() {
            errors.push(EntityError::required("min_transfer_time"));
        }
        errors
    }

    fn update_keys(&mut self, emap: &EntityMap) -> Result<(), EntityError> {
        emap.resolve(files::STOPS, "from_stop_id", &mut self.from_stop_id)?;
        emap.resolve(files::STOPS, "to_stop_id", &mut self.to_stop_id)
    }
}
