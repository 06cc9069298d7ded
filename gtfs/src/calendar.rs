use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entity::{entity_basics, require};
use crate::serde_helpers::{deserialize_date, parse_bool, serialize_bool, serialize_date};
use crate::{files, Entity, EntityError, EntityMap, Problems};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub service_id: String,
    #[serde(deserialize_with = "parse_bool", serialize_with = "serialize_bool")]
    pub monday: bool,
    #[serde(deserialize_with = "parse_bool", serialize_with = "serialize_bool")]
    pub tuesday: bool,
    #[serde(deserialize_with = "parse_bool", serialize_with = "serialize_bool")]
    pub wednesday: bool,
    #[serde(deserialize_with = "parse_bool", serialize_with = "serialize_bool")]
    pub thursday: bool,
    #[serde(deserialize_with = "parse_bool", serialize_with = "serialize_bool")]
    pub friday: bool,
    #[serde(deserialize_with = "parse_bool", serialize_with = "serialize_bool")]
    pub saturday: bool,
    #[serde(deserialize_with = "parse_bool", serialize_with = "serialize_bool")]
    pub sunday: bool,
    #[serde(deserialize_with = "deserialize_date", serialize_with = "serialize_date")]
    pub start_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_date", serialize_with = "serialize_date")]
    pub end_date: NaiveDate,

    /// Not from the source; made up to give a calendar_dates-only service a row here
    #[serde(skip)]
    pub generated: bool,
    #[serde(skip)]
    pub problems: Problems,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            service_id: String::new(),
            monday: false,
            tuesday: false,
            wednesday: false,
            thursday: false,
            friday: false,
            saturday: false,
            sunday: false,
            start_date: NaiveDate::MIN,
            end_date: NaiveDate::MIN,
            generated: false,
            problems: Problems::default(),
        }
    }
}

impl Calendar {
    /// A calendar that runs on no day of the week, covering the given range. Its service is
    /// entirely described by calendar_dates.
    pub fn from_dates(service_id: &str, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            service_id: service_id.to_string(),
            start_date,
            end_date,
            generated: true,
            ..Default::default()
        }
    }

    pub fn days_of_week(&self) -> [bool; 7] {
        [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday,
        ]
    }
}

impl Entity for Calendar {
    entity_basics!(files::CALENDAR, service_id);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "service_id", &self.service_id);
        if self.end_date < self.start_date {
            errors.push(
                EntityError::invalid("end_date", self.end_date.format("%Y%m%d"))
                    .message("ends before it starts"),
            );
        }
        errors
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarDate {
    pub service_id: String,
    #[serde(deserialize_with = "deserialize_date", serialize_with = "serialize_date")]
    pub date: NaiveDate,
    /// 1 adds service on this date, 2 removes it
    pub exception_type: u8,

    #[serde(skip)]
    pub problems: Problems,
}

pub const SERVICE_ADDED: u8 = 1;
pub const SERVICE_REMOVED: u8 = 2;

impl Default for CalendarDate {
    fn default() -> Self {
        Self {
            service_id: String::new(),
            date: NaiveDate::MIN,
            exception_type: SERVICE_ADDED,
            problems: Problems::default(),
        }
    }
}

impl Entity for CalendarDate {
    entity_basics!(files::CALENDAR_DATES);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "service_id", &self.service_id);
        if self.exception_type != SERVICE_ADDED && self.exception_type != SERVICE_REMOVED {
            errors.push(EntityError::invalid("exception_type", self.exception_type));
        }
        errors
    }

    fn update_keys(&mut self, emap: &EntityMap) -> Result<(), EntityError> {
        emap.resolve(files::CALENDAR, "service_id", &mut self.service_id)
    }
}
