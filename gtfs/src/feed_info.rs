use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entity::{entity_basics, require};
use crate::serde_helpers::{deserialize_optional_date, serialize_optional_date};
use crate::{files, Entity, EntityError, Problems};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub feed_publisher_name: String,
    pub feed_publisher_url: String,
    pub feed_lang: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_date",
        serialize_with = "serialize_optional_date"
    )]
    pub feed_start_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_date",
        serialize_with = "serialize_optional_date"
    )]
    pub feed_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub feed_version: Option<String>,
    #[serde(default)]
    pub feed_contact_email: Option<String>,

    #[serde(skip)]
    pub problems: Problems,
}

impl Entity for FeedInfo {
    entity_basics!(files::FEED_INFO);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "feed_publisher_name", &self.feed_publisher_name);
        require(&mut errors, "feed_publisher_url", &self.feed_publisher_url);
        require(&mut errors, "feed_lang", &self.feed_lang);
        if let (Some(start), Some(end)) = (self.feed_start_date, self.feed_end_date) {
            if end < start {
                errors.push(
                    EntityError::invalid("feed_end_date", end.format("%Y%m%d"))
                        .message("ends before it starts"),
                );
            }
        }
        errors
    }
}
