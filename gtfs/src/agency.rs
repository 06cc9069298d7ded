use serde::{Deserialize, Serialize};

use crate::entity::{entity_basics, require};
use crate::{files, Entity, EntityError, Problems};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    #[serde(default)]
    pub agency_id: String,
    pub agency_name: String,
    pub agency_url: String,
    pub agency_timezone: String,
    #[serde(default)]
    pub agency_lang: Option<String>,
    #[serde(default)]
    pub agency_phone: Option<String>,
    #[serde(default)]
    pub agency_fare_url: Option<String>,
    #[serde(default)]
    pub agency_email: Option<String>,

    #[serde(skip)]
    pub problems: Problems,
}

impl Entity for Agency {
    entity_basics!(files::AGENCY, agency_id);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "agency_name", &self.agency_name);
        require(&mut errors, "agency_url", &self.agency_url);
        require(&mut errors, "agency_timezone", &self.agency_timezone);
        errors
    }
}
