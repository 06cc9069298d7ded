use serde::{Deserialize, Serialize};

use crate::entity::{entity_basics, require};
use crate::{files, Entity, EntityError, EntityMap, Problems};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FareAttribute {
    pub fare_id: String,
    pub price: f64,
    pub currency_type: String,
    pub payment_method: i32,
    /// Empty means unlimited transfers
    #[serde(default)]
    pub transfers: Option<i32>,
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub transfer_duration: Option<u32>,

    #[serde(skip)]
    pub problems: Problems,
}

impl Entity for FareAttribute {
    entity_basics!(files::FARE_ATTRIBUTES, fare_id);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "fare_id", &self.fare_id);
        require(&mut errors, "currency_type", &self.currency_type);
        if self.price < 0.0 {
            errors.push(EntityError::invalid("price", self.price));
        }
        if !(0..=1).contains(&self.payment_method) {
            errors.push(EntityError::invalid("payment_method", self.payment_method));
        }
        if let Some(transfers) = self.transfers {
            if !(0..=2).contains(&transfers) {
                errors.push(EntityError::invalid("transfers", transfers));
            }
        }
        errors
    }

    fn update_keys(&mut self, emap: &EntityMap) -> Result<(), EntityError> {
        emap.resolve_optional(files::AGENCY, "agency_id", &mut self.agency_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FareRule {
    pub fare_id: String,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub origin_id: Option<String>,
    #[serde(default)]
    pub destination_id: Option<String>,
    #[serde(default)]
    pub contains_id: Option<String>,

    #[serde(skip)]
    pub problems: Problems,
}

impl Entity for FareRule {
    entity_basics!(files::FARE_RULES);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "fare_id", &self.fare_id);
        errors
    }

    fn update_keys(&mut self, emap: &EntityMap) -> Result<(), EntityError> {
        emap.resolve(files::FARE_ATTRIBUTES, "fare_id", &mut self.fare_id)?;
        emap.resolve_optional(files::ROUTES, "route_id", &mut self.route_id)
    }
}
