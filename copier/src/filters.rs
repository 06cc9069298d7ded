use anyhow::Result;
use gtfs::{Entity, EntityError, EntityMap, Record, RouteType};

use crate::Copier;

/// Sees every entity before it's validated and written, and may change it. Returning an error
/// leaves the entity out of the copy without failing anything else.
pub trait EntityFilter {
    fn filter(&mut self, ent: &mut Record, emap: &EntityMap) -> Result<()>;
}

/// Runs once after every base file has been copied, to copy whatever else it wants.
pub trait Extension {
    fn name(&self) -> &str;

    fn copy(&mut self, copier: &mut Copier<'_>) -> Result<()>;
}

/// Collapses extended route types onto the basic ones. A type with no basic equivalent is kept
/// as is, with an error attached to the route.
pub struct BasicRouteTypeFilter;

impl EntityFilter for BasicRouteTypeFilter {
    fn filter(&mut self, ent: &mut Record, _: &EntityMap) -> Result<()> {
        if let Record::Route(route) = ent {
            match RouteType::basic(route.route_type) {
                Some(basic) => {
                    route.route_type = basic.code();
                }
                None => {
                    let err = EntityError::invalid("route_type", route.route_type)
                        .message("no basic route type is equivalent");
                    route.add_error(err);
                }
            }
        }
        Ok(())
    }
}
