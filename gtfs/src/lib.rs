//! The GTFS entity model: one type per file, how each validates itself and rewrites its foreign
//! keys, and the adapters for reading and writing whole feeds.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

pub mod adapters;
mod agency;
mod calendar;
mod entity;
mod entity_map;
mod error;
mod fares;
mod feed;
mod feed_info;
mod routes;
pub mod serde_helpers;
mod shapes;
mod stop_times;
mod stops;
mod transfers;
mod trips;

pub use agency::Agency;
pub use calendar::{Calendar, CalendarDate, SERVICE_ADDED, SERVICE_REMOVED};
pub use entity::{files, Entity, Problems, Record};
pub use entity_map::EntityMap;
pub use error::{EntityError, ErrorClass, ErrorKind};
pub use fares::{FareAttribute, FareRule};
pub use feed::Feed;
pub use feed_info::FeedInfo;
pub use routes::{is_known_route_type, Route, RouteType};
pub use shapes::{Shape, ShapePoint, ShapeRow};
pub use stop_times::{validate_stop_time_sequence, StopTime};
pub use stops::{Stop, BOARDING_AREA, ENTRANCE, GENERIC_NODE, STATION, STOP_OR_PLATFORM};
pub use transfers::{Frequency, Transfer, TIMED_TRANSFER};
pub use trips::Trip;
