//! Copies a GTFS feed from a source to a destination, checking every entity, re-keying every
//! reference, and optionally repairing what's missing along the way.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod buffered;
mod copy;
mod filters;
pub mod geom;
pub mod marker;
mod options;
mod result;
mod stop_pattern;

pub use self::buffered::BufferedWriter;
pub use self::copy::Copier;
pub use self::filters::{BasicRouteTypeFilter, EntityFilter, Extension};
pub use self::marker::{GraphMarker, MarkAll, Marker, PassAll};
pub use self::options::Options;
pub use self::result::{CopyResult, ErrorGroup, FileCounts, SkipReason};
pub use self::stop_pattern::StopPatterns;
