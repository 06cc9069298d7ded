//! Where feeds come from and where they go. The copier only talks to these traits.

mod csv_writer;
mod memory;

use anyhow::Result;

use crate::{
    Agency, Calendar, CalendarDate, EntityError, FareAttribute, FareRule, FeedInfo, Frequency,
    Record, Route, Shape, Stop, StopTime, Transfer, Trip,
};

pub use self::csv_writer::CsvWriter;
pub use self::memory::{MemoryReader, MemoryWriter};

/// A finite, single-pass sequence of entities. Call the reader method again to read a file again.
pub type EntityIter<T> = Box<dyn Iterator<Item = T>>;

/// A source of GTFS entities. Each method returns the rows of one file in a stable order.
pub trait Reader {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;

    /// Feed-level problems, checked before copying starts
    fn validate_structure(&mut self) -> Vec<EntityError>;

    fn agencies(&mut self) -> Result<EntityIter<Agency>>;
    fn routes(&mut self) -> Result<EntityIter<Route>>;
    fn stops(&mut self) -> Result<EntityIter<Stop>>;
    fn trips(&mut self) -> Result<EntityIter<Trip>>;
    fn stop_times(&mut self) -> Result<EntityIter<StopTime>>;
    /// One group per trip, each sorted by stop_sequence
    fn stop_times_by_trip(&mut self) -> Result<EntityIter<Vec<StopTime>>>;
    fn calendars(&mut self) -> Result<EntityIter<Calendar>>;
    fn calendar_dates(&mut self) -> Result<EntityIter<CalendarDate>>;
    fn shapes(&mut self) -> Result<EntityIter<Shape>>;
    fn frequencies(&mut self) -> Result<EntityIter<Frequency>>;
    fn transfers(&mut self) -> Result<EntityIter<Transfer>>;
    fn fare_attributes(&mut self) -> Result<EntityIter<FareAttribute>>;
    fn fare_rules(&mut self) -> Result<EntityIter<FareRule>>;
    fn feed_infos(&mut self) -> Result<EntityIter<FeedInfo>>;
}

/// A destination for GTFS entities.
pub trait Writer {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;

    /// Initialize the destination storage
    fn create(&mut self) -> Result<()>;

    /// Writes one entity, returning the key the destination uses for it.
    fn add_entity(&mut self, ent: &Record) -> Result<String>;

    /// Writes a batch of entities of the same kind, returning one key per entity.
    fn add_entities(&mut self, ents: &[Record]) -> Result<Vec<String>> {
        ents.iter().map(|ent| self.add_entity(ent)).collect()
    }
}
