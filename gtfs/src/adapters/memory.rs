use anyhow::Result;

use super::{EntityIter, Reader, Writer};
use crate::{
    Agency, Calendar, CalendarDate, Entity, EntityError, FareAttribute, FareRule, Feed, FeedInfo,
    Frequency, Record, Route, Shape, Stop, StopTime, Transfer, Trip,
};

/// Serves entities out of a `Feed`.
pub struct MemoryReader {
    feed: Feed,
    open: bool,
}

impl MemoryReader {
    pub fn new(feed: Feed) -> Self {
        Self { feed, open: false }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

fn iter<T: Clone + 'static>(list: &[T]) -> Result<EntityIter<T>> {
    Ok(Box::new(list.to_vec().into_iter()))
}

impl Reader for MemoryReader {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn validate_structure(&mut self) -> Vec<EntityError> {
        self.feed.validate_structure()
    }

    fn agencies(&mut self) -> Result<EntityIter<Agency>> {
        iter(&self.feed.agencies)
    }

    fn routes(&mut self) -> Result<EntityIter<Route>> {
        iter(&self.feed.routes)
    }

    fn stops(&mut self) -> Result<EntityIter<Stop>> {
        iter(&self.feed.stops)
    }

    fn trips(&mut self) -> Result<EntityIter<Trip>> {
        iter(&self.feed.trips)
    }

    fn stop_times(&mut self) -> Result<EntityIter<StopTime>> {
        iter(&self.feed.stop_times)
    }

    fn stop_times_by_trip(&mut self) -> Result<EntityIter<Vec<StopTime>>> {
        Ok(Box::new(self.feed.stop_times_by_trip().into_iter()))
    }

    fn calendars(&mut self) -> Result<EntityIter<Calendar>> {
        iter(&self.feed.calendars)
    }

    fn calendar_dates(&mut self) -> Result<EntityIter<CalendarDate>> {
        iter(&self.feed.calendar_dates)
    }

    fn shapes(&mut self) -> Result<EntityIter<Shape>> {
        iter(&self.feed.shapes)
    }

    fn frequencies(&mut self) -> Result<EntityIter<Frequency>> {
        iter(&self.feed.frequencies)
    }

    fn transfers(&mut self) -> Result<EntityIter<Transfer>> {
        iter(&self.feed.transfers)
    }

    fn fare_attributes(&mut self) -> Result<EntityIter<FareAttribute>> {
        iter(&self.feed.fare_attributes)
    }

    fn fare_rules(&mut self) -> Result<EntityIter<FareRule>> {
        iter(&self.feed.fare_rules)
    }

    fn feed_infos(&mut self) -> Result<EntityIter<FeedInfo>> {
        iter(&self.feed.feed_infos)
    }
}

/// Collects written entities into a `Feed`. Destination keys are the natural key with an optional
/// prefix; entities without a natural key get their row number.
#[derive(Default)]
pub struct MemoryWriter {
    pub feed: Feed,
    key_prefix: String,
    open: bool,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes destination keys differ from source keys, so remapping is observable.
    pub fn with_key_prefix(prefix: &str) -> Self {
        Self {
            key_prefix: prefix.to_string(),
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Writer for MemoryWriter {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn create(&mut self) -> Result<()> {
        self.feed = Feed::default();
        Ok(())
    }

    fn add_entity(&mut self, ent: &Record) -> Result<String> {
        let key = if ent.entity_id().is_empty() {
            format!("{}{}", self.key_prefix, self.feed.count(ent.filename()) + 1)
        } else {
            format!("{}{}", self.key_prefix, ent.entity_id())
        };
        self.feed.push(ent.clone());
        Ok(key)
    }
}
