//! Markers decide which source entities get copied at all.

mod graph;

use std::collections::BTreeMap;

use anyhow::Result;
use gtfs::adapters::Reader;
use gtfs::{files, Entity};

pub use self::graph::GraphMarker;

pub trait Marker {
    /// Should this entity be copied? Keyless entities are looked up with an empty ID, except
    /// calendar_dates.txt, which is looked up by service_id.
    fn is_marked(&self, filename: &str, id: &str) -> bool;

    /// Did the marker see this entity while it was being built?
    fn is_visited(&self, filename: &str, id: &str) -> bool;
}

/// Copies everything. The default.
pub struct PassAll;

impl Marker for PassAll {
    fn is_marked(&self, _: &str, _: &str) -> bool {
        true
    }

    fn is_visited(&self, _: &str, _: &str) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MarkState {
    pub visited: bool,
    pub marked: bool,
}

/// Per file, the state of every natural key a marker has seen
#[derive(Default)]
pub struct MarkTable {
    files: BTreeMap<&'static str, BTreeMap<String, MarkState>>,
}

impl MarkTable {
    pub fn visit(&mut self, filename: &'static str, id: &str) {
        self.files
            .entry(filename)
            .or_default()
            .entry(id.to_string())
            .or_default()
            .visited = true;
    }

    /// Marking also visits
    pub fn mark(&mut self, filename: &'static str, id: &str) {
        let state = self
            .files
            .entry(filename)
            .or_default()
            .entry(id.to_string())
            .or_default();
        state.visited = true;
        state.marked = true;
    }

    pub fn get(&self, filename: &str, id: &str) -> MarkState {
        self.files
            .get(filename)
            .and_then(|ids| ids.get(id))
            .copied()
            .unwrap_or_default()
    }

    pub fn visited_keys(&self, filename: &str) -> Vec<&str> {
        self.files
            .get(filename)
            .map(|ids| {
                ids.iter()
                    .filter(|(_, state)| state.visited)
                    .map(|(id, _)| id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// (visited, marked)
    pub fn counts(&self, filename: &str) -> (usize, usize) {
        let Some(ids) = self.files.get(filename) else {
            return (0, 0);
        };
        (
            ids.values().filter(|s| s.visited).count(),
            ids.values().filter(|s| s.marked).count(),
        )
    }
}

/// Visits and marks every entity in the source. The visited keys are a baseline of what a full
/// copy should produce.
pub struct MarkAll {
    table: MarkTable,
}

impl MarkAll {
    pub fn build(reader: &mut dyn Reader) -> Result<Self> {
        let mut table = MarkTable::default();
        for x in reader.agencies()? {
            table.mark(files::AGENCY, x.entity_id());
        }
        for x in reader.routes()? {
            table.mark(files::ROUTES, x.entity_id());
        }
        for x in reader.stops()? {
            table.mark(files::STOPS, x.entity_id());
        }
        for x in reader.trips()? {
            table.mark(files::TRIPS, x.entity_id());
        }
        for x in reader.calendars()? {
            table.mark(files::CALENDAR, x.entity_id());
        }
        for x in reader.calendar_dates()? {
            table.mark(files::CALENDAR_DATES, &x.service_id);
        }
        for x in reader.shapes()? {
            table.mark(files::SHAPES, x.entity_id());
        }
        for x in reader.fare_attributes()? {
            table.mark(files::FARE_ATTRIBUTES, x.entity_id());
        }
        Ok(Self { table })
    }

    pub fn visited_keys(&self, filename: &str) -> Vec<&str> {
        self.table.visited_keys(filename)
    }
}

impl Marker for MarkAll {
    fn is_marked(&self, _: &str, _: &str) -> bool {
        true
    }

    fn is_visited(&self, filename: &str, id: &str) -> bool {
        id.is_empty() || self.table.get(filename, id).visited
    }
}
