use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::Path;

use anyhow::Result;
use serde::de::DeserializeOwned;
use zip::ZipArchive;

use crate::{
    files, Agency, Calendar, CalendarDate, EntityError, ErrorKind, FareAttribute,
    FareRule, FeedInfo, Frequency, Record, Route, Shape, ShapeRow, Stop, StopTime, Transfer,
    Trip,
};

/// A whole GTFS feed held in memory.
#[derive(Clone, Debug, Default)]
pub struct Feed {
    pub agencies: Vec<Agency>,
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
    pub trips: Vec<Trip>,
    pub stop_times: Vec<StopTime>,
    pub calendars: Vec<Calendar>,
    pub calendar_dates: Vec<CalendarDate>,
    pub shapes: Vec<Shape>,
    pub frequencies: Vec<Frequency>,
    pub transfers: Vec<Transfer>,
    pub fare_attributes: Vec<FareAttribute>,
    pub fare_rules: Vec<FareRule>,
    pub feed_infos: Vec<FeedInfo>,

    /// Rows that couldn't be parsed while loading
    pub load_errors: Vec<EntityError>,
}

impl Feed {
    /// Reads every GTFS file present in a directory. Missing files are just empty.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            bail!("{} is not a directory", dir.display());
        }
        Self::load(|name| {
            let path = dir.join(name);
            if !path.exists() {
                return Ok(None);
            }
            let file = std::fs::File::open(&path)
                .map_err(|err| anyhow!("{}: {err}", path.display()))?;
            Ok(Some(Box::new(file) as Box<dyn Read>))
        })
    }

    /// Reads every GTFS file present at the root of a zip archive.
    pub fn load_from_zip<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Self> {
        Self::load(|name| {
            let mut file = match archive.by_name(name) {
                Ok(file) => file,
                Err(zip::result::ZipError::FileNotFound) => return Ok(None),
                Err(err) => bail!("{name}: {err}"),
            };
            // ZipFile borrows the archive, so buffer each file
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            Ok(Some(Box::new(std::io::Cursor::new(bytes)) as Box<dyn Read>))
        })
    }

    fn load<F>(mut open: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Option<Box<dyn Read>>>,
    {
        let mut feed = Self::default();
        let mut errors = Vec::new();
        macro_rules! load_file {
            ($field:ident, $file:expr) => {
                if let Some(reader) = open($file)? {
                    feed.$field = load_csv(reader, $file, &mut errors)?;
                }
            };
        }
        load_file!(agencies, files::AGENCY);
        load_file!(routes, files::ROUTES);
        load_file!(stops, files::STOPS);
        load_file!(trips, files::TRIPS);
        load_file!(stop_times, files::STOP_TIMES);
        load_file!(calendars, files::CALENDAR);
        load_file!(calendar_dates, files::CALENDAR_DATES);
        load_file!(frequencies, files::FREQUENCIES);
        load_file!(transfers, files::TRANSFERS);
        load_file!(fare_attributes, files::FARE_ATTRIBUTES);
        load_file!(fare_rules, files::FARE_RULES);
        load_file!(feed_infos, files::FEED_INFO);
        if let Some(reader) = open(files::SHAPES)? {
            let rows: Vec<ShapeRow> = load_csv(reader, files::SHAPES, &mut errors)?;
            feed.shapes = Shape::from_rows(rows);
        }
        feed.load_errors = errors;

        info!(
            "Loaded {} stops, {} routes, {} trips, {} stop times, {} shapes",
            feed.stops.len(),
            feed.routes.len(),
            feed.trips.len(),
            feed.stop_times.len(),
            feed.shapes.len()
        );
        Ok(feed)
    }

    pub fn push(&mut self, rec: Record) {
        match rec {
            Record::Agency(x) => self.agencies.push(x),
            Record::Route(x) => self.routes.push(x),
            Record::Stop(x) => self.stops.push(x),
            Record::Trip(x) => self.trips.push(x),
            Record::StopTime(x) => self.stop_times.push(x),
            Record::Calendar(x) => self.calendars.push(x),
            Record::CalendarDate(x) => self.calendar_dates.push(x),
            Record::Shape(x) => self.shapes.push(x),
            Record::Frequency(x) => self.frequencies.push(x),
            Record::Transfer(x) => self.transfers.push(x),
            Record::FareAttribute(x) => self.fare_attributes.push(x),
            Record::FareRule(x) => self.fare_rules.push(x),
            Record::FeedInfo(x) => self.feed_infos.push(x),
        }
    }

    /// How many entities of one file this feed has
    pub fn count(&self, filename: &str) -> usize {
        match filename {
            files::AGENCY => self.agencies.len(),
            files::ROUTES => self.routes.len(),
            files::STOPS => self.stops.len(),
            files::TRIPS => self.trips.len(),
            files::STOP_TIMES => self.stop_times.len(),
            files::CALENDAR => self.calendars.len(),
            files::CALENDAR_DATES => self.calendar_dates.len(),
            files::SHAPES => self.shapes.len(),
            files::FREQUENCIES => self.frequencies.len(),
            files::TRANSFERS => self.transfers.len(),
            files::FARE_ATTRIBUTES => self.fare_attributes.len(),
            files::FARE_RULES => self.fare_rules.len(),
            files::FEED_INFO => self.feed_infos.len(),
            _ => 0,
        }
    }

    /// Stop times grouped by trip, each group sorted by stop_sequence. Groups are in order of each
    /// trip's first appearance.
    pub fn stop_times_by_trip(&self) -> Vec<Vec<StopTime>> {
        let mut order = Vec::new();
        let mut groups: BTreeMap<&str, Vec<StopTime>> = BTreeMap::new();
        for st in &self.stop_times {
            let group = groups.entry(st.trip_id.as_str()).or_insert_with(|| {
                order.push(st.trip_id.as_str());
                Vec::new()
            });
            group.push(st.clone());
        }
        order
            .into_iter()
            .filter_map(|trip_id| groups.remove(trip_id))
            .map(|mut group| {
                group.sort_by_key(|st| st.stop_sequence);
                group
            })
            .collect()
    }

    /// Feed-level problems: missing required files, plus rows that couldn't be parsed.
    pub fn validate_structure(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        for filename in [
            files::AGENCY,
            files::ROUTES,
            files::STOPS,
            files::TRIPS,
            files::STOP_TIMES,
        ] {
            if self.count(filename) == 0 {
                errors.push(EntityError::new(ErrorKind::MissingFile).in_entity(filename, ""));
            }
        }
        if self.calendars.is_empty() && self.calendar_dates.is_empty() {
            errors.push(
                EntityError::new(ErrorKind::MissingFile)
                    .message("calendar.txt or calendar_dates.txt is required")
                    .in_entity(files::CALENDAR, ""),
            );
        }
        errors.extend(self.load_errors.iter().cloned());
        errors
    }
}

/// Trims fields and skips rows that don't parse, recording an error for each.
fn load_csv<T: DeserializeOwned, R: Read>(
    reader: R,
    filename: &str,
    errors: &mut Vec<EntityError>,
) -> Result<Vec<T>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut results = Vec::new();
    for (idx, rec) in csv_reader.deserialize::<T>().enumerate() {
        match rec {
            Ok(rec) => results.push(rec),
            Err(err) => {
                if let csv::ErrorKind::Io(_) = err.kind() {
                    bail!("{filename}: {err}");
                }
                // Header is line 1
                let line = idx + 2;
                warn!("Skipping {filename} line {line}: {err}");
                errors.push(
                    EntityError::new(ErrorKind::InvalidRow)
                        .value(line)
                        .message(err.to_string())
                        .in_entity(filename, ""),
                );
            }
        }
    }
    Ok(results)
}
