//! Copies a whole feed from a `Reader` to a `Writer`, one file at a time in dependency order, so
//! every foreign key can be resolved through the `EntityMap` by the time it's written.

mod services;
mod stops;
mod trips;

use std::collections::HashMap;

use anyhow::Result;
use gtfs::adapters::{EntityIter, Reader, Writer};
use gtfs::{files, Entity, EntityError, EntityMap, ErrorClass, ErrorKind, Record};

use crate::buffered::BufferedWriter;
use crate::filters::{BasicRouteTypeFilter, EntityFilter, Extension};
use crate::geom::GeomCache;
use crate::marker::{Marker, PassAll};
use crate::result::{CopyResult, SkipReason};
use crate::stop_pattern::StopPatterns;
use crate::Options;

pub struct Copier<'a> {
    reader: &'a mut dyn Reader,
    writer: BufferedWriter<'a>,
    entity_map: EntityMap,
    marker: Box<dyn Marker>,
    geom: GeomCache,
    stop_patterns: StopPatterns,
    filters: Vec<Box<dyn EntityFilter>>,
    extensions: Vec<Box<dyn Extension>>,
    options: Options,
    result: CopyResult,
    /// Source agency_id filled into routes and fare attributes without one
    default_agency_id: Option<String>,
    /// Source stop_id to location_type, for stops that were copied
    location_types: HashMap<String, i32>,
}

impl<'a> Copier<'a> {
    pub fn new(reader: &'a mut dyn Reader, writer: &'a mut dyn Writer, options: Options) -> Self {
        let mut filters: Vec<Box<dyn EntityFilter>> = Vec::new();
        if options.use_basic_route_types {
            filters.push(Box::new(BasicRouteTypeFilter));
        }
        Self {
            reader,
            writer: BufferedWriter::new(writer, options.batch_size),
            entity_map: EntityMap::new(),
            marker: Box::new(PassAll),
            geom: GeomCache::new(),
            stop_patterns: StopPatterns::new(),
            filters,
            extensions: Vec::new(),
            result: CopyResult::new(options.error_limit),
            default_agency_id: options.default_agency_id.clone(),
            options,
            location_types: HashMap::new(),
        }
    }

    pub fn with_marker(mut self, marker: Box<dyn Marker>) -> Self {
        self.marker = marker;
        self
    }

    pub fn add_filter(&mut self, filter: Box<dyn EntityFilter>) {
        self.filters.push(filter);
    }

    pub fn add_extension(&mut self, extension: Box<dyn Extension>) {
        self.extensions.push(extension);
    }

    pub fn reader(&mut self) -> &mut (dyn Reader + 'a) {
        &mut *self.reader
    }

    pub fn entity_map(&self) -> &EntityMap {
        &self.entity_map
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn result(&self) -> &CopyResult {
        &self.result
    }

    pub fn result_mut(&mut self) -> &mut CopyResult {
        &mut self.result
    }

    /// Copies one entity, returning the key the destination gave it. Returns `None` if the entity
    /// was left out for any reason; the reason is recorded in the result.
    pub fn copy_entity<E: Into<Record>>(&mut self, ent: E) -> Option<String> {
        self.try_copy_entity(ent).ok()
    }

    /// Like `copy_entity`, but says why the entity was left out
    pub fn try_copy_entity<E: Into<Record>>(&mut self, ent: E) -> Result<String, SkipReason> {
        let ent = ent.into();
        let (filename, key) = marker_key(&ent);
        if !self.marker.is_marked(filename, key) {
            self.result.add_skipped(ent.filename(), SkipReason::Unmarked);
            return Err(SkipReason::Unmarked);
        }
        self.write_entity(ent, false)
    }

    /// For entities made up during the copy. The marker never saw these, so isn't asked.
    fn write_generated(&mut self, ent: Record) -> Option<String> {
        self.write_entity(ent, true).ok()
    }

    fn write_entity(&mut self, mut ent: Record, generated: bool) -> Result<String, SkipReason> {
        let filename = ent.filename();
        let source_id = ent.entity_id().to_string();

        if !self.apply_filters(&mut ent) {
            return Err(SkipReason::Filtered);
        }

        if !self.record_problems(&ent) {
            self.result.add_skipped(filename, SkipReason::EntityErrors);
            return Err(SkipReason::EntityErrors);
        }

        if !self.update_keys(&mut ent, &source_id) {
            self.result.add_skipped(filename, SkipReason::ReferenceErrors);
            return Err(SkipReason::ReferenceErrors);
        }

        if !source_id.is_empty()
            && (self.entity_map.contains(filename, &source_id)
                || self.writer.is_pending(filename, &source_id))
        {
            self.result.add_error(
                EntityError::new(ErrorKind::DuplicateId)
                    .message("already copied")
                    .in_entity(filename, &source_id),
            );
            self.result.add_skipped(filename, SkipReason::Duplicate);
            return Err(SkipReason::Duplicate);
        }

        match self.writer.write_now(&ent) {
            Ok(key) => {
                if !source_id.is_empty() {
                    if let Err(err) = self.entity_map.set(filename, &source_id, &key) {
                        error!("{err}");
                    }
                }
                self.result.add_written(filename, 1);
                if generated {
                    self.result.add_generated(filename);
                }
                Ok(key)
            }
            Err(err) => {
                self.write_failed(filename, &source_id, err, 1);
                Err(SkipReason::WriteFailed)
            }
        }
    }

    /// False if some filter rejected the entity
    fn apply_filters(&mut self, ent: &mut Record) -> bool {
        for filter in &mut self.filters {
            if let Err(err) = filter.filter(ent, &self.entity_map) {
                debug!(
                    "Filtered out {} '{}': {err}",
                    ent.filename(),
                    ent.entity_id()
                );
                self.result.add_skipped(ent.filename(), SkipReason::Filtered);
                return false;
            }
        }
        true
    }

    /// Records the entity's errors and warnings. False if the errors mean it shouldn't be copied.
    fn record_problems(&mut self, ent: &Record) -> bool {
        for warning in ent.warnings() {
            self.result.add_warning(warning);
        }
        let errors = ent.errors();
        let ok = errors.is_empty() || self.options.allow_entity_errors;
        for err in errors {
            self.result.add_error(err);
        }
        ok
    }

    /// False if a foreign key doesn't resolve and that isn't allowed
    fn update_keys(&mut self, ent: &mut Record, source_id: &str) -> bool {
        match ent.update_keys(&self.entity_map) {
            Ok(()) => true,
            Err(err) => {
                let err = err.in_entity(ent.filename(), source_id);
                debug!("{err}");
                self.result.add_error(err);
                self.options.allow_reference_errors
            }
        }
    }

    /// Records one error for the failure, and a skip for each of the `lost` entities
    fn write_failed(&mut self, filename: &str, entity_id: &str, err: anyhow::Error, lost: usize) {
        error!("Writing to {filename} failed: {err}");
        self.result.add_error(
            EntityError::new(ErrorKind::WriteFailed)
                .message(err.to_string())
                .in_entity(filename, entity_id),
        );
        for _ in 0..lost {
            self.result.add_skipped(filename, SkipReason::WriteFailed);
        }
    }

    /// A buffered write failed. Every entity the buffer lost counts as skipped.
    fn buffer_failed(&mut self, filename: &str, entity_id: &str, err: anyhow::Error) {
        let lost = self.writer.take_dropped();
        self.write_failed(filename, entity_id, err, lost);
    }

    /// Starts reading one file. A failure is recorded, and the file is treated as empty.
    fn read<T, F>(&mut self, filename: &str, open: F) -> Option<EntityIter<T>>
    where
        F: FnOnce(&mut dyn Reader) -> Result<EntityIter<T>>,
    {
        match open(&mut *self.reader) {
            Ok(iter) => Some(iter),
            Err(err) => {
                error!("Couldn't read {filename}: {err}");
                self.result.add_error(
                    EntityError::new(ErrorKind::InvalidRow)
                        .message(err.to_string())
                        .in_entity(filename, ""),
                );
                None
            }
        }
    }

    /// Copies everything, in order. Nothing about one entity can stop the copy; everything that
    /// went wrong is in the result.
    pub fn copy(mut self) -> CopyResult {
        if let Err(err) = self.reader.open() {
            self.result.add_error(
                EntityError::new(ErrorKind::MissingFile).message(format!("can't open source: {err}")),
            );
            return self.result;
        }
        match self.writer.open() {
            Ok(()) => self.copy_files(),
            Err(err) => self.write_failed("", "", err, 0),
        }
        if let Err(err) = self.reader.close() {
            warn!("Closing the source failed: {err}");
        }

        self.result.log_summary();
        self.result
    }

    /// Runs every pass, then closes the destination
    fn copy_files(&mut self) {
        for err in self.reader.validate_structure() {
            self.result.add_error(err);
        }
        let structural = self.result.errors_of_class(ErrorClass::Structural);
        if structural > 0 {
            warn!("Source has {structural} structural problems; copying what's there anyway");
        }

        self.copy_agencies();
        self.copy_routes();
        self.copy_stops();
        self.copy_fares();
        self.copy_services();
        self.copy_shapes();
        self.copy_trips();
        self.copy_frequencies();
        self.copy_transfers();
        self.copy_feed_infos();
        self.run_extensions();

        match self.writer.close(&mut self.entity_map) {
            Ok(Some((filename, count))) => self.result.add_written(filename, count),
            Ok(None) => {}
            Err(err) => self.buffer_failed("", "", err),
        }
    }

    fn copy_agencies(&mut self) {
        let Some(agencies) = self.read(files::AGENCY, |r| r.agencies()) else {
            return;
        };
        let mut ids = Vec::new();
        for agency in agencies {
            ids.push(agency.agency_id.clone());
            self.copy_entity(agency);
        }
        if self.default_agency_id.is_none() && ids.len() == 1 && !ids[0].is_empty() {
            self.default_agency_id = ids.pop();
        }
        info!("Copied {} agencies", self.result.written(files::AGENCY));
    }

    fn copy_routes(&mut self) {
        let Some(routes) = self.read(files::ROUTES, |r| r.routes()) else {
            return;
        };
        for mut route in routes {
            if route.agency_id.as_deref().unwrap_or("").is_empty() {
                route.agency_id = self.default_agency_id.clone();
            }
            self.copy_entity(route);
        }
        info!("Copied {} routes", self.result.written(files::ROUTES));
    }

    fn copy_shapes(&mut self) {
        let Some(shapes) = self.read(files::SHAPES, |r| r.shapes()) else {
            return;
        };
        for shape in shapes {
            let pts = shape.clone();
            if self.copy_entity(shape).is_some() {
                self.geom.add_shape(&pts);
            }
        }
        info!("Copied {} shapes", self.result.written(files::SHAPES));
    }

    fn copy_frequencies(&mut self) {
        let Some(frequencies) = self.read(files::FREQUENCIES, |r| r.frequencies()) else {
            return;
        };
        for freq in frequencies {
            if !self.marker.is_marked(files::TRIPS, &freq.trip_id) {
                self.result.add_skipped(files::FREQUENCIES, SkipReason::Unmarked);
                continue;
            }
            self.copy_entity(freq);
        }
    }

    fn copy_transfers(&mut self) {
        let Some(transfers) = self.read(files::TRANSFERS, |r| r.transfers()) else {
            return;
        };
        for transfer in transfers {
            if !self.marker.is_marked(files::STOPS, &transfer.from_stop_id)
                || !self.marker.is_marked(files::STOPS, &transfer.to_stop_id)
            {
                self.result.add_skipped(files::TRANSFERS, SkipReason::Unmarked);
                continue;
            }
            self.copy_entity(transfer);
        }
    }

    fn copy_feed_infos(&mut self) {
        let Some(feed_infos) = self.read(files::FEED_INFO, |r| r.feed_infos()) else {
            return;
        };
        for feed_info in feed_infos {
            self.copy_entity(feed_info);
        }
    }

    fn run_extensions(&mut self) {
        let mut extensions = std::mem::take(&mut self.extensions);
        for ext in &mut extensions {
            info!("Running extension {}", ext.name());
            if let Err(err) = ext.copy(self) {
                error!("Extension {} failed: {err}", ext.name());
                self.result.add_error(
                    EntityError::new(ErrorKind::ExtensionFailed)
                        .value(ext.name())
                        .message(err.to_string()),
                );
            }
        }
        self.extensions = extensions;
    }
}

/// The file and key a marker knows an entity by
fn marker_key(ent: &Record) -> (&'static str, &str) {
    match ent {
        Record::CalendarDate(x) => (files::CALENDAR_DATES, &x.service_id),
        _ => (ent.filename(), ent.entity_id()),
    }
}
