use std::collections::{BTreeSet, HashMap};

use gtfs::{
    files, validate_stop_time_sequence, Entity, EntityError, ErrorKind, Record, StopTime, Trip,
};

use super::Copier;
use crate::result::SkipReason;

impl<'a> Copier<'a> {
    /// Trips and their stop times are copied together, so each trip's stop times can be checked
    /// as a whole and interpolated before being written.
    pub(super) fn copy_trips(&mut self) {
        let Some(trips) = self.read(files::TRIPS, |r| r.trips()) else {
            return;
        };
        let mut order = Vec::new();
        let mut lookup: HashMap<String, Trip> = HashMap::new();
        for trip in trips {
            if lookup.contains_key(&trip.trip_id) {
                self.result.add_error(
                    EntityError::new(ErrorKind::DuplicateId)
                        .field("trip_id")
                        .in_entity(files::TRIPS, &trip.trip_id),
                );
                self.result.add_skipped(files::TRIPS, SkipReason::Duplicate);
                continue;
            }
            order.push(trip.trip_id.clone());
            lookup.insert(trip.trip_id.clone(), trip);
        }

        let mut with_stop_times = BTreeSet::new();
        if let Some(groups) = self.read(files::STOP_TIMES, |r| r.stop_times_by_trip()) {
            for group in groups {
                let Some(trip_id) = group.first().map(|st| st.trip_id.clone()) else {
                    continue;
                };
                with_stop_times.insert(trip_id.clone());

                let Some(trip) = lookup.get(&trip_id) else {
                    self.result.add_error(
                        EntityError::reference("trip_id", &trip_id)
                            .in_entity(files::STOP_TIMES, &trip_id),
                    );
                    self.skip_stop_times(group.len(), SkipReason::ReferenceErrors);
                    continue;
                };
                if !self.marker.is_marked(files::TRIPS, &trip_id) {
                    self.result.add_skipped(files::TRIPS, SkipReason::Unmarked);
                    self.skip_stop_times(group.len(), SkipReason::Unmarked);
                    continue;
                }
                self.copy_trip_with_stop_times(trip.clone(), group);
            }
        }
        match self.writer.flush(&mut self.entity_map) {
            Ok(Some((filename, count))) => self.result.add_written(filename, count),
            Ok(None) => {}
            Err(err) => self.buffer_failed(files::STOP_TIMES, "", err),
        }

        // Trips nothing stops at are still copied, but flagged
        for trip_id in order {
            if with_stop_times.contains(&trip_id) {
                continue;
            }
            let Some(trip) = lookup.remove(&trip_id) else {
                continue;
            };
            if self.marker.is_marked(files::TRIPS, &trip_id) {
                self.result.add_error(
                    EntityError::new(ErrorKind::EmptyTrip).in_entity(files::TRIPS, &trip_id),
                );
            }
            self.copy_entity(trip);
        }

        info!(
            "Copied {} trips and {} stop times, with {} stop patterns",
            self.result.written(files::TRIPS),
            self.result.written(files::STOP_TIMES),
            self.stop_patterns.len()
        );
    }

    fn skip_stop_times(&mut self, count: usize, reason: SkipReason) {
        for _ in 0..count {
            self.result.add_skipped(files::STOP_TIMES, reason);
        }
    }

    /// Whether a trip without a shape would survive validation and key resolution, so shapes
    /// aren't generated for trips that are about to be dropped
    fn will_copy(&self, trip: &Trip) -> bool {
        let mut candidate = Record::from(trip.clone());
        (candidate.errors().is_empty() || self.options.allow_entity_errors)
            && (candidate.update_keys(&self.entity_map).is_ok() || self.options.allow_reference_errors)
    }

    fn copy_trip_with_stop_times(&mut self, mut trip: Trip, mut stop_times: Vec<StopTime>) {
        let trip_id = trip.trip_id.clone();
        let stop_ids: Vec<String> = stop_times.iter().map(|st| st.stop_id.clone()).collect();
        trip.stop_pattern_id = self.stop_patterns.register(&stop_ids);

        if self.options.create_missing_shapes && trip.shape().is_none() && self.will_copy(&trip) {
            let shape_id = format!("generated-{}", trip.stop_pattern_id);
            if !self.entity_map.contains(files::SHAPES, &shape_id) {
                match self.geom.make_shape(&shape_id, &stop_ids) {
                    Ok(shape) => {
                        self.write_generated(shape.into());
                    }
                    Err(err) => {
                        self.result.add_warning(err.in_entity(files::TRIPS, &trip_id));
                    }
                }
            }
            if self.entity_map.contains(files::SHAPES, &shape_id) {
                trip.shape_id = Some(shape_id);
            }
        }

        let source_trip = trip.clone();
        if let Err(reason) = self.try_copy_entity(trip) {
            self.skip_stop_times(stop_times.len(), reason);
            return;
        }

        let mut errors = validate_stop_time_sequence(&stop_times);
        if errors.is_empty() && self.options.interpolate_stop_times {
            if let Err(err) = self.geom.interpolate_stop_times(&source_trip, &mut stop_times) {
                errors.push(err.in_entity(files::STOP_TIMES, &trip_id));
            }
        }
        for st in &stop_times {
            for warning in st.warnings() {
                self.result.add_warning(warning);
            }
        }
        let tolerate = errors.is_empty() || self.options.allow_entity_errors;
        for err in errors {
            self.result.add_error(err);
        }
        if !tolerate {
            self.skip_stop_times(stop_times.len(), SkipReason::EntityErrors);
            return;
        }

        // Resolve every key before writing any, so a bad group is skipped whole
        let total = stop_times.len();
        let mut resolved = Vec::with_capacity(total);
        for st in stop_times {
            let mut ent = Record::from(st);
            if !self.apply_filters(&mut ent) {
                continue;
            }
            if let Err(err) = ent.update_keys(&self.entity_map) {
                self.result.add_error(err.in_entity(files::STOP_TIMES, &trip_id));
                if !self.options.allow_reference_errors {
                    self.skip_stop_times(total, SkipReason::ReferenceErrors);
                    return;
                }
            }
            resolved.push(ent);
        }

        for ent in resolved {
            let interpolated = matches!(&ent, Record::StopTime(st) if st.interpolated);
            match self.writer.add(ent, &mut self.entity_map) {
                Ok(flushed) => {
                    if interpolated {
                        self.result.interpolated_stop_times += 1;
                    }
                    if let Some((filename, count)) = flushed {
                        self.result.add_written(filename, count);
                    }
                }
                Err(err) => self.buffer_failed(files::STOP_TIMES, &trip_id, err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use gtfs::adapters::{MemoryReader, MemoryWriter};
    use gtfs::{EntityMap, Feed, Route, Stop};

    use super::*;
    use crate::filters::EntityFilter;
    use crate::Options;

    fn feed() -> Feed {
        let mut feed = Feed::default();
        feed.routes.push(Route {
            route_id: "r1".to_string(),
            route_short_name: Some("1".to_string()),
            route_type: 3,
            ..Default::default()
        });
        for (idx, id) in ["a", "b", "c"].into_iter().enumerate() {
            feed.stops.push(Stop {
                stop_id: id.to_string(),
                stop_name: Some(id.to_string()),
                stop_lat: Some(0.01 * idx as f64),
                stop_lon: Some(0.0),
                ..Default::default()
            });
        }
        for trip_id in ["t1", "t2", "t3"] {
            feed.trips.push(Trip {
                trip_id: trip_id.to_string(),
                route_id: "r1".to_string(),
                service_id: "daily".to_string(),
                ..Default::default()
            });
        }
        feed.calendars.push(gtfs::Calendar {
            service_id: "daily".to_string(),
            ..Default::default()
        });
        for trip_id in ["t1", "t2"] {
            for (seq, stop_id, time) in [(1, "a", Some(0)), (2, "b", None), (3, "c", Some(20))] {
                feed.stop_times.push(StopTime {
                    trip_id: trip_id.to_string(),
                    stop_id: stop_id.to_string(),
                    stop_sequence: seq,
                    arrival_time: time,
                    departure_time: time,
                    ..Default::default()
                });
            }
        }
        feed
    }

    fn run(feed: Feed, opts: Options) -> (crate::CopyResult, Feed) {
        let mut reader = MemoryReader::new(feed);
        let mut writer = MemoryWriter::new();
        let mut copier = Copier::new(&mut reader, &mut writer, opts);
        copier.copy_routes();
        copier.copy_stops();
        copier.copy_services();
        copier.copy_shapes();
        copier.copy_trips();
        let result = copier.result().clone();
        drop(copier);
        (result, writer.feed)
    }

    #[test]
    fn shares_generated_shapes_between_patterns() {
        let (result, out) = run(
            feed(),
            Options {
                create_missing_shapes: true,
                interpolate_stop_times: true,
                batch_size: 2,
                ..Default::default()
            },
        );
        assert_eq!(out.shapes.len(), 1);
        assert_eq!(out.shapes[0].shape_id, "generated-0");
        assert!(out.trips[..2]
            .iter()
            .all(|t| t.shape_id.as_deref() == Some("generated-0")));

        assert_eq!(out.stop_times.len(), 6);
        assert_eq!(out.stop_times[1].arrival_time, Some(10));
        assert!(out.stop_times[1].interpolated);
        assert_eq!(result.interpolated_stop_times, 2);

        // t3 has no stop times
        assert_eq!(out.trips.len(), 3);
        assert_eq!(result.error_count(files::TRIPS, ErrorKind::EmptyTrip), 1);
    }

    #[test]
    fn bad_groups_are_skipped_whole() {
        let mut feed = feed();
        feed.stop_times[4].stop_id = "nowhere".to_string();
        feed.stop_times.push(StopTime {
            trip_id: "ghost".to_string(),
            stop_id: "a".to_string(),
            stop_sequence: 1,
            ..Default::default()
        });
        let (result, out) = run(feed, Options::default());

        assert_eq!(out.stop_times.len(), 3);
        assert!(out.stop_times.iter().all(|st| st.trip_id == "t1"));
        assert_eq!(
            result.skipped(files::STOP_TIMES, SkipReason::ReferenceErrors),
            4
        );
        assert_eq!(
            result.error_count(files::STOP_TIMES, ErrorKind::InvalidReference),
            2
        );
    }

    struct Reroute;

    impl EntityFilter for Reroute {
        fn filter(&mut self, ent: &mut Record, _: &EntityMap) -> anyhow::Result<()> {
            match ent {
                Record::Trip(trip) if trip.trip_id == "t1" => bail!("not wanted"),
                Record::StopTime(st) if st.trip_id == "t2" && st.stop_sequence == 3 => {
                    st.stop_id = "elsewhere".to_string();
                }
                _ => {}
            }
            Ok(())
        }
    }

    #[test]
    fn stop_times_share_their_trips_fate() {
        let mut reader = MemoryReader::new(feed());
        let mut writer = MemoryWriter::new();
        let mut copier = Copier::new(
            &mut reader,
            &mut writer,
            Options {
                interpolate_stop_times: true,
                ..Default::default()
            },
        );
        copier.add_filter(Box::new(Reroute));
        copier.copy_routes();
        copier.copy_stops();
        copier.copy_services();
        copier.copy_trips();
        let result = copier.result().clone();
        drop(copier);

        // t1 was filtered out, so its stop times are too
        assert_eq!(result.skipped(files::TRIPS, SkipReason::Filtered), 1);
        assert_eq!(result.skipped(files::STOP_TIMES, SkipReason::Filtered), 3);
        // t2's middle stop got interpolated, but the group never made it out
        assert_eq!(
            result.skipped(files::STOP_TIMES, SkipReason::ReferenceErrors),
            3
        );
        assert_eq!(result.interpolated_stop_times, 0);
        assert!(writer.feed.stop_times.is_empty());
    }

    #[test]
    fn duplicate_trips_are_rejected() {
        let mut feed = feed();
        let dupe = feed.trips[0].clone();
        feed.trips.push(dupe);
        let (result, out) = run(feed, Options::default());
        assert_eq!(result.error_count(files::TRIPS, ErrorKind::DuplicateId), 1);
        assert_eq!(out.trips.iter().filter(|t| t.trip_id == "t1").count(), 1);
    }
}
