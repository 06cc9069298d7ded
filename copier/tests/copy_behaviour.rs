use std::io::Write as _;
use std::path::Path;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use copier::{
    Copier, CopyResult, EntityFilter, GraphMarker, MarkAll, Marker, Options, SkipReason,
};
use gtfs::adapters::{CsvWriter, MemoryReader, MemoryWriter, Writer};
use gtfs::{
    files, Agency, Calendar, EntityMap, ErrorKind, Feed, Frequency, Record, Route, Stop, StopTime,
    Transfer, Trip,
};

fn agency(id: &str) -> Agency {
    Agency {
        agency_id: id.to_string(),
        agency_name: format!("Agency {id}"),
        agency_url: "https://transit.example".to_string(),
        agency_timezone: "Europe/Berlin".to_string(),
        ..Default::default()
    }
}

fn route(id: &str, agency_id: &str) -> Route {
    Route {
        route_id: id.to_string(),
        agency_id: Some(agency_id.to_string()),
        route_short_name: Some(id.to_uppercase()),
        route_type: 3,
        ..Default::default()
    }
}

fn stop(id: &str, lat: f64) -> Stop {
    Stop {
        stop_id: id.to_string(),
        stop_name: Some(format!("Stop {id}")),
        stop_lat: Some(lat),
        stop_lon: Some(13.4),
        ..Default::default()
    }
}

fn trip(id: &str, route_id: &str) -> Trip {
    Trip {
        trip_id: id.to_string(),
        route_id: route_id.to_string(),
        service_id: "weekdays".to_string(),
        ..Default::default()
    }
}

fn stop_time(trip_id: &str, stop_id: &str, seq: u32, time: Option<u32>) -> StopTime {
    StopTime {
        trip_id: trip_id.to_string(),
        stop_id: stop_id.to_string(),
        stop_sequence: seq,
        arrival_time: time,
        departure_time: time,
        ..Default::default()
    }
}

fn calendar() -> Calendar {
    Calendar {
        service_id: "weekdays".to_string(),
        monday: true,
        tuesday: true,
        wednesday: true,
        thursday: true,
        friday: true,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        ..Default::default()
    }
}

/// Two agencies' worth of service, where route r3 points at an agency that doesn't exist
fn small_feed() -> Feed {
    let mut feed = Feed::default();
    feed.agencies.push(agency("a1"));
    feed.agencies.push(agency("a2"));
    feed.routes.push(route("r1", "a1"));
    feed.routes.push(route("r2", "a2"));
    feed.routes.push(route("r3", "gone"));
    for (idx, id) in ["s1", "s2", "s3", "s4"].into_iter().enumerate() {
        feed.stops.push(stop(id, 52.50 + 0.01 * idx as f64));
    }
    feed.trips.push(trip("t1", "r1"));
    feed.trips.push(trip("t2", "r2"));
    feed.trips.push(trip("t3", "r3"));
    for (trip_id, stops) in [
        ("t1", ["s1", "s2", "s3"]),
        ("t2", ["s1", "s2", "s3"]),
        ("t3", ["s4", "s2", "s1"]),
    ] {
        for (idx, stop_id) in stops.into_iter().enumerate() {
            // The middle stop has no time
            let time = (idx != 1).then(|| 8 * 3600 + idx as u32 * 600);
            feed.stop_times.push(stop_time(trip_id, stop_id, idx as u32 + 1, time));
        }
    }
    feed.calendars.push(calendar());
    feed.frequencies.push(Frequency {
        trip_id: "t1".to_string(),
        start_time: 6 * 3600,
        end_time: 9 * 3600,
        headway_secs: 600,
        ..Default::default()
    });
    feed.frequencies.push(Frequency {
        trip_id: "t3".to_string(),
        start_time: 6 * 3600,
        end_time: 9 * 3600,
        headway_secs: 600,
        ..Default::default()
    });
    feed.transfers.push(Transfer {
        from_stop_id: "s1".to_string(),
        to_stop_id: "s3".to_string(),
        ..Default::default()
    });
    feed.transfers.push(Transfer {
        from_stop_id: "s1".to_string(),
        to_stop_id: "s4".to_string(),
        ..Default::default()
    });
    feed
}

fn copy_to_memory(
    feed: Feed,
    opts: Options,
    marker: Option<Box<dyn Marker>>,
) -> (CopyResult, Feed) {
    let mut reader = MemoryReader::new(feed);
    let mut writer = MemoryWriter::with_key_prefix("dst:");
    let mut copier = Copier::new(&mut reader, &mut writer, opts);
    if let Some(marker) = marker {
        copier = copier.with_marker(marker);
    }
    let result = copier.copy();
    (result, writer.feed)
}

#[test]
fn every_reference_points_at_a_destination_key() {
    let (result, out) = copy_to_memory(
        small_feed(),
        Options {
            allow_reference_errors: false,
            ..Default::default()
        },
        None,
    );
    assert_eq!(out.agencies.len(), 2);
    // r3's agency doesn't exist, so r3 and t3 are left out
    assert_eq!(out.routes.len(), 2);
    assert_eq!(result.error_count(files::ROUTES, ErrorKind::InvalidReference), 1);
    assert_eq!(out.trips.len(), 2);

    assert!(out.routes.iter().all(|r| r
        .agency_id
        .as_deref()
        .unwrap()
        .starts_with("dst:")));
    assert!(out
        .trips
        .iter()
        .all(|t| t.route_id.starts_with("dst:") && t.service_id == "dst:weekdays"));
    assert!(out
        .stop_times
        .iter()
        .all(|st| st.trip_id.starts_with("dst:") && st.stop_id.starts_with("dst:")));
    assert_eq!(out.stop_times.len(), 6);
    assert_eq!(out.frequencies.len(), 1);
    assert_eq!(out.transfers.len(), 2);
    assert!(!result.write_failed());
}

#[test]
fn graph_marker_only_copies_reachable_entities() {
    let feed = small_feed();
    let marker = GraphMarker::build(&mut MemoryReader::new(feed.clone())).unwrap();
    assert!(marker.is_visited(files::ROUTES, "r3"));
    assert!(!marker.is_marked(files::ROUTES, "r3"));
    assert!(marker.is_visited(files::STOPS, "s4"));
    assert!(!marker.is_marked(files::STOPS, "s4"));

    let (result, out) = copy_to_memory(feed, Options::default(), Some(Box::new(marker)));
    // Unmarked, so silently skipped rather than failing to resolve
    assert_eq!(result.error_count(files::ROUTES, ErrorKind::InvalidReference), 0);
    assert_eq!(result.skipped(files::ROUTES, SkipReason::Unmarked), 1);
    assert_eq!(result.skipped(files::STOP_TIMES, SkipReason::Unmarked), 3);

    let stops: Vec<&str> = out.stops.iter().map(|s| s.stop_id.as_str()).collect();
    assert_eq!(stops, vec!["s1", "s2", "s3"]);
    // Only t1's frequency, and only the transfer between marked stops
    assert_eq!(out.frequencies.len(), 1);
    assert_eq!(out.transfers.len(), 1);
    assert_eq!(out.transfers[0].to_stop_id, "dst:s3");
}

#[test]
fn trips_without_stop_times_are_flagged_but_copied() {
    let mut feed = Feed::default();
    feed.agencies.push(agency("a1"));
    feed.routes.push(route("r1", "a1"));
    feed.trips.push(trip("t1", "r1"));
    feed.stops.push(stop("lonely", 52.5));
    feed.calendars.push(calendar());

    let marker = GraphMarker::build(&mut MemoryReader::new(feed.clone())).unwrap();
    assert!(marker.is_visited(files::TRIPS, "t1"));
    assert!(marker.is_visited(files::STOPS, "lonely"));
    assert!(!marker.is_marked(files::STOPS, "lonely"));
    assert_eq!(marker.counts(files::TRIPS), (1, 0));

    let (result, out) = copy_to_memory(feed, Options::default(), Some(Box::new(marker)));
    assert_eq!(out.trips.len(), 1);
    assert_eq!(out.trips[0].route_id, "dst:r1");
    assert_eq!(result.error_count(files::TRIPS, ErrorKind::EmptyTrip), 1);
    assert!(out.stops.is_empty());
    // stop_times.txt is missing entirely
    assert_eq!(result.error_count(files::STOP_TIMES, ErrorKind::MissingFile), 1);
}

#[test]
fn mark_all_is_a_baseline_for_a_full_copy() {
    let mut feed = small_feed();
    feed.routes.retain(|r| r.route_id != "r3");
    feed.trips.retain(|t| t.trip_id != "t3");
    feed.stop_times.retain(|st| st.trip_id != "t3");
    feed.frequencies.retain(|f| f.trip_id != "t3");

    let marker = MarkAll::build(&mut MemoryReader::new(feed.clone())).unwrap();
    let expected: Vec<String> = marker
        .visited_keys(files::STOPS)
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    assert_eq!(marker.visited_keys(files::TRIPS), vec!["t1", "t2"]);

    let (result, out) = copy_to_memory(feed, Options::default(), Some(Box::new(marker)));
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    // Unused stops are copied too
    let mut actual: Vec<String> = out.stops.iter().map(|s| s.stop_id.clone()).collect();
    actual.sort();
    assert_eq!(actual, expected);
    assert_eq!(expected.len(), 4);
}

#[test]
fn interpolates_along_generated_shapes() {
    let (result, out) = copy_to_memory(
        small_feed(),
        Options {
            interpolate_stop_times: true,
            create_missing_shapes: true,
            ..Default::default()
        },
        None,
    );
    // t1 and t2 visit the same stops, so share a pattern and a shape
    assert_eq!(out.shapes.len(), 1);
    assert_eq!(result.files[files::SHAPES].generated, 1);
    assert_eq!(out.trips[0].shape_id, out.trips[1].shape_id);
    assert_eq!(result.interpolated_stop_times, 2);

    let middle = &out.stop_times[1];
    assert!(middle.interpolated);
    assert_eq!(middle.arrival_time, Some(8 * 3600 + 600));
    let first = out.stop_times[0].shape_dist_traveled.unwrap();
    let last = out.stop_times[2].shape_dist_traveled.unwrap();
    assert_eq!(first, 0.0);
    assert!(last > 2000.0 && last < 2500.0, "{last}");
}

struct SkipRoute(&'static str);

impl EntityFilter for SkipRoute {
    fn filter(&mut self, ent: &mut Record, _: &EntityMap) -> Result<()> {
        if let Record::Route(route) = ent {
            if route.route_id == self.0 {
                bail!("not wanted");
            }
        }
        Ok(())
    }
}

#[test]
fn filters_drop_entities_without_failing() {
    let mut reader = MemoryReader::new(small_feed());
    let mut writer = MemoryWriter::new();
    let mut copier = Copier::new(&mut reader, &mut writer, Options::default());
    copier.add_filter(Box::new(SkipRoute("r2")));
    let result = copier.copy();

    assert_eq!(result.skipped(files::ROUTES, SkipReason::Filtered), 1);
    // t2 can't resolve its route now
    assert_eq!(result.skipped(files::TRIPS, SkipReason::ReferenceErrors), 2);
    assert_eq!(writer.feed.routes.len(), 1);
    assert_eq!(writer.feed.trips.len(), 1);
}

/// Writes single entities fine, but fails every batch
struct BatchesFail(MemoryWriter);

impl Writer for BatchesFail {
    fn open(&mut self) -> Result<()> {
        self.0.open()
    }

    fn close(&mut self) -> Result<()> {
        self.0.close()
    }

    fn create(&mut self) -> Result<()> {
        self.0.create()
    }

    fn add_entity(&mut self, ent: &Record) -> Result<String> {
        self.0.add_entity(ent)
    }

    fn add_entities(&mut self, _: &[Record]) -> Result<Vec<String>> {
        bail!("connection reset")
    }
}

#[test]
fn write_failures_are_recorded_and_copying_continues() {
    let mut reader = MemoryReader::new(small_feed());
    let mut writer = BatchesFail(MemoryWriter::new());
    let result = Copier::new(
        &mut reader,
        &mut writer,
        Options {
            batch_size: 2,
            ..Default::default()
        },
    )
    .copy();

    assert!(result.write_failed());
    assert_eq!(result.written(files::STOP_TIMES), 0);
    // Every stop time of t1 and t2 is lost, whether its batch failed or came after
    assert_eq!(result.skipped(files::STOP_TIMES, SkipReason::WriteFailed), 6);
    // Later files still get copied
    assert_eq!(writer.0.feed.frequencies.len(), 1);
    assert_eq!(writer.0.feed.transfers.len(), 2);
}

/// Refuses to open at all
struct Unreachable;

impl Writer for Unreachable {
    fn open(&mut self) -> Result<()> {
        bail!("no route to host")
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn create(&mut self) -> Result<()> {
        Ok(())
    }

    fn add_entity(&mut self, _: &Record) -> Result<String> {
        bail!("not open")
    }

    fn add_entities(&mut self, _: &[Record]) -> Result<Vec<String>> {
        bail!("not open")
    }
}

#[test]
fn source_is_closed_when_destination_wont_open() {
    let mut reader = MemoryReader::new(small_feed());
    let result = Copier::new(&mut reader, &mut Unreachable, Options::default()).copy();

    assert!(result.write_failed());
    assert_eq!(result.written(files::AGENCY), 0);
    assert!(!reader.is_open());
}

fn write_file(dir: &Path, name: &str, contents: &str) {
    let mut file = std::fs::File::create(dir.join(name)).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
}

#[test]
fn copies_a_gtfs_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    std::fs::create_dir(&src).unwrap();
    write_file(
        &src,
        "agency.txt",
        "agency_id,agency_name,agency_url,agency_timezone\n\
         a1,Metro,https://metro.example,Europe/Berlin\n",
    );
    write_file(
        &src,
        "routes.txt",
        "route_id,agency_id,route_short_name,route_long_name,route_type\n\
         r1,,1,,715\n",
    );
    write_file(
        &src,
        "stops.txt",
        "stop_id,stop_name,stop_lat,stop_lon\n\
         a,A,52.50,13.4\n\
         b,B,52.51,13.4\n\
         c,C,52.52,13.4\n",
    );
    write_file(
        &src,
        "trips.txt",
        "route_id,service_id,trip_id\n\
         r1,weekdays,t1\n",
    );
    write_file(
        &src,
        "stop_times.txt",
        "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
         t1,08:20:00,08:20:00,c,3\n\
         t1,08:00:00,08:00:00,a,1\n\
         t1,,,b,2\n",
    );
    write_file(
        &src,
        "calendar.txt",
        "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
         weekdays,1,1,1,1,1,0,0,20240101,20241231\n",
    );

    let mut reader = MemoryReader::new(Feed::load_from_dir(&src).unwrap());
    let out_dir = tmp.path().join("out");
    let mut writer = CsvWriter::new(&out_dir);
    writer.create().unwrap();
    let result = Copier::new(
        &mut reader,
        &mut writer,
        Options {
            interpolate_stop_times: true,
            create_missing_shapes: true,
            use_basic_route_types: true,
            ..Default::default()
        },
    )
    .copy();
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let out = Feed::load_from_dir(&out_dir).unwrap();
    // The only agency fills in the blank agency_id
    assert_eq!(out.routes[0].agency_id.as_deref(), Some("a1"));
    assert_eq!(out.routes[0].route_type, 3);
    assert_eq!(out.trips[0].shape_id.as_deref(), Some("generated-0"));
    assert_eq!(out.shapes[0].points.len(), 3);

    let times: Vec<Option<u32>> = out.stop_times.iter().map(|st| st.arrival_time).collect();
    assert_eq!(
        times,
        vec![Some(8 * 3600), Some(8 * 3600 + 600), Some(8 * 3600 + 1200)]
    );
    assert!(out.stop_times.iter().all(|st| st.shape_dist_traveled.is_some()));
}
