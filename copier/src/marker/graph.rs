use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use gtfs::adapters::Reader;
use gtfs::{files, Entity};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use super::{MarkTable, Marker};

/// Files copied in full, regardless of what else is reachable
const ALWAYS_MARKED: [&str; 5] = [
    files::TRANSFERS,
    files::FREQUENCIES,
    files::FARE_RULES,
    files::FARE_ATTRIBUTES,
    files::FEED_INFO,
];

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Node {
    Trip(String),
    Stop(String),
    Service(String),
    Shape(String),
}

/// Selects only what's reachable from the routes of marked agencies: their trips, and the stops
/// (with parent stations), services and shapes those trips use.
///
/// Every agency is marked, so this drops routes pointing at unknown agencies and everything only
/// they use. The whole traversal happens once, up front.
pub struct GraphMarker {
    table: MarkTable,
    /// Number of stop times per trip
    stop_time_counts: BTreeMap<String, usize>,
    /// Number of stop times of marked trips using each stop
    stop_usage: BTreeMap<String, usize>,
    shape_points: BTreeMap<String, usize>,
}

impl GraphMarker {
    pub fn build(reader: &mut dyn Reader) -> Result<Self> {
        let mut table = MarkTable::default();
        let mut graph: DiGraph<Node, ()> = DiGraph::new();
        let mut nodes: HashMap<Node, NodeIndex> = HashMap::new();
        let mut node = |graph: &mut DiGraph<Node, ()>, n: Node| -> NodeIndex {
            *nodes.entry(n.clone()).or_insert_with(|| graph.add_node(n))
        };

        for agency in reader.agencies()? {
            table.mark(files::AGENCY, agency.entity_id());
        }

        for route in reader.routes()? {
            let agency_marked = match route.agency_id.as_deref() {
                None | Some("") => true,
                Some(agency_id) => table.get(files::AGENCY, agency_id).marked,
            };
            if agency_marked {
                table.mark(files::ROUTES, &route.route_id);
            } else {
                table.visit(files::ROUTES, &route.route_id);
            }
        }

        let mut marked_trips = Vec::new();
        for trip in reader.trips()? {
            let trip_node = node(&mut graph, Node::Trip(trip.trip_id.clone()));
            let service = node(&mut graph, Node::Service(trip.service_id.clone()));
            graph.add_edge(trip_node, service, ());
            if let Some(shape_id) = trip.shape() {
                let shape = node(&mut graph, Node::Shape(shape_id.to_string()));
                graph.add_edge(trip_node, shape, ());
            }

            if route_marked(&table, &trip.route_id) {
                table.mark(files::TRIPS, &trip.trip_id);
                marked_trips.push(trip_node);
            } else {
                table.visit(files::TRIPS, &trip.trip_id);
            }
        }

        let mut stop_time_counts = BTreeMap::new();
        let mut stop_usage = BTreeMap::new();
        let mut seen_edges = HashMap::new();
        for st in reader.stop_times()? {
            *stop_time_counts.entry(st.trip_id.clone()).or_insert(0) += 1;
            if table.get(files::TRIPS, &st.trip_id).marked {
                *stop_usage.entry(st.stop_id.clone()).or_insert(0) += 1;
            }

            let trip_node = node(&mut graph, Node::Trip(st.trip_id.clone()));
            let stop_node = node(&mut graph, Node::Stop(st.stop_id.clone()));
            // Trips revisit the same stops constantly; one edge is enough
            seen_edges
                .entry((trip_node, stop_node))
                .or_insert_with(|| graph.add_edge(trip_node, stop_node, ()));
        }

        for stop in reader.stops()? {
            table.visit(files::STOPS, &stop.stop_id);
            if let Some(parent) = stop.parent() {
                let stop_node = node(&mut graph, Node::Stop(stop.stop_id.clone()));
                let parent_node = node(&mut graph, Node::Stop(parent.to_string()));
                graph.add_edge(stop_node, parent_node, ());
            }
        }

        for calendar in reader.calendars()? {
            table.visit(files::CALENDAR, &calendar.service_id);
        }
        for date in reader.calendar_dates()? {
            table.visit(files::CALENDAR_DATES, &date.service_id);
        }

        let mut shape_points = BTreeMap::new();
        for shape in reader.shapes()? {
            table.visit(files::SHAPES, &shape.shape_id);
            shape_points.insert(shape.shape_id.clone(), shape.points.len());
        }

        // Everything reachable from a marked trip gets marked
        let mut dfs = Dfs::empty(&graph);
        for start in marked_trips {
            dfs.move_to(start);
            while let Some(idx) = dfs.next(&graph) {
                match &graph[idx] {
                    // Only reachable through stop_times of a trip that's already marked
                    Node::Trip(_) => {}
                    Node::Stop(id) => table.mark(files::STOPS, id),
                    Node::Service(id) => {
                        table.mark(files::CALENDAR, id);
                        table.mark(files::CALENDAR_DATES, id);
                    }
                    Node::Shape(id) => table.mark(files::SHAPES, id),
                }
            }
        }

        let marker = Self {
            table,
            stop_time_counts,
            stop_usage,
            shape_points,
        };
        for filename in [files::ROUTES, files::TRIPS, files::STOPS, files::SHAPES] {
            let (visited, marked) = marker.counts(filename);
            info!("Marked {marked} of {visited} in {filename}");
        }
        Ok(marker)
    }

    /// (visited, marked) for one file. Trips without stop times don't count as marked, and
    /// shapes are counted in points.
    pub fn counts(&self, filename: &str) -> (usize, usize) {
        match filename {
            files::TRIPS => {
                let (visited, _) = self.table.counts(filename);
                let marked = self
                    .stop_time_counts
                    .keys()
                    .filter(|trip| self.table.get(files::TRIPS, trip).marked)
                    .count();
                (visited, marked)
            }
            files::STOP_TIMES => {
                let mut visited = 0;
                let mut marked = 0;
                for (trip, count) in &self.stop_time_counts {
                    visited += count;
                    if self.table.get(files::TRIPS, trip).marked {
                        marked += count;
                    }
                }
                (visited, marked)
            }
            files::SHAPES => {
                let mut visited = 0;
                let mut marked = 0;
                for (shape, points) in &self.shape_points {
                    visited += points;
                    if self.table.get(files::SHAPES, shape).marked {
                        marked += points;
                    }
                }
                (visited, marked)
            }
            _ => self.table.counts(filename),
        }
    }

    /// How many stop times of marked trips use this stop
    pub fn stop_usage(&self, stop_id: &str) -> usize {
        self.stop_usage.get(stop_id).copied().unwrap_or(0)
    }

    /// How many stop times this trip has in the source
    pub fn stop_time_count(&self, trip_id: &str) -> usize {
        self.stop_time_counts.get(trip_id).copied().unwrap_or(0)
    }
}

fn route_marked(table: &MarkTable, route_id: &str) -> bool {
    route_id.is_empty() || table.get(files::ROUTES, route_id).marked
}

impl Marker for GraphMarker {
    fn is_marked(&self, filename: &str, id: &str) -> bool {
        id.is_empty() || ALWAYS_MARKED.contains(&filename) || self.table.get(filename, id).marked
    }

    fn is_visited(&self, filename: &str, id: &str) -> bool {
        id.is_empty() || ALWAYS_MARKED.contains(&filename) || self.table.get(filename, id).visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs::adapters::MemoryReader;
    use gtfs::{Agency, Calendar, Feed, Route, Shape, ShapePoint, Stop, StopTime, Trip};

    fn feed() -> Feed {
        let mut feed = Feed::default();
        feed.agencies.push(Agency {
            agency_id: "a1".to_string(),
            ..Default::default()
        });
        for (route_id, agency_id) in [("r1", "a1"), ("r2", "nobody"), ("r3", "")] {
            feed.routes.push(Route {
                route_id: route_id.to_string(),
                agency_id: Some(agency_id.to_string()),
                ..Default::default()
            });
        }
        for (trip_id, route_id, service_id, shape_id) in [
            ("t1", "r1", "weekday", Some("sh1")),
            ("t2", "r2", "weekend", Some("sh2")),
            ("t3", "r3", "weekday", None),
        ] {
            feed.trips.push(Trip {
                trip_id: trip_id.to_string(),
                route_id: route_id.to_string(),
                service_id: service_id.to_string(),
                shape_id: shape_id.map(|x| x.to_string()),
                ..Default::default()
            });
        }
        for (stop_id, parent) in [
            ("station", None),
            ("platform", Some("station")),
            ("s2", None),
            ("lonely", None),
        ] {
            feed.stops.push(Stop {
                stop_id: stop_id.to_string(),
                parent_station: parent.map(|x| x.to_string()),
                ..Default::default()
            });
        }
        for (trip_id, stop_id, seq) in [
            ("t1", "platform", 1),
            ("t1", "s2", 2),
            ("t1", "platform", 3),
            ("t2", "lonely", 1),
            ("t2", "s2", 2),
        ] {
            feed.stop_times.push(StopTime {
                trip_id: trip_id.to_string(),
                stop_id: stop_id.to_string(),
                stop_sequence: seq,
                ..Default::default()
            });
        }
        for service_id in ["weekday", "weekend"] {
            feed.calendars.push(Calendar {
                service_id: service_id.to_string(),
                ..Default::default()
            });
        }
        for (shape_id, n) in [("sh1", 3), ("sh2", 5)] {
            feed.shapes.push(Shape {
                shape_id: shape_id.to_string(),
                points: vec![ShapePoint::default(); n],
                ..Default::default()
            });
        }
        feed
    }

    #[test]
    fn marks_reachable_entities() {
        let marker = GraphMarker::build(&mut MemoryReader::new(feed())).unwrap();

        assert!(marker.is_marked(files::AGENCY, "a1"));
        assert!(marker.is_marked(files::ROUTES, "r1"));
        assert!(marker.is_marked(files::ROUTES, "r3"));
        assert!(!marker.is_marked(files::ROUTES, "r2"));
        assert!(marker.is_visited(files::ROUTES, "r2"));

        assert!(marker.is_marked(files::TRIPS, "t1"));
        assert!(!marker.is_marked(files::TRIPS, "t2"));
        // No stop times, but still marked
        assert!(marker.is_marked(files::TRIPS, "t3"));

        assert!(marker.is_marked(files::STOPS, "platform"));
        assert!(marker.is_marked(files::STOPS, "station"));
        assert!(marker.is_marked(files::STOPS, "s2"));
        assert!(!marker.is_marked(files::STOPS, "lonely"));
        assert!(marker.is_visited(files::STOPS, "lonely"));

        assert!(marker.is_marked(files::CALENDAR, "weekday"));
        assert!(marker.is_marked(files::CALENDAR_DATES, "weekday"));
        assert!(!marker.is_marked(files::CALENDAR, "weekend"));
        assert!(marker.is_marked(files::SHAPES, "sh1"));
        assert!(!marker.is_marked(files::SHAPES, "sh2"));

        assert!(marker.is_marked(files::TRANSFERS, "anything"));
        assert!(marker.is_marked(files::STOP_TIMES, ""));

        assert_eq!(marker.stop_usage("platform"), 2);
        assert_eq!(marker.stop_usage("lonely"), 0);
        assert_eq!(marker.stop_time_count("t3"), 0);
    }

    #[test]
    fn counts_for_reporting() {
        let marker = GraphMarker::build(&mut MemoryReader::new(feed())).unwrap();
        // t3 is marked, but has no stop times
        assert_eq!(marker.counts(files::TRIPS), (3, 1));
        assert_eq!(marker.counts(files::STOP_TIMES), (5, 3));
        assert_eq!(marker.counts(files::SHAPES), (8, 3));
        assert_eq!(marker.counts(files::STOPS), (4, 3));
    }
}
