//! Stop and shape geometry seen so far in a copy, used to make up shapes for trips without one and
//! to fill in missing stop time distances and times.

pub mod math;

use std::collections::HashMap;

use geo_types::Coord;
use gtfs::{EntityError, ErrorKind, Shape, ShapePoint, Stop, StopTime, Trip};

/// Where each stop of one stop pattern falls along one shape
struct Positions {
    /// Fractions of `length`, one per stop, non-decreasing
    relative: Vec<f64>,
    /// In meters
    length: f64,
}

#[derive(Default)]
pub struct GeomCache {
    stops: HashMap<String, Coord>,
    shapes: HashMap<String, Vec<Coord>>,
    // (shape ID or empty, stop pattern ID)
    positions: HashMap<(String, i32), Positions>,
}

impl GeomCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops without coordinates are ignored.
    pub fn add_stop(&mut self, stop: &Stop) {
        if let Some((lon, lat)) = stop.lon_lat() {
            self.stops.insert(stop.stop_id.clone(), Coord { x: lon, y: lat });
        }
    }

    pub fn add_shape(&mut self, shape: &Shape) {
        self.shapes.insert(
            shape.shape_id.clone(),
            shape
                .points
                .iter()
                .map(|pt| Coord {
                    x: pt.lon,
                    y: pt.lat,
                })
                .collect(),
        );
    }

    pub fn has_stop(&self, stop_id: &str) -> bool {
        self.stops.contains_key(stop_id)
    }

    pub fn has_shape(&self, shape_id: &str) -> bool {
        self.shapes.contains_key(shape_id)
    }

    fn stop_coords<'a, I: IntoIterator<Item = &'a str>>(
        &self,
        stop_ids: I,
    ) -> Result<Vec<Coord>, EntityError> {
        stop_ids
            .into_iter()
            .map(|id| {
                self.stops.get(id).copied().ok_or_else(|| {
                    EntityError::new(ErrorKind::InterpolationFailed)
                        .field("stop_id")
                        .value(id)
                        .message("no coordinates known for this stop")
                })
            })
            .collect()
    }

    /// Connects the stops in order to make a shape. The new shape is cached too.
    pub fn make_shape(&mut self, shape_id: &str, stop_ids: &[String]) -> Result<Shape, EntityError> {
        let pts = self.stop_coords(stop_ids.iter().map(|x| x.as_str()))?;

        let mut points = Vec::with_capacity(pts.len());
        let mut dist = 0.0;
        for (idx, pt) in pts.iter().enumerate() {
            if idx > 0 {
                dist += math::haversine(pts[idx - 1], *pt);
            }
            points.push(ShapePoint {
                lon: pt.x,
                lat: pt.y,
                sequence: idx as u32 + 1,
                dist_traveled: Some(dist),
            });
        }
        self.shapes.insert(shape_id.to_string(), pts);

        Ok(Shape {
            shape_id: shape_id.to_string(),
            points,
            generated: true,
            ..Default::default()
        })
    }

    /// Fills in missing `shape_dist_traveled` values, then linearly interpolates missing times
    /// between the nearest timed stops on either side. A stop with only one of its two times gets
    /// the other copied over first. Stops before the first or after the last timed stop are left
    /// alone. Returns how many stop times got interpolated times.
    pub fn interpolate_stop_times(
        &mut self,
        trip: &Trip,
        stop_times: &mut [StopTime],
    ) -> Result<usize, EntityError> {
        for st in stop_times.iter_mut() {
            st.fill_counterpart_time();
        }
        if stop_times
            .iter()
            .all(|st| st.has_times() && st.shape_dist_traveled.is_some())
        {
            return Ok(0);
        }

        let key = (
            trip.shape().unwrap_or("").to_string(),
            trip.stop_pattern_id,
        );
        if !self.positions.contains_key(&key) {
            let positions = self.calculate_positions(trip.shape(), stop_times)?;
            self.positions.insert(key.clone(), positions);
        }
        let positions = &self.positions[&key];
        if positions.relative.len() != stop_times.len() {
            return Err(EntityError::new(ErrorKind::InterpolationFailed)
                .field("stop_sequence")
                .message(format!(
                    "stop pattern {} has {} stops, but the trip has {}",
                    trip.stop_pattern_id,
                    positions.relative.len(),
                    stop_times.len()
                )));
        }

        for (st, rel) in stop_times.iter_mut().zip(positions.relative.iter()) {
            if st.shape_dist_traveled.is_none() {
                st.shape_dist_traveled = Some(rel * positions.length);
            }
        }

        Ok(interpolate_times(stop_times, &positions.relative))
    }

    fn calculate_positions(
        &self,
        shape_id: Option<&str>,
        stop_times: &[StopTime],
    ) -> Result<Positions, EntityError> {
        let stops = self.stop_coords(stop_times.iter().map(|st| st.stop_id.as_str()))?;
        let line = shape_id
            .and_then(|id| self.shapes.get(id))
            .filter(|pts| pts.len() >= 2);

        if let Some(line) = line {
            let relative = math::line_positions(line, &stops);
            if math::is_non_decreasing(&relative) {
                return Ok(Positions {
                    relative,
                    length: math::length(line),
                });
            }
            debug!(
                "Stops project out of order onto shape {}; using distances between stops instead",
                shape_id.unwrap_or("")
            );
            return Ok(Positions {
                relative: math::stop_positions(&stops),
                length: math::length(line),
            });
        }

        Ok(Positions {
            relative: math::stop_positions(&stops),
            length: math::length(&stops),
        })
    }
}

fn interpolate_times(stop_times: &mut [StopTime], relative: &[f64]) -> usize {
    let timed: Vec<usize> = stop_times
        .iter()
        .enumerate()
        .filter(|(_, st)| st.has_times())
        .map(|(idx, _)| idx)
        .collect();

    let mut count = 0;
    for pair in timed.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if end - start < 2 {
            continue;
        }
        // Both are timed, so these are always set
        let (Some(t1), Some(t2)) = (stop_times[start].leaves_at(), stop_times[end].arrives_at())
        else {
            continue;
        };
        let (p1, p2) = (relative[start], relative[end]);

        for idx in (start + 1)..end {
            let fraction = if p2 > p1 {
                (relative[idx] - p1) / (p2 - p1)
            } else {
                // Every stop in the gap is at the same spot; spread them evenly
                (idx - start) as f64 / (end - start) as f64
            };
            let time = t1 as f64 + fraction.clamp(0.0, 1.0) * (t2 as f64 - t1 as f64);
            let time = time.round() as u32;

            let st = &mut stop_times[idx];
            st.arrival_time = Some(time);
            st.departure_time = Some(time);
            st.interpolated = true;
            count += 1;
        }
    }
    count
}
