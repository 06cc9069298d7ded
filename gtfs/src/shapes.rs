use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{entity_basics, require};
use crate::{files, Entity, EntityError, Problems};

/// One polyline. shapes.txt has a row per point; those are grouped here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    pub shape_id: String,
    /// Sorted by sequence
    pub points: Vec<ShapePoint>,

    /// Not from the source; made by connecting stops
    pub generated: bool,
    pub problems: Problems,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShapePoint {
    pub lon: f64,
    pub lat: f64,
    pub sequence: u32,
    pub dist_traveled: Option<f64>,
}

/// The CSV representation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShapeRow {
    pub shape_id: String,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
    #[serde(default)]
    pub shape_dist_traveled: Option<f64>,
}

impl Shape {
    /// Groups rows by shape_id, sorting each shape by shape_pt_sequence in case the file isn't in
    /// order. Shapes are returned sorted by ID.
    pub fn from_rows<I: IntoIterator<Item = ShapeRow>>(rows: I) -> Vec<Shape> {
        let mut pts_per_shape: BTreeMap<String, Vec<ShapePoint>> = BTreeMap::new();
        for rec in rows {
            pts_per_shape
                .entry(rec.shape_id)
                .or_insert_with(Vec::new)
                .push(ShapePoint {
                    lon: rec.shape_pt_lon,
                    lat: rec.shape_pt_lat,
                    sequence: rec.shape_pt_sequence,
                    dist_traveled: rec.shape_dist_traveled,
                });
        }

        pts_per_shape
            .into_iter()
            .map(|(shape_id, mut points)| {
                points.sort_by_key(|pt| pt.sequence);
                Shape {
                    shape_id,
                    points,
                    generated: false,
                    problems: Problems::default(),
                }
            })
            .collect()
    }

    pub fn to_rows(&self) -> Vec<ShapeRow> {
        self.points
            .iter()
            .map(|pt| ShapeRow {
                shape_id: self.shape_id.clone(),
                shape_pt_lat: pt.lat,
                shape_pt_lon: pt.lon,
                shape_pt_sequence: pt.sequence,
                shape_dist_traveled: pt.dist_traveled,
            })
            .collect()
    }
}

impl Entity for Shape {
    entity_basics!(files::SHAPES, shape_id);

    fn validate(&self) -> Vec<EntityError> {
        let mut errors = Vec::new();
        require(&mut errors, "shape_id", &self.shape_id);
        if self.points.len() < 2 {
            errors.push(
                EntityError::invalid("shape_pt_sequence", self.points.len())
                    .message("a shape needs at least two points"),
            );
        }
        for pt in &self.points {
            if !(-90.0..=90.0).contains(&pt.lat) {
                errors.push(EntityError::invalid("shape_pt_lat", pt.lat));
            }
            if !(-180.0..=180.0).contains(&pt.lon) {
                errors.push(EntityError::invalid("shape_pt_lon", pt.lon));
            }
        }
        for pair in self.points.windows(2) {
            if let (Some(d1), Some(d2)) = (pair[0].dist_traveled, pair[1].dist_traveled) {
                if d2 < d1 {
                    errors.push(
                        EntityError::invalid("shape_dist_traveled", d2)
                            .message("shape_dist_traveled must not decrease"),
                    );
                    break;
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, seq: u32, lon: f64) -> ShapeRow {
        ShapeRow {
            shape_id: id.to_string(),
            shape_pt_lat: 0.0,
            shape_pt_lon: lon,
            shape_pt_sequence: seq,
            shape_dist_traveled: None,
        }
    }

    #[test]
    fn groups_and_sorts_points() {
        let shapes = Shape::from_rows(vec![
            row("b", 2, 2.0),
            row("a", 5, 1.0),
            row("b", 1, 1.0),
            row("a", 3, 0.5),
        ]);
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].shape_id, "a");
        let lons: Vec<f64> = shapes[1].points.iter().map(|pt| pt.lon).collect();
        assert_eq!(lons, vec![1.0, 2.0]);
        assert_eq!(shapes[1].to_rows()[0].shape_pt_sequence, 1);
    }

    #[test]
    fn needs_two_points() {
        let shapes = Shape::from_rows(vec![row("a", 1, 0.0)]);
        assert_eq!(shapes[0].validate().len(), 1);
    }
}
