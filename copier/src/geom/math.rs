use geo_types::Coord;

/// In meters
const EARTH_RADIUS: f64 = 6_371_000.0;

/// Great-circle distance in meters between two (lon, lat) points
pub fn haversine(a: Coord, b: Coord) -> f64 {
    let d_lat = (b.y - a.y).to_radians();
    let d_lon = (b.x - a.x).to_radians();

    let h = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + a.y.to_radians().cos() * b.y.to_radians().cos() * (d_lon / 2.0).sin() * (d_lon / 2.0).sin();
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS * c
}

/// Sum of the haversine distances along a polyline
pub fn length(pts: &[Coord]) -> f64 {
    pts.windows(2).map(|pair| haversine(pair[0], pair[1])).sum()
}

/// The closest point to `pt` on the segment from `a` to `b`, in raw coordinate space.
pub fn closest_point_on_segment(pt: Coord, a: Coord, b: Coord) -> Coord {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_squared = dx * dx + dy * dy;
    if len_squared == 0.0 {
        return a;
    }
    let t = (((pt.x - a.x) * dx + (pt.y - a.y) * dy) / len_squared).clamp(0.0, 1.0);
    Coord {
        x: a.x + t * dx,
        y: a.y + t * dy,
    }
}

fn euclidean_squared(a: Coord, b: Coord) -> f64 {
    (a.x - b.x).powi(2) + (a.y - b.y).powi(2)
}

/// For every stop, how far along the line its closest point is, as a fraction of the line's
/// length. Each stop is matched independently against every segment, so the result isn't
/// necessarily non-decreasing.
pub fn line_positions(line: &[Coord], stops: &[Coord]) -> Vec<f64> {
    let total = length(line);
    if line.len() < 2 || total == 0.0 {
        return vec![0.0; stops.len()];
    }

    // Distance from the start of the line to the start of each segment
    let mut dist_to_segment = Vec::with_capacity(line.len() - 1);
    let mut so_far = 0.0;
    for pair in line.windows(2) {
        dist_to_segment.push(so_far);
        so_far += haversine(pair[0], pair[1]);
    }

    stops
        .iter()
        .map(|stop| {
            let mut best: Option<(f64, f64)> = None;
            for (idx, pair) in line.windows(2).enumerate() {
                let closest = closest_point_on_segment(*stop, pair[0], pair[1]);
                let dist = euclidean_squared(*stop, closest);
                if best.map(|(best_dist, _)| dist < best_dist).unwrap_or(true) {
                    best = Some((dist, dist_to_segment[idx] + haversine(pair[0], closest)));
                }
            }
            let along = best.map(|(_, along)| along).unwrap_or(0.0);
            (along / total).clamp(0.0, 1.0)
        })
        .collect()
}

/// Positions from the cumulative distance between consecutive stops. Always non-decreasing.
pub fn stop_positions(stops: &[Coord]) -> Vec<f64> {
    let total = length(stops);
    let mut positions = Vec::with_capacity(stops.len());
    let mut so_far = 0.0;
    for (idx, stop) in stops.iter().enumerate() {
        if idx > 0 {
            so_far += haversine(stops[idx - 1], *stop);
        }
        positions.push(if total == 0.0 { 0.0 } else { so_far / total });
    }
    positions
}

pub fn is_non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|pair| pair[0] <= pair[1])
}
