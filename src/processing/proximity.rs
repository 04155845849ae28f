//! Nearest and facing known-point lookups
//!
//! Both lookups are stable linear scans over the caller's list: the list is
//! small and static, and ties go to the first point in list order.

use crate::algorithms::angles::shortest_arc_difference;
use crate::algorithms::geodesy::DistanceModel;
use crate::core::{GeoPoint, Location, NearestPoint, DEFAULT_FACING_TOLERANCE_DEG};

/// Point with the smallest distance from `location`, or `None` for an empty list
pub fn nearest_point(location: &Location, known_points: &[GeoPoint], model: DistanceModel) -> Option<NearestPoint> {
    let mut best: Option<(&GeoPoint, f64)> = None;

    for point in known_points {
        let distance = model.distance_m(location, &point.location());
        // Strict comparison keeps the earlier point on ties
        if best.map_or(true, |(_, min)| distance < min) {
            best = Some((point, distance));
        }
    }

    best.map(|(point, distance_m)| NearestPoint {
        point: point.clone(),
        distance_m,
    })
}

/// Closest point whose bearing lies within `tolerance_deg` of `heading_deg`.
///
/// Candidates are filtered by angular difference (inclusive) and then ranked
/// by distance, not by how well they line up with the heading: a nearer
/// landmark hides one behind it.
pub fn facing_point(
    location: &Location,
    heading_deg: f64,
    known_points: &[GeoPoint],
    tolerance_deg: f64,
    model: DistanceModel,
) -> Option<GeoPoint> {
    if !heading_deg.is_finite() {
        return None;
    }

    let mut best: Option<(&GeoPoint, f64)> = None;

    for point in known_points {
        let geodesic = model.solve(location, &point.location());
        let offset = shortest_arc_difference(heading_deg, geodesic.initial_bearing_deg);
        if offset > tolerance_deg {
            continue;
        }
        if best.map_or(true, |(_, min)| geodesic.distance_m < min) {
            best = Some((point, geodesic.distance_m));
        }
    }

    best.map(|(point, _)| point.clone())
}

/// `facing_point` with the default 15 degree tolerance
pub fn facing_point_default(
    location: &Location,
    heading_deg: f64,
    known_points: &[GeoPoint],
    model: DistanceModel,
) -> Option<GeoPoint> {
    facing_point(location, heading_deg, known_points, DEFAULT_FACING_TOLERANCE_DEG, model)
}
