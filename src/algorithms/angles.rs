//! Angle helpers shared by the heading and proximity code

/// Wrap an angle in degrees into [0, 360)
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Absolute difference between two headings along the shorter arc, in [0, 180]
pub fn shortest_arc_difference(a_degrees: f64, b_degrees: f64) -> f64 {
    let diff = (normalize_degrees(a_degrees) - normalize_degrees(b_degrees)).abs();
    diff.min(360.0 - diff)
}
