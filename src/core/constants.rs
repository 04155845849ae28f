//! Physical constants and engine defaults

/// Standard gravity (m/s^2)
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Accelerometer readings below 10% of g are treated as free fall
pub const FREE_FALL_GRAVITY_SQUARED: f64 = 0.01 * STANDARD_GRAVITY * STANDARD_GRAVITY;

/// Minimum norm of the east vector (E x A) for a usable rotation matrix
pub const MIN_EAST_VECTOR_NORM: f64 = 0.1;

/// WGS84 semi-major axis (meters)
pub const WGS84_SEMI_MAJOR_AXIS_M: f64 = 6378137.0;

/// WGS84 flattening
pub const WGS84_FLATTENING: f64 = 1.0 / 298.257223563;

/// WGS84 semi-minor axis (meters)
pub const WGS84_SEMI_MINOR_AXIS_M: f64 = WGS84_SEMI_MAJOR_AXIS_M * (1.0 - WGS84_FLATTENING);

/// IUGG mean Earth radius used by the spherical distance model (meters)
pub const EARTH_MEAN_RADIUS_M: f64 = 6371008.8;

/// Default half-angle of the facing cone (degrees)
pub const DEFAULT_FACING_TOLERANCE_DEG: f64 = 15.0;

/// Default minimum interval between unchanged heading notifications
pub const DEFAULT_HEADING_UPDATE_INTERVAL_MS: u64 = 5000;
