//! Core data types for the heading and proximity engine

use crate::algorithms::cardinal::CardinalDirection;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Named geographic point the user can be near to or facing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    /// The four neighbourhood points shipped with the AR demo
    pub fn demo_points() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new("My House", 33.60547247689105, -112.36485413089035),
            GeoPoint::new("Bob", 33.605585848613586, -112.36481255665254),
            GeoPoint::new("Shari", 33.605317777305, -112.36486351862148),
            GeoPoint::new("Adam", 33.60587842427303, -112.36441544869734),
        ]
    }

    /// Location at this point's coordinates, on the ellipsoid
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}

/// Geodetic fix reported by the location provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Height above the WGS84 ellipsoid (meters)
    #[serde(default)]
    pub altitude_m: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m: 0.0,
        }
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = altitude_m;
        self
    }

    /// True when both coordinates are finite and inside their geodetic ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.altitude_m.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Latest accelerometer and magnetometer readings, each replaced independently
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSample {
    /// Gravity + linear acceleration in device axes (m/s^2)
    pub accelerometer: Vector3<f64>,
    /// Ambient magnetic field in device axes (uT)
    pub magnetometer: Vector3<f64>,
}

impl SensorSample {
    pub fn new(accelerometer: [f64; 3], magnetometer: [f64; 3]) -> Self {
        Self {
            accelerometer: Vector3::from(accelerometer),
            magnetometer: Vector3::from(magnetometer),
        }
    }
}

/// Output of a single heading computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingResult {
    /// Heading in degrees, normalized to [0, 360)
    pub azimuth_degrees: f64,
    pub cardinal: CardinalDirection,
    /// Declination subtracted from the magnetic azimuth, if a fix was available
    pub declination_degrees: Option<f64>,
    /// Pitch of the remapped device frame (degrees)
    pub pitch_degrees: f64,
    /// Roll of the remapped device frame (degrees)
    pub roll_degrees: f64,
}

impl HeadingResult {
    pub fn cardinal_label(&self) -> &'static str {
        self.cardinal.label()
    }
}

/// Closest known point and how far away it is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestPoint {
    pub point: GeoPoint,
    pub distance_m: f64,
}

/// What the engine last knew about the user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserState {
    pub last_location: Option<Location>,
    pub last_heading: Option<HeadingResult>,
    /// Only used to suppress duplicate notifications
    pub last_notified_point_name: Option<String>,
}
