//! Orientation, geomagnetic and geodetic algorithms

pub mod angles;
pub mod cardinal;
pub mod geodesy;
pub mod geomagnetic;
pub mod orientation;

pub use angles::{normalize_degrees, shortest_arc_difference};
pub use cardinal::CardinalDirection;
pub use geodesy::{DistanceModel, Geodesic};
pub use geomagnetic::{DeclinationModel, FixedDeclination, GeomagneticModel, MagneticField};
pub use orientation::{Axis, DisplayRotation, RemapAxes};
