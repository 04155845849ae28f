//! Device orientation from gravity and geomagnetic vectors
//!
//! The rotation matrix maps device coordinates into a world frame whose
//! axes are (East, North, Up). Rows are built from:
//! - `H = E x A`, the horizontal east vector
//! - `M = A x H`, the horizontal magnetic-north vector
//! - `A`, the normalised gravity reaction (pointing up)
//!
//! Orientation angles follow the usual sensor conventions: azimuth about
//! -Z (clockwise from magnetic north), pitch about X and roll about Y.

use crate::core::{FREE_FALL_GRAVITY_SQUARED, MIN_EAST_VECTOR_NORM};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Signed device axis used when remapping the rotation matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    MinusX,
    MinusY,
    MinusZ,
}

impl Axis {
    fn index(&self) -> usize {
        match self {
            Axis::X | Axis::MinusX => 0,
            Axis::Y | Axis::MinusY => 1,
            Axis::Z | Axis::MinusZ => 2,
        }
    }

    fn is_negated(&self) -> bool {
        matches!(self, Axis::MinusX | Axis::MinusY | Axis::MinusZ)
    }
}

/// Pair of device axes that become the new X and Y of the world frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapAxes {
    pub x: Axis,
    pub y: Axis,
}

impl RemapAxes {
    /// Phone held upright with the camera looking at the horizon
    pub const CAMERA_FORWARD: RemapAxes = RemapAxes { x: Axis::X, y: Axis::Z };
    /// Phone lying flat, screen up
    pub const FLAT: RemapAxes = RemapAxes { x: Axis::X, y: Axis::Y };

    pub fn is_valid(&self) -> bool {
        self.x.index() != self.y.index()
    }
}

impl Default for RemapAxes {
    fn default() -> Self {
        RemapAxes::CAMERA_FORWARD
    }
}

/// Rotation of the display relative to the device's natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl DisplayRotation {
    pub fn offset_degrees(&self) -> f64 {
        match self {
            DisplayRotation::Rotation0 => 0.0,
            DisplayRotation::Rotation90 => 90.0,
            DisplayRotation::Rotation180 => 180.0,
            DisplayRotation::Rotation270 => 270.0,
        }
    }
}

/// Rotation and inclination matrices derived from one sensor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationSolution {
    pub rotation: Matrix3<f64>,
    pub inclination: Matrix3<f64>,
}

impl RotationSolution {
    /// Dip of the field below the horizon, positive when it points down
    pub fn magnetic_dip_degrees(&self) -> f64 {
        -self.inclination[(1, 2)]
            .atan2(self.inclination[(1, 1)])
            .to_degrees()
    }
}

/// Azimuth, pitch and roll in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationAngles {
    pub azimuth: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl OrientationAngles {
    pub fn azimuth_degrees(&self) -> f64 {
        self.azimuth.to_degrees()
    }
}

/// Build the device rotation matrix from gravity and geomagnetic readings.
///
/// Returns `None` when the device is in free fall, when either vector is
/// zero or non-finite, or when the field is (nearly) parallel to gravity.
pub fn rotation_matrix(gravity: &Vector3<f64>, geomagnetic: &Vector3<f64>) -> Option<RotationSolution> {
    if !gravity.iter().chain(geomagnetic.iter()).all(|v| v.is_finite()) {
        return None;
    }

    let norm_sq_a = gravity.norm_squared();
    if norm_sq_a < FREE_FALL_GRAVITY_SQUARED {
        return None;
    }

    let east = geomagnetic.cross(gravity);
    let norm_h = east.norm();
    if norm_h < MIN_EAST_VECTOR_NORM {
        return None;
    }

    let h = east / norm_h;
    let a = gravity / norm_sq_a.sqrt();
    let m = a.cross(&h);

    let rotation = Matrix3::from_rows(&[h.transpose(), m.transpose(), a.transpose()]);

    let inv_e = 1.0 / geomagnetic.norm();
    let c = geomagnetic.dot(&m) * inv_e;
    let s = geomagnetic.dot(&a) * inv_e;
    let inclination = Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, c, s,
        0.0, -s, c,
    );

    Some(RotationSolution { rotation, inclination })
}

/// Express the rotation matrix in a different device coordinate system.
///
/// `x_axis` and `y_axis` name the device axes that map onto the world X and
/// Y axes; the third axis is implied. Returns `None` when both name the same
/// device axis.
pub fn remap_coordinate_system(rotation: &Matrix3<f64>, x_axis: Axis, y_axis: Axis) -> Option<Matrix3<f64>> {
    let x = x_axis.index();
    let y = y_axis.index();
    if x == y {
        return None;
    }
    let z = 3 - x - y;

    let cyclic = x == (z + 1) % 3 && y == (z + 2) % 3;
    let sx = x_axis.is_negated();
    let sy = y_axis.is_negated();
    let sz = sx ^ sy ^ !cyclic;

    let signed = |value: f64, negate: bool| if negate { -value } else { value };

    let mut out = Matrix3::zeros();
    for row in 0..3 {
        out[(row, x)] = signed(rotation[(row, 0)], sx);
        out[(row, y)] = signed(rotation[(row, 1)], sy);
        out[(row, z)] = signed(rotation[(row, 2)], sz);
    }
    Some(out)
}

/// Extract azimuth, pitch and roll from a rotation matrix
pub fn orientation(rotation: &Matrix3<f64>) -> OrientationAngles {
    OrientationAngles {
        azimuth: rotation[(0, 1)].atan2(rotation[(1, 1)]),
        pitch: (-rotation[(2, 1)]).clamp(-1.0, 1.0).asin(),
        roll: (-rotation[(2, 0)]).atan2(rotation[(2, 2)]),
    }
}

#[cfg(test)]
pub(crate) mod test_vectors {
    //! Synthetic sensor readings for a field of 22 uT north, 40 uT down

    pub const FIELD_NORTH_UT: f64 = 22.0;
    pub const FIELD_DOWN_UT: f64 = 40.0;
    pub const GRAVITY: f64 = 9.81;

    /// Device lying flat, top edge pointing at `heading_deg`
    pub fn flat(heading_deg: f64) -> ([f64; 3], [f64; 3]) {
        let (s, c) = heading_deg.to_radians().sin_cos();
        (
            [0.0, 0.0, GRAVITY],
            [-FIELD_NORTH_UT * s, FIELD_NORTH_UT * c, -FIELD_DOWN_UT],
        )
    }

    /// Device held upright, camera looking at `heading_deg`
    pub fn upright(heading_deg: f64) -> ([f64; 3], [f64; 3]) {
        let (s, c) = heading_deg.to_radians().sin_cos();
        (
            [0.0, GRAVITY, 0.0],
            [-FIELD_NORTH_UT * s, -FIELD_DOWN_UT, -FIELD_NORTH_UT * c],
        )
    }
}
