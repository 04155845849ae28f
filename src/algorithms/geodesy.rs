//! Distances and bearings between geodetic points
//!
//! Two models are provided: Vincenty's inverse formula on the WGS84
//! ellipsoid (millimetre-accurate, iterative) and the haversine formula on a
//! sphere of mean Earth radius (closed form). Vincenty falls back to the
//! haversine result when it does not converge, which only happens for
//! nearly antipodal points.

use crate::algorithms::angles::normalize_degrees;
use crate::core::{Location, EARTH_MEAN_RADIUS_M, WGS84_FLATTENING, WGS84_SEMI_MAJOR_AXIS_M, WGS84_SEMI_MINOR_AXIS_M};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const VINCENTY_MAX_ITERATIONS: usize = 200;
const VINCENTY_CONVERGENCE: f64 = 1e-12;

/// Which Earth model distances and bearings are computed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceModel {
    /// WGS84 ellipsoid, Vincenty inverse formula
    #[default]
    Vincenty,
    /// Sphere of mean Earth radius, haversine formula
    Haversine,
}

/// Distance and initial bearing from one point to another
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodesic {
    pub distance_m: f64,
    /// Initial bearing in degrees, normalized to [0, 360)
    pub initial_bearing_deg: f64,
}

impl DistanceModel {
    pub fn solve(&self, from: &Location, to: &Location) -> Geodesic {
        match self {
            DistanceModel::Vincenty => vincenty_inverse(from, to).unwrap_or_else(|| haversine(from, to)),
            DistanceModel::Haversine => haversine(from, to),
        }
    }

    pub fn distance_m(&self, from: &Location, to: &Location) -> f64 {
        self.solve(from, to).distance_m
    }

    pub fn initial_bearing_deg(&self, from: &Location, to: &Location) -> f64 {
        self.solve(from, to).initial_bearing_deg
    }
}

/// Great-circle distance and bearing on a sphere
pub fn haversine(from: &Location, to: &Location) -> Geodesic {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_phi = phi2 - phi1;
    let d_lambda = (to.longitude - from.longitude).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let distance_m = 2.0 * EARTH_MEAN_RADIUS_M * a.sqrt().min(1.0).asin();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();

    Geodesic {
        distance_m,
        initial_bearing_deg: normalize_degrees(y.atan2(x).to_degrees()),
    }
}

/// Vincenty's inverse solution on the WGS84 ellipsoid.
///
/// Returns `None` if the longitude iteration diverges or fails to converge.
pub fn vincenty_inverse(from: &Location, to: &Location) -> Option<Geodesic> {
    let a = WGS84_SEMI_MAJOR_AXIS_M;
    let b = WGS84_SEMI_MINOR_AXIS_M;
    let f = WGS84_FLATTENING;

    let l = (to.longitude - from.longitude).to_radians();
    let u1 = ((1.0 - f) * from.latitude.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * to.latitude.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut converged = false;

    let mut sin_sigma = 0.0;
    let mut cos_sigma = 0.0;
    let mut sigma = 0.0;
    let mut cos_sq_alpha = 0.0;
    let mut cos_2sigma_m = 0.0;
    let mut sin_lambda = 0.0;
    let mut cos_lambda = 0.0;

    for _ in 0..VINCENTY_MAX_ITERATIONS {
        (sin_lambda, cos_lambda) = lambda.sin_cos();
        let t1 = cos_u2 * sin_lambda;
        let t2 = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
        sin_sigma = (t1 * t1 + t2 * t2).sqrt();
        if sin_sigma == 0.0 {
            // Coincident points
            return Some(Geodesic {
                distance_m: 0.0,
                initial_bearing_deg: 0.0,
            });
        }
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);

        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            // Both points on the equator
            0.0
        };

        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma + c * sin_sigma * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

        if lambda.abs() > PI {
            return None;
        }
        if (lambda - previous).abs() < VINCENTY_CONVERGENCE {
            converged = true;
            break;
        }
    }

    if !converged {
        return None;
    }

    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));

    let distance_m = b * big_a * (sigma - delta_sigma);
    let bearing = (cos_u2 * sin_lambda).atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda);

    Some(Geodesic {
        distance_m,
        initial_bearing_deg: normalize_degrees(bearing.to_degrees()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dms(degrees: f64, minutes: f64, seconds: f64) -> f64 {
        degrees.signum() * (degrees.abs() + minutes / 60.0 + seconds / 3600.0)
    }

    #[test]
    fn test_vincenty_flinders_peak_to_buninyong() {
        let flinders = Location::new(dms(-37.0, 57.0, 3.72030), dms(144.0, 25.0, 29.52440));
        let buninyong = Location::new(dms(-37.0, 39.0, 10.15610), dms(143.0, 55.0, 35.38390));

        let geodesic = vincenty_inverse(&flinders, &buninyong).unwrap();
        assert_relative_eq!(geodesic.distance_m, 54972.271, epsilon = 1e-3);
        assert_relative_eq!(geodesic.initial_bearing_deg, dms(306.0, 52.0, 5.37), epsilon = 1e-5);
    }

    #[test]
    fn test_vincenty_meridian_degree() {
        let geodesic = vincenty_inverse(&Location::new(0.0, 0.0), &Location::new(1.0, 0.0)).unwrap();
        assert_relative_eq!(geodesic.distance_m, 110574.389, epsilon = 0.01);
        assert_relative_eq!(geodesic.initial_bearing_deg, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_haversine_degree_and_bearings() {
        let origin = Location::new(0.0, 0.0);
        let north = haversine(&origin, &Location::new(1.0, 0.0));
        assert_relative_eq!(north.distance_m, EARTH_MEAN_RADIUS_M * PI / 180.0, epsilon = 1e-6);
        assert_relative_eq!(north.initial_bearing_deg, 0.0, epsilon = 1e-9);

        let east = haversine(&origin, &Location::new(0.0, 1.0));
        assert_relative_eq!(east.initial_bearing_deg, 90.0, epsilon = 1e-9);

        let west = haversine(&origin, &Location::new(0.0, -1.0));
        assert_relative_eq!(west.initial_bearing_deg, 270.0, epsilon = 1e-9);
    }

    #[test]
    fn test_coincident_points() {
        let here = Location::new(33.60547247689105, -112.36485413089035);
        for model in [DistanceModel::Vincenty, DistanceModel::Haversine] {
            let geodesic = model.solve(&here, &here);
            assert_eq!(geodesic.distance_m, 0.0);
            assert!(geodesic.initial_bearing_deg.is_finite());
        }
    }

    #[test]
    fn test_antipodal_falls_back_to_sphere() {
        let a = Location::new(0.0, 0.0);
        let b = Location::new(0.0, 180.0);
        let geodesic = DistanceModel::Vincenty.solve(&a, &b);
        assert!(geodesic.distance_m.is_finite());
        assert!(geodesic.distance_m > 19_900_000.0 && geodesic.distance_m < 20_100_000.0);
    }

    #[test]
    fn test_models_agree_at_neighbourhood_scale() {
        let house = Location::new(33.60547247689105, -112.36485413089035);
        let adam = Location::new(33.60587842427303, -112.36441544869734);
        let v = DistanceModel::Vincenty.solve(&house, &adam);
        let h = DistanceModel::Haversine.solve(&house, &adam);
        assert!((v.distance_m - h.distance_m).abs() < 0.5);
        assert!((v.initial_bearing_deg - h.initial_bearing_deg).abs() < 0.5);
        // Adam's house is to the north-east, roughly 60 m away
        assert!(v.distance_m > 50.0 && v.distance_m < 70.0);
        assert!(v.initial_bearing_deg > 30.0 && v.initial_bearing_deg < 60.0);
    }
}
