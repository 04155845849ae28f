//! World Magnetic Model evaluation
//!
//! Computes the main geomagnetic field from a spherical-harmonic expansion of
//! Schmidt semi-normalised Gauss coefficients with linear secular variation.
//! The WMM2020 coefficient set is built in; newer epochs can be loaded from
//! the standard `WMM.COF` text format.
//!
//! Steps per evaluation:
//! 1. geodetic (WGS84) -> geocentric spherical coordinates
//! 2. associated Legendre functions and their colatitude derivatives
//! 3. field components in the geocentric frame
//! 4. rotation back into the geodetic north/east/down frame

use crate::core::Location;
use crate::validation::{EngineError, EngineResult};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Geomagnetic reference radius (km)
pub const GEOMAGNETIC_REFERENCE_RADIUS_KM: f64 = 6371.2;

/// WGS84 semi-major axis (km)
const SEMI_MAJOR_AXIS_KM: f64 = 6378.137;

/// WGS84 semi-minor axis (km)
const SEMI_MINOR_AXIS_KM: f64 = 6356.7523142;

/// Years a model release is considered valid after its epoch
pub const MODEL_LIFESPAN_YEARS: f64 = 5.0;

/// Latitudes are clamped this close to the poles, where declination is undefined
const POLE_LATITUDE_LIMIT_DEG: f64 = 89.99999;

/// WMM2020 (epoch 2020.0): n, m, g, h (nT), dg, dh (nT/yr)
const WMM2020_COEFFICIENTS: [(usize, usize, f64, f64, f64, f64); 90] = [
    (1, 0, -29404.5, 0.0, 6.7, 0.0),
    (1, 1, -1450.7, 4652.9, 7.7, -25.1),
    (2, 0, -2500.0, 0.0, -11.5, 0.0),
    (2, 1, 2982.0, -2991.6, -7.1, -30.2),
    (2, 2, 1676.8, -734.8, -2.2, -23.9),
    (3, 0, 1363.9, 0.0, 2.8, 0.0),
    (3, 1, -2381.0, -82.2, -6.2, 5.7),
    (3, 2, 1236.2, 241.8, 3.4, -1.0),
    (3, 3, 525.7, -542.9, -12.2, 1.1),
    (4, 0, 903.1, 0.0, -1.1, 0.0),
    (4, 1, 809.4, 282.0, -1.6, 0.2),
    (4, 2, 86.2, -158.4, -6.0, 6.9),
    (4, 3, -309.4, 199.8, 5.4, 3.7),
    (4, 4, 47.9, -350.1, -5.5, -5.6),
    (5, 0, -234.4, 0.0, -0.3, 0.0),
    (5, 1, 363.1, 47.7, 0.6, 0.1),
    (5, 2, 187.8, 208.4, -0.7, 2.5),
    (5, 3, -140.7, -121.3, 0.1, -0.9),
    (5, 4, -151.2, 32.2, 1.2, 3.0),
    (5, 5, 13.7, 99.1, 1.0, 0.5),
    (6, 0, 65.9, 0.0, -0.6, 0.0),
    (6, 1, 65.6, -19.1, -0.4, 0.1),
    (6, 2, 73.0, 25.0, 0.5, -1.8),
    (6, 3, -121.5, 52.7, 1.4, -1.4),
    (6, 4, -36.2, -64.4, -1.4, 0.9),
    (6, 5, 13.5, 9.0, -0.0, 0.1),
    (6, 6, -64.7, 68.1, 0.8, 1.0),
    (7, 0, 80.6, 0.0, -0.1, 0.0),
    (7, 1, -76.8, -51.4, -0.3, 0.5),
    (7, 2, -8.3, -16.8, -0.1, 0.6),
    (7, 3, 56.5, 2.3, 0.7, -0.7),
    (7, 4, 15.8, 23.5, 0.2, -0.2),
    (7, 5, 6.4, -2.2, -0.5, -1.2),
    (7, 6, -7.2, -27.2, -0.8, 0.2),
    (7, 7, 9.8, -1.9, 1.0, 0.3),
    (8, 0, 23.6, 0.0, -0.1, 0.0),
    (8, 1, 9.8, 8.4, 0.1, -0.3),
    (8, 2, -17.5, -15.3, -0.1, 0.7),
    (8, 3, -0.4, 12.8, 0.5, -0.2),
    (8, 4, -21.1, -11.8, -0.1, 0.5),
    (8, 5, 15.3, 14.9, 0.4, -0.3),
    (8, 6, 13.7, 3.6, 0.5, -0.5),
    (8, 7, -16.5, -6.9, 0.0, 0.4),
    (8, 8, -0.3, 2.8, 0.4, 0.1),
    (9, 0, 5.0, 0.0, -0.1, 0.0),
    (9, 1, 8.2, -23.3, -0.2, -0.3),
    (9, 2, 2.9, 11.1, -0.0, 0.2),
    (9, 3, -1.4, 9.8, 0.4, -0.4),
    (9, 4, -1.1, -5.1, -0.3, 0.4),
    (9, 5, -13.3, -6.2, -0.0, 0.1),
    (9, 6, 1.1, 7.8, 0.3, -0.0),
    (9, 7, 8.9, 0.4, -0.0, -0.2),
    (9, 8, -9.3, -1.5, -0.0, 0.5),
    (9, 9, -11.9, 9.7, -0.4, 0.2),
    (10, 0, -1.9, 0.0, 0.0, 0.0),
    (10, 1, -6.2, 3.4, -0.0, -0.0),
    (10, 2, -0.1, -0.2, -0.0, 0.1),
    (10, 3, 1.7, 3.5, 0.2, -0.3),
    (10, 4, -0.9, 4.8, -0.1, 0.1),
    (10, 5, 0.6, -8.6, -0.2, -0.2),
    (10, 6, -0.9, -0.1, -0.0, 0.1),
    (10, 7, 1.9, -4.2, -0.1, -0.0),
    (10, 8, 1.4, -3.4, -0.2, -0.1),
    (10, 9, -2.4, -0.1, -0.1, 0.2),
    (10, 10, -3.9, -8.8, -0.0, -0.0),
    (11, 0, 3.0, 0.0, -0.0, 0.0),
    (11, 1, -1.4, -0.0, -0.1, -0.0),
    (11, 2, -2.5, 2.6, -0.0, 0.1),
    (11, 3, 2.4, -0.5, 0.0, 0.0),
    (11, 4, -0.9, -0.4, -0.0, 0.2),
    (11, 5, 0.3, 0.6, -0.1, -0.0),
    (11, 6, -0.7, -0.2, 0.0, 0.0),
    (11, 7, -0.1, -1.7, -0.0, 0.1),
    (11, 8, 1.4, -1.6, -0.1, -0.0),
    (11, 9, -0.6, -3.0, -0.1, -0.1),
    (11, 10, 0.2, -2.0, -0.1, 0.0),
    (11, 11, 3.1, -2.6, -0.1, -0.0),
    (12, 0, -2.0, 0.0, 0.0, 0.0),
    (12, 1, -0.1, -1.2, -0.0, -0.0),
    (12, 2, 0.5, 0.5, -0.0, 0.0),
    (12, 3, 1.3, 1.3, 0.0, -0.1),
    (12, 4, -1.2, -1.8, -0.0, 0.1),
    (12, 5, 0.7, 0.1, -0.0, -0.0),
    (12, 6, 0.3, 0.7, 0.0, 0.0),
    (12, 7, 0.5, -0.1, -0.0, -0.0),
    (12, 8, -0.2, 0.6, 0.0, 0.1),
    (12, 9, -0.5, 0.2, -0.0, -0.0),
    (12, 10, 0.1, -0.9, -0.0, -0.0),
    (12, 11, -1.1, -0.0, -0.0, 0.0),
    (12, 12, -0.3, 0.5, -0.1, -0.1),
];

/// Source of magnetic declination for true-north correction
pub trait DeclinationModel: Send {
    /// Declination in degrees (positive east) at a location and instant
    fn declination_degrees(&self, location: &Location, at: DateTime<Utc>) -> f64;

    /// Whether the model is trustworthy at the given instant
    fn is_valid_at(&self, _at: DateTime<Utc>) -> bool {
        true
    }
}

/// Constant declination, for fixtures or when a surveyed value is known
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDeclination(pub f64);

impl DeclinationModel for FixedDeclination {
    fn declination_degrees(&self, _location: &Location, _at: DateTime<Utc>) -> f64 {
        self.0
    }
}

/// Main-field vector in the geodetic frame (nT)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MagneticField {
    pub north_nt: f64,
    pub east_nt: f64,
    pub down_nt: f64,
}

impl MagneticField {
    pub fn declination_degrees(&self) -> f64 {
        self.east_nt.atan2(self.north_nt).to_degrees()
    }

    pub fn inclination_degrees(&self) -> f64 {
        self.down_nt.atan2(self.horizontal_intensity_nt()).to_degrees()
    }

    pub fn horizontal_intensity_nt(&self) -> f64 {
        self.north_nt.hypot(self.east_nt)
    }

    pub fn total_intensity_nt(&self) -> f64 {
        (self.north_nt * self.north_nt + self.east_nt * self.east_nt + self.down_nt * self.down_nt).sqrt()
    }
}

/// Spherical-harmonic geomagnetic model
#[derive(Debug, Clone, PartialEq)]
pub struct GeomagneticModel {
    name: String,
    epoch: f64,
    release_date: String,
    max_degree: usize,
    // Triangular storage, indexed by `tri(n, m)`
    g: Vec<f64>,
    h: Vec<f64>,
    dg: Vec<f64>,
    dh: Vec<f64>,
    schmidt: Vec<f64>,
}

fn tri(n: usize, m: usize) -> usize {
    n * (n + 1) / 2 + m
}

impl GeomagneticModel {
    /// The WMM2020 release
    pub fn wmm2020() -> Self {
        let mut model = Self::empty("WMM-2020", 2020.0, "12/10/2019", 12);
        for &(n, m, g, h, dg, dh) in WMM2020_COEFFICIENTS.iter() {
            model.set(n, m, g, h, dg, dh);
        }
        model
    }

    fn empty(name: &str, epoch: f64, release_date: &str, max_degree: usize) -> Self {
        let size = tri(max_degree, max_degree) + 1;
        Self {
            name: name.to_string(),
            epoch,
            release_date: release_date.to_string(),
            max_degree,
            g: vec![0.0; size],
            h: vec![0.0; size],
            dg: vec![0.0; size],
            dh: vec![0.0; size],
            schmidt: schmidt_factors(max_degree),
        }
    }

    fn set(&mut self, n: usize, m: usize, g: f64, h: f64, dg: f64, dh: f64) {
        let i = tri(n, m);
        self.g[i] = g;
        self.h[i] = h;
        self.dg[i] = dg;
        self.dh[i] = dh;
    }

    /// Parse a model in `WMM.COF` format.
    ///
    /// The first non-blank line holds the epoch, model name and release date;
    /// each following line holds `n m g h dg dh`. Parsing stops at the first
    /// line of nines.
    pub fn from_cof_str(text: &str) -> EngineResult<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        let (header_line, header) = lines.next().ok_or(EngineError::CoefficientParse {
            line: 1,
            reason: "empty coefficient file".to_string(),
        })?;
        let mut header_fields = header.split_whitespace();
        let epoch: f64 = header_fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| EngineError::CoefficientParse {
                line: header_line,
                reason: "header must start with the model epoch".to_string(),
            })?;
        let name = header_fields.next().unwrap_or("unnamed").to_string();
        let release_date = header_fields.next().unwrap_or("").to_string();

        let mut rows = Vec::new();
        for (line, content) in lines {
            if content.starts_with("9999") {
                break;
            }
            rows.push((line, parse_coefficient_row(line, content)?));
        }

        let max_degree = rows.iter().map(|(_, r)| r.0).max().ok_or(EngineError::CoefficientParse {
            line: header_line,
            reason: "no coefficients found".to_string(),
        })?;

        let mut model = Self::empty(&name, epoch, &release_date, max_degree);
        for (_, (n, m, g, h, dg, dh)) in rows {
            model.set(n, m, g, h, dg, dh);
        }

        debug!(model = %model.name, epoch = model.epoch, max_degree, "geomagnetic_model_loaded");
        Ok(model)
    }

    /// Load a model from a `WMM.COF` file
    pub fn from_cof_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let text = fs::read_to_string(&path).map_err(|e| EngineError::io(path_str, e))?;
        Self::from_cof_str(&text)
    }

    /// Render the model back into `WMM.COF` text
    pub fn to_cof_string(&self) -> String {
        let mut out = format!("    {:.1}            {}        {}\n", self.epoch, self.name, self.release_date);
        for n in 1..=self.max_degree {
            for m in 0..=n {
                let i = tri(n, m);
                out.push_str(&format!(
                    "{:>3}{:>3}{:>10.1}{:>10.1}{:>11.1}{:>11.1}\n",
                    n, m, self.g[i], self.h[i], self.dg[i], self.dh[i]
                ));
            }
        }
        out.push_str(&"9".repeat(48));
        out.push('\n');
        out
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    pub fn is_valid_for(&self, decimal_year: f64) -> bool {
        decimal_year >= self.epoch && decimal_year < self.epoch + MODEL_LIFESPAN_YEARS
    }

    /// Field at a geodetic location for a decimal year
    pub fn field_at(&self, location: &Location, decimal_year: f64) -> MagneticField {
        let latitude = location
            .latitude
            .clamp(-POLE_LATITUDE_LIMIT_DEG, POLE_LATITUDE_LIMIT_DEG);
        let geocentric = GeocentricPosition::from_geodetic(latitude, location.longitude, location.altitude_m);

        let colatitude = std::f64::consts::FRAC_PI_2 - geocentric.latitude_rad;
        let legendre = LegendreTable::new(self.max_degree, colatitude);
        let inverse_sin_theta = 1.0 / colatitude.sin();

        let ratio = GEOMAGNETIC_REFERENCE_RADIUS_KM / geocentric.radius_km;
        let dt = decimal_year - self.epoch;

        let mut x = 0.0;
        let mut y = 0.0;
        let mut z = 0.0;
        // (a/r)^(n+2), starting at n = 1
        let mut radius_power = ratio * ratio * ratio;

        for n in 1..=self.max_degree {
            for m in 0..=n {
                let i = tri(n, m);
                let g = self.g[i] + dt * self.dg[i];
                let h = self.h[i] + dt * self.dh[i];
                let (sin_ml, cos_ml) = (m as f64 * geocentric.longitude_rad).sin_cos();
                let p = legendre.p[i] * self.schmidt[i];
                let dp = legendre.dp[i] * self.schmidt[i];

                x += radius_power * (g * cos_ml + h * sin_ml) * dp;
                y += radius_power * m as f64 * (g * sin_ml - h * cos_ml) * p * inverse_sin_theta;
                z -= (n + 1) as f64 * radius_power * (g * cos_ml + h * sin_ml) * p;
            }
            radius_power *= ratio;
        }

        let lat_diff = latitude.to_radians() - geocentric.latitude_rad;
        let (sin_d, cos_d) = lat_diff.sin_cos();
        MagneticField {
            north_nt: x * cos_d + z * sin_d,
            east_nt: y,
            down_nt: -x * sin_d + z * cos_d,
        }
    }
}

impl Default for GeomagneticModel {
    fn default() -> Self {
        Self::wmm2020()
    }
}

impl DeclinationModel for GeomagneticModel {
    fn declination_degrees(&self, location: &Location, at: DateTime<Utc>) -> f64 {
        self.field_at(location, decimal_year(at)).declination_degrees()
    }

    fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.is_valid_for(decimal_year(at))
    }
}

fn parse_coefficient_row(line: usize, content: &str) -> EngineResult<(usize, usize, f64, f64, f64, f64)> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() < 6 {
        return Err(EngineError::CoefficientParse {
            line,
            reason: format!("expected 6 fields, found {}", fields.len()),
        });
    }

    let bad = |what: &str| EngineError::CoefficientParse {
        line,
        reason: format!("invalid {}", what),
    };
    let n: usize = fields[0].parse().map_err(|_| bad("degree"))?;
    let m: usize = fields[1].parse().map_err(|_| bad("order"))?;
    if n == 0 || m > n {
        return Err(EngineError::CoefficientParse {
            line,
            reason: format!("order {} out of range for degree {}", m, n),
        });
    }
    let g: f64 = fields[2].parse().map_err(|_| bad("g coefficient"))?;
    let h: f64 = fields[3].parse().map_err(|_| bad("h coefficient"))?;
    let dg: f64 = fields[4].parse().map_err(|_| bad("g secular variation"))?;
    let dh: f64 = fields[5].parse().map_err(|_| bad("h secular variation"))?;
    Ok((n, m, g, h, dg, dh))
}

/// Schmidt semi-normalisation factors relating Gauss-normalised Legendre
/// functions to the WMM coefficients
fn schmidt_factors(max_degree: usize) -> Vec<f64> {
    let mut s = vec![0.0; tri(max_degree, max_degree) + 1];
    s[0] = 1.0;
    for n in 1..=max_degree {
        s[tri(n, 0)] = s[tri(n - 1, 0)] * (2 * n - 1) as f64 / n as f64;
        for m in 1..=n {
            let k = if m == 1 { 2.0 } else { 1.0 };
            s[tri(n, m)] = s[tri(n, m - 1)] * ((n - m + 1) as f64 * k / (n + m) as f64).sqrt();
        }
    }
    s
}

struct GeocentricPosition {
    latitude_rad: f64,
    longitude_rad: f64,
    radius_km: f64,
}

impl GeocentricPosition {
    fn from_geodetic(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        let altitude_km = altitude_m / 1000.0;
        let a2 = SEMI_MAJOR_AXIS_KM * SEMI_MAJOR_AXIS_KM;
        let b2 = SEMI_MINOR_AXIS_KM * SEMI_MINOR_AXIS_KM;

        let (slat, clat) = latitude_deg.to_radians().sin_cos();
        let tlat = slat / clat;
        let rho = (a2 * clat * clat + b2 * slat * slat).sqrt();

        let latitude_rad = (tlat * (rho * altitude_km + b2) / (rho * altitude_km + a2)).atan();
        let radius_sq = altitude_km * altitude_km
            + 2.0 * altitude_km * rho
            + (a2 * a2 * clat * clat + b2 * b2 * slat * slat) / (a2 * clat * clat + b2 * slat * slat);

        Self {
            latitude_rad,
            longitude_rad: longitude_deg.to_radians(),
            radius_km: radius_sq.sqrt(),
        }
    }
}

/// Gauss-normalised associated Legendre functions of cos(theta) and their
/// derivatives with respect to theta
struct LegendreTable {
    p: Vec<f64>,
    dp: Vec<f64>,
}

impl LegendreTable {
    fn new(max_degree: usize, theta: f64) -> Self {
        let size = tri(max_degree, max_degree) + 1;
        let mut p = vec![0.0; size];
        let mut dp = vec![0.0; size];
        let (st, ct) = theta.sin_cos();

        p[0] = 1.0;
        for n in 1..=max_degree {
            for m in 0..=n {
                let i = tri(n, m);
                if n == m {
                    let prev = tri(n - 1, m - 1);
                    p[i] = st * p[prev];
                    dp[i] = ct * p[prev] + st * dp[prev];
                } else if n == 1 || m == n - 1 {
                    let prev = tri(n - 1, m);
                    p[i] = ct * p[prev];
                    dp[i] = -st * p[prev] + ct * dp[prev];
                } else {
                    let prev = tri(n - 1, m);
                    let prev2 = tri(n - 2, m);
                    let k = ((n - 1) * (n - 1) - m * m) as f64 / ((2 * n - 1) * (2 * n - 3)) as f64;
                    p[i] = ct * p[prev] - k * p[prev2];
                    dp[i] = -st * p[prev] + ct * dp[prev] - k * dp[prev2];
                }
            }
        }

        Self { p, dp }
    }
}

/// Convert an instant into a decimal year (e.g. 2020-07-02 -> ~2020.5)
pub fn decimal_year(at: DateTime<Utc>) -> f64 {
    let year = at.year();
    let is_leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days_in_year = if is_leap { 366.0 } else { 365.0 };
    let day_fraction = at.num_seconds_from_midnight() as f64 / 86_400.0;
    year as f64 + (at.ordinal0() as f64 + day_fraction) / days_in_year
}
