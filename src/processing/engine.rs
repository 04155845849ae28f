//! Heading engine: latest-sample cache plus true-north heading computation

use crate::algorithms::angles::normalize_degrees;
use crate::algorithms::cardinal::CardinalDirection;
use crate::algorithms::geodesy::DistanceModel;
use crate::algorithms::geomagnetic::{DeclinationModel, GeomagneticModel};
use crate::algorithms::orientation::{self, DisplayRotation, RemapAxes};
use crate::core::{GeoPoint, HeadingResult, Location, NearestPoint, SensorSample, UserState};
use crate::processing::proximity;
use crate::validation::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use tracing::{debug, trace, warn};

/// How raw orientation is turned into a heading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingSettings {
    pub remap_axes: RemapAxes,
    pub display_rotation: DisplayRotation,
    /// Subtract magnetic declination when a location fix is available
    pub declination_correction: bool,
    pub distance_model: DistanceModel,
}

impl Default for HeadingSettings {
    fn default() -> Self {
        Self {
            remap_axes: RemapAxes::default(),
            display_rotation: DisplayRotation::default(),
            declination_correction: true,
            distance_model: DistanceModel::default(),
        }
    }
}

/// Consistent copy of the engine's cached inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSnapshot {
    pub sample: SensorSample,
    pub location: Option<Location>,
}

/// Compute a heading from one sensor sample.
///
/// `declination_deg` is subtracted from the magnetic azimuth when present.
/// Returns `None` if no rotation matrix can be derived from the sample.
pub fn heading_from_sample(
    sample: &SensorSample,
    declination_deg: Option<f64>,
    settings: &HeadingSettings,
) -> Option<HeadingResult> {
    let solution = orientation::rotation_matrix(&sample.accelerometer, &sample.magnetometer)?;
    let remapped = orientation::remap_coordinate_system(
        &solution.rotation,
        settings.remap_axes.x,
        settings.remap_axes.y,
    )?;
    let angles = orientation::orientation(&remapped);

    let mut azimuth = angles.azimuth_degrees();
    if let Some(declination) = declination_deg {
        azimuth -= declination;
    }
    azimuth += settings.display_rotation.offset_degrees();

    if !azimuth.is_finite() {
        return None;
    }
    let azimuth = normalize_degrees(azimuth);

    Some(HeadingResult {
        azimuth_degrees: azimuth,
        cardinal: CardinalDirection::from_azimuth(azimuth),
        declination_degrees: declination_deg,
        pitch_degrees: angles.pitch.to_degrees(),
        roll_degrees: angles.roll.to_degrees(),
    })
}

/// Owns the latest sensor readings and what the user was last told.
///
/// Samples are replace-on-write: each update overwrites the previous value
/// of that sensor, and every computation reads the current pair.
pub struct HeadingEngine {
    latest: SensorSample,
    state: UserState,
    settings: HeadingSettings,
    declination: Box<dyn DeclinationModel>,
    expiry_warned: bool,
}

impl Default for HeadingEngine {
    fn default() -> Self {
        Self::new(HeadingSettings::default())
    }
}

impl HeadingEngine {
    /// Engine using the built-in World Magnetic Model
    pub fn new(settings: HeadingSettings) -> Self {
        Self::with_declination_model(settings, Box::new(GeomagneticModel::wmm2020()))
    }

    pub fn with_declination_model(settings: HeadingSettings, declination: Box<dyn DeclinationModel>) -> Self {
        Self {
            latest: SensorSample::default(),
            state: UserState::default(),
            settings,
            declination,
            expiry_warned: false,
        }
    }

    pub fn settings(&self) -> &HeadingSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: HeadingSettings) {
        self.settings = settings;
    }

    pub fn update_accelerometer(&mut self, values: [f64; 3]) {
        self.latest.accelerometer = Vector3::from(values);
    }

    pub fn update_magnetometer(&mut self, values: [f64; 3]) {
        self.latest.magnetometer = Vector3::from(values);
    }

    /// Record a new location fix; fixes outside the geodetic ranges are rejected
    pub fn update_location(&mut self, location: Location) -> EngineResult<()> {
        if !location.is_valid() {
            return Err(EngineError::InvalidLocation {
                latitude: location.latitude,
                longitude: location.longitude,
            });
        }
        self.state.last_location = Some(location);
        Ok(())
    }

    pub fn location(&self) -> Option<Location> {
        self.state.last_location
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            sample: self.latest,
            location: self.state.last_location,
        }
    }

    pub fn user_state(&self) -> &UserState {
        &self.state
    }

    pub fn user_state_mut(&mut self) -> &mut UserState {
        &mut self.state
    }

    pub fn last_heading(&self) -> Option<HeadingResult> {
        self.state.last_heading
    }

    /// Heading from the latest sample, corrected for `location` if given
    pub fn compute_heading(&mut self, location: Option<&Location>) -> Option<HeadingResult> {
        self.compute_heading_at(location, Utc::now())
    }

    /// Like `compute_heading`, evaluating declination at a fixed instant
    pub fn compute_heading_at(&mut self, location: Option<&Location>, at: DateTime<Utc>) -> Option<HeadingResult> {
        let declination = match location {
            Some(location) if self.settings.declination_correction => Some(self.declination_at(location, at)),
            _ => None,
        };

        match heading_from_sample(&self.latest, declination, &self.settings) {
            Some(heading) => {
                trace!(
                    azimuth = heading.azimuth_degrees,
                    cardinal = %heading.cardinal,
                    declination = ?heading.declination_degrees,
                    "heading_computed"
                );
                self.state.last_heading = Some(heading);
                Some(heading)
            }
            None => {
                trace!("heading_sample_degenerate");
                None
            }
        }
    }

    /// Heading corrected with the engine's own last location fix
    pub fn current_heading(&mut self) -> Option<HeadingResult> {
        self.current_heading_at(Utc::now())
    }

    /// Like `current_heading`, evaluating declination at a fixed instant
    pub fn current_heading_at(&mut self, at: DateTime<Utc>) -> Option<HeadingResult> {
        let location = self.state.last_location;
        self.compute_heading_at(location.as_ref(), at)
    }

    /// Nearest known point to the last location fix
    pub fn nearest_known_point(&self, known_points: &[GeoPoint]) -> Option<NearestPoint> {
        let location = self.state.last_location?;
        proximity::nearest_point(&location, known_points, self.settings.distance_model)
    }

    /// Known point faced from the last location fix at `heading_deg`
    pub fn facing_known_point(&self, heading_deg: f64, known_points: &[GeoPoint], tolerance_deg: f64) -> Option<GeoPoint> {
        let location = self.state.last_location?;
        proximity::facing_point(&location, heading_deg, known_points, tolerance_deg, self.settings.distance_model)
    }

    fn declination_at(&mut self, location: &Location, at: DateTime<Utc>) -> f64 {
        if !self.expiry_warned && !self.declination.is_valid_at(at) {
            warn!(at = %at, "geomagnetic_model_outside_validity; extrapolating declination");
            self.expiry_warned = true;
        }
        let declination = self.declination.declination_degrees(location, at);
        debug!(
            lat = location.latitude,
            lon = location.longitude,
            declination,
            "declination_evaluated"
        );
        declination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::geomagnetic::FixedDeclination;
    use crate::algorithms::orientation::test_vectors::{flat, upright};
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn engine_with(declination: f64) -> HeadingEngine {
        HeadingEngine::with_declination_model(HeadingSettings::default(), Box::new(FixedDeclination(declination)))
    }

    fn feed(engine: &mut HeadingEngine, sample: ([f64; 3], [f64; 3])) {
        engine.update_accelerometer(sample.0);
        engine.update_magnetometer(sample.1);
    }

    #[test]
    fn test_no_heading_before_both_sensors_report() {
        let mut engine = engine_with(0.0);
        assert!(engine.compute_heading(None).is_none());

        engine.update_accelerometer(upright(0.0).0);
        assert!(engine.compute_heading(None).is_none());

        engine.update_magnetometer(upright(0.0).1);
        assert!(engine.compute_heading(None).is_some());
    }

    #[test]
    fn test_uncorrected_heading_without_location() {
        let mut engine = engine_with(10.0);
        feed(&mut engine, upright(90.0));
        let heading = engine.compute_heading(None).unwrap();
        assert_relative_eq!(heading.azimuth_degrees, 90.0, epsilon = 1e-9);
        assert_eq!(heading.cardinal, CardinalDirection::East);
        assert_eq!(heading.cardinal_label(), "East");
        assert!(heading.declination_degrees.is_none());
    }

    #[test]
    fn test_declination_is_subtracted_and_wrapped() {
        let mut engine = engine_with(10.0);
        let here = Location::new(33.6, -112.4);

        feed(&mut engine, upright(90.0));
        let heading = engine.compute_heading(Some(&here)).unwrap();
        assert_relative_eq!(heading.azimuth_degrees, 80.0, epsilon = 1e-9);
        assert_eq!(heading.declination_degrees, Some(10.0));

        feed(&mut engine, upright(5.0));
        let heading = engine.compute_heading(Some(&here)).unwrap();
        assert_relative_eq!(heading.azimuth_degrees, 355.0, epsilon = 1e-9);
        assert_eq!(heading.cardinal, CardinalDirection::North);
    }

    #[test]
    fn test_declination_correction_can_be_disabled() {
        let mut engine = engine_with(10.0);
        engine.set_settings(HeadingSettings {
            declination_correction: false,
            ..HeadingSettings::default()
        });
        feed(&mut engine, upright(90.0));
        let heading = engine.compute_heading(Some(&Location::new(0.0, 0.0))).unwrap();
        assert_relative_eq!(heading.azimuth_degrees, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_display_rotation_offset() {
        let mut engine = engine_with(0.0);
        engine.set_settings(HeadingSettings {
            display_rotation: DisplayRotation::Rotation270,
            ..HeadingSettings::default()
        });
        feed(&mut engine, upright(180.0));
        let heading = engine.compute_heading(None).unwrap();
        assert_relative_eq!(heading.azimuth_degrees, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_remap() {
        let mut engine = engine_with(0.0);
        engine.set_settings(HeadingSettings {
            remap_axes: RemapAxes::FLAT,
            ..HeadingSettings::default()
        });
        feed(&mut engine, flat(225.0));
        let heading = engine.compute_heading(None).unwrap();
        assert_relative_eq!(heading.azimuth_degrees, 225.0, epsilon = 1e-9);
        assert_eq!(heading.cardinal, CardinalDirection::Southwest);
    }

    #[test]
    fn test_degenerate_sample_keeps_previous_heading() {
        let mut engine = engine_with(0.0);
        feed(&mut engine, upright(45.0));
        let first = engine.compute_heading(None).unwrap();

        engine.update_accelerometer([0.0, 0.0, 0.0]);
        assert!(engine.compute_heading(None).is_none());
        assert_eq!(engine.last_heading(), Some(first));
    }

    #[test]
    fn test_wmm_correction_in_demo_neighbourhood() {
        let mut engine = HeadingEngine::default();
        let here = Location::new(33.6055, -112.3648);
        engine.update_location(here).unwrap();
        feed(&mut engine, upright(0.0));

        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let heading = engine.compute_heading_at(Some(&here), at).unwrap();
        let declination = heading.declination_degrees.unwrap();
        assert!(declination > 9.0 && declination < 11.0);
        assert_relative_eq!(heading.azimuth_degrees, 360.0 - declination, epsilon = 1e-9);
    }

    #[test]
    fn test_location_validation_and_snapshot() {
        let mut engine = engine_with(0.0);
        assert!(matches!(
            engine.update_location(Location::new(91.0, 0.0)),
            Err(EngineError::InvalidLocation { .. })
        ));
        assert!(engine.location().is_none());

        engine.update_location(Location::new(1.0, 2.0).with_altitude(30.0)).unwrap();
        feed(&mut engine, upright(10.0));
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.location, Some(Location::new(1.0, 2.0).with_altitude(30.0)));
        assert_eq!(snapshot.sample.accelerometer, Vector3::from(upright(10.0).0));
    }

    #[test]
    fn test_lookups_wait_for_location() {
        let engine = engine_with(0.0);
        let points = GeoPoint::demo_points();
        assert!(engine.nearest_known_point(&points).is_none());
        assert!(engine.facing_known_point(0.0, &points, 15.0).is_none());
    }

    proptest! {
        #[test]
        fn prop_valid_samples_give_normalized_azimuth(
            ax in -20.0f64..20.0, ay in -20.0f64..20.0, az in -20.0f64..20.0,
            mx in -60.0f64..60.0, my in -60.0f64..60.0, mz in -60.0f64..60.0,
            declination in -30.0f64..30.0,
        ) {
            let settings = HeadingSettings::default();
            let sample = SensorSample::new([ax, ay, az], [mx, my, mz]);
            if let Some(heading) = heading_from_sample(&sample, Some(declination), &settings) {
                prop_assert!(heading.azimuth_degrees >= 0.0 && heading.azimuth_degrees < 360.0);
                prop_assert_eq!(heading.cardinal, CardinalDirection::from_azimuth(heading.azimuth_degrees));
            }
        }

        #[test]
        fn prop_zero_accelerometer_never_yields_heading(
            mx in -60.0f64..60.0, my in -60.0f64..60.0, mz in -60.0f64..60.0,
        ) {
            let sample = SensorSample::new([0.0, 0.0, 0.0], [mx, my, mz]);
            prop_assert!(heading_from_sample(&sample, None, &HeadingSettings::default()).is_none());
        }
    }
}
