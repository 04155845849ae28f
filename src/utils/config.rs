//! Configuration management for the heading engine
//!
//! Loads, validates and saves `EngineConfig` as JSON, and supports validated
//! runtime adjustment of individual parameters.

use crate::algorithms::geodesy::DistanceModel;
use crate::algorithms::geomagnetic::GeomagneticModel;
use crate::algorithms::orientation::{DisplayRotation, RemapAxes};
use crate::api::notifier::ChangeNotifier;
use crate::core::{GeoPoint, DEFAULT_FACING_TOLERANCE_DEG, DEFAULT_HEADING_UPDATE_INTERVAL_MS};
use crate::processing::engine::{HeadingEngine, HeadingSettings};
use crate::validation::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MAX_FACING_TOLERANCE_DEG: f64 = 90.0;

/// Engine configuration as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Points the user can be near to or facing, in priority order for ties
    pub known_points: Vec<GeoPoint>,
    /// Half-width of the facing cone in degrees
    pub facing_tolerance_deg: f64,
    pub remap_axes: RemapAxes,
    pub display_rotation: DisplayRotation,
    /// Apply magnetic declination when a location fix is available
    pub declination_correction: bool,
    pub distance_model: DistanceModel,
    /// Re-emit an unchanged heading after this many milliseconds
    pub heading_update_interval_ms: u64,
    /// WMM coefficient file replacing the built-in model
    pub coefficient_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            known_points: GeoPoint::demo_points(),
            facing_tolerance_deg: DEFAULT_FACING_TOLERANCE_DEG,
            remap_axes: RemapAxes::default(),
            display_rotation: DisplayRotation::default(),
            declination_correction: true,
            distance_model: DistanceModel::default(),
            heading_update_interval_ms: DEFAULT_HEADING_UPDATE_INTERVAL_MS,
            coefficient_file: None,
        }
    }
}

impl EngineConfig {
    pub fn heading_settings(&self) -> HeadingSettings {
        HeadingSettings {
            remap_axes: self.remap_axes,
            display_rotation: self.display_rotation,
            declination_correction: self.declination_correction,
            distance_model: self.distance_model,
        }
    }
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<EngineError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn into_first_error(self) -> Option<EngineError> {
        self.errors.into_iter().next()
    }
}

/// Main configuration manager
#[derive(Debug, Default)]
pub struct ConfigurationManager {
    config: EngineConfig,
    config_file_path: Option<PathBuf>,
    is_modified: bool,
}

impl ConfigurationManager {
    /// Create a configuration manager with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration manager and load from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the whole configuration after validating it
    pub fn update_config(&mut self, config: EngineConfig) -> EngineResult<()> {
        let validation = self.validate_config(&config);
        if let Some(error) = validation.into_first_error() {
            return Err(error);
        }
        self.config = config;
        self.is_modified = true;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> EngineResult<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| EngineError::io(path.display().to_string(), e))?;
        let config: EngineConfig = serde_json::from_str(&content)?;

        let validation = self.validate_config(&config);
        for warning in &validation.warnings {
            warn!(path = %path.display(), warning = %warning, "config_warning");
        }
        if let Some(error) = validation.into_first_error() {
            return Err(error);
        }

        info!(
            path = %path.display(),
            points = config.known_points.len(),
            tolerance_deg = config.facing_tolerance_deg,
            "config_loaded"
        );
        self.config = config;
        self.config_file_path = Some(path.to_path_buf());
        self.is_modified = false;
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> EngineResult<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&self.config)?;
        fs::write(path, content).map_err(|e| EngineError::io(path.display().to_string(), e))?;

        self.config_file_path = Some(path.to_path_buf());
        self.is_modified = false;
        Ok(())
    }

    /// Save to the file the configuration was last loaded from or saved to
    pub fn save(&mut self) -> EngineResult<()> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(EngineError::MissingParameter {
                parameter: "config_file_path".to_string(),
            }),
        }
    }

    /// Check if configuration has been modified since last load or save
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    // Runtime parameter adjustment

    /// Update the facing tolerance; returns the previous value
    pub fn set_facing_tolerance(&mut self, tolerance_deg: f64) -> EngineResult<f64> {
        check_facing_tolerance(tolerance_deg)?;
        let old_value = self.config.facing_tolerance_deg;
        self.config.facing_tolerance_deg = tolerance_deg;
        self.is_modified = true;
        Ok(old_value)
    }

    pub fn get_facing_tolerance(&self) -> f64 {
        self.config.facing_tolerance_deg
    }

    /// Update the heading re-emit interval; returns the previous value
    pub fn set_heading_update_interval(&mut self, interval_ms: u64) -> EngineResult<u64> {
        let old_value = self.config.heading_update_interval_ms;
        self.config.heading_update_interval_ms = interval_ms;
        self.is_modified = true;
        Ok(old_value)
    }

    /// Choose the device axes used as the world X/Y frame; returns the previous pair
    pub fn set_remap_axes(&mut self, axes: RemapAxes) -> EngineResult<RemapAxes> {
        if !axes.is_valid() {
            return Err(EngineError::invalid_config(
                "remap_axes",
                format!("{:?}/{:?}", axes.x, axes.y),
                "X and Y must use different device axes",
            ));
        }
        let old_value = self.config.remap_axes;
        self.config.remap_axes = axes;
        self.is_modified = true;
        Ok(old_value)
    }

    pub fn set_display_rotation(&mut self, rotation: DisplayRotation) -> DisplayRotation {
        self.is_modified = true;
        std::mem::replace(&mut self.config.display_rotation, rotation)
    }

    pub fn set_declination_correction(&mut self, enabled: bool) -> bool {
        self.is_modified = true;
        std::mem::replace(&mut self.config.declination_correction, enabled)
    }

    pub fn set_distance_model(&mut self, model: DistanceModel) -> DistanceModel {
        self.is_modified = true;
        std::mem::replace(&mut self.config.distance_model, model)
    }

    /// Point the engine at a coefficient file instead of the built-in model
    pub fn set_coefficient_file(&mut self, path: Option<PathBuf>) -> Option<PathBuf> {
        self.is_modified = true;
        std::mem::replace(&mut self.config.coefficient_file, path)
    }

    /// Append a known point; names must be unique
    pub fn add_known_point(&mut self, point: GeoPoint) -> EngineResult<()> {
        check_known_point(&point)?;
        if self.config.known_points.iter().any(|p| p.name == point.name) {
            return Err(EngineError::invalid_config(
                "known_points",
                &point.name,
                "a point with this name already exists",
            ));
        }
        self.config.known_points.push(point);
        self.is_modified = true;
        Ok(())
    }

    /// Remove a known point by name
    pub fn remove_known_point(&mut self, name: &str) -> Option<GeoPoint> {
        let index = self.config.known_points.iter().position(|p| p.name == name)?;
        self.is_modified = true;
        Some(self.config.known_points.remove(index))
    }

    pub fn known_points(&self) -> &[GeoPoint] {
        &self.config.known_points
    }

    // Derived engine components

    pub fn heading_settings(&self) -> HeadingSettings {
        self.config.heading_settings()
    }

    pub fn notifier(&self) -> ChangeNotifier {
        ChangeNotifier::new(self.config.heading_update_interval_ms)
    }

    /// Geomagnetic model from the configured coefficient file, or the built-in one
    pub fn load_geomagnetic_model(&self) -> EngineResult<GeomagneticModel> {
        match &self.config.coefficient_file {
            Some(path) => {
                let model = GeomagneticModel::from_cof_file(path)?;
                info!(path = %path.display(), model = %model.name(), epoch = model.epoch(), "geomagnetic_model_loaded");
                Ok(model)
            }
            None => Ok(GeomagneticModel::wmm2020()),
        }
    }

    /// Heading engine wired with this configuration
    pub fn build_engine(&self) -> EngineResult<HeadingEngine> {
        let model = self.load_geomagnetic_model()?;
        Ok(HeadingEngine::with_declination_model(self.heading_settings(), Box::new(model)))
    }

    // Validation

    pub fn validate_config(&self, config: &EngineConfig) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Err(e) = check_facing_tolerance(config.facing_tolerance_deg) {
            errors.push(e);
        } else if config.facing_tolerance_deg < 1.0 {
            warnings.push("Facing tolerance below 1 degree is finer than magnetometer noise".to_string());
        }

        if !config.remap_axes.is_valid() {
            errors.push(EngineError::invalid_config(
                "remap_axes",
                format!("{:?}/{:?}", config.remap_axes.x, config.remap_axes.y),
                "X and Y must use different device axes",
            ));
        }

        if config.heading_update_interval_ms > 60_000 {
            warnings.push("Heading update interval over a minute hides slow turns".to_string());
        }

        if config.known_points.is_empty() {
            warnings.push("No known points configured; nearest and facing lookups will return nothing".to_string());
        }

        let mut seen = HashSet::new();
        for point in &config.known_points {
            if let Err(e) = check_known_point(point) {
                errors.push(e);
            }
            if !seen.insert(point.name.as_str()) {
                warnings.push(format!("Duplicate known point name '{}'", point.name));
            }
        }

        if let Some(path) = &config.coefficient_file {
            if !path.is_file() {
                errors.push(EngineError::invalid_config(
                    "coefficient_file",
                    path.display(),
                    "file does not exist",
                ));
            }
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

fn check_facing_tolerance(tolerance_deg: f64) -> EngineResult<()> {
    if !tolerance_deg.is_finite() || tolerance_deg <= 0.0 || tolerance_deg > MAX_FACING_TOLERANCE_DEG {
        return Err(EngineError::invalid_config(
            "facing_tolerance_deg",
            tolerance_deg,
            "must be greater than 0 and at most 90 degrees",
        ));
    }
    Ok(())
}

fn check_known_point(point: &GeoPoint) -> EngineResult<()> {
    if point.name.trim().is_empty() {
        return Err(EngineError::invalid_config("known_points.name", "''", "name must not be empty"));
    }
    if !point.location().is_valid() {
        return Err(EngineError::invalid_config(
            format!("known_points[{}]", point.name),
            format!("{}, {}", point.latitude, point.longitude),
            "latitude must be within ±90 and longitude within ±180 degrees",
        ));
    }
    Ok(())
}
