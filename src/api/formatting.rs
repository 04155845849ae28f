//! Update output formatting
//!
//! Renders `EngineUpdate`s for a terminal or a log pipeline: human-readable
//! text, JSON lines, and CSV rows.

use crate::api::events::EngineUpdate;
use crate::core::{HeadingResult, Location};

/// Human-readable text formatter
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    /// One line per update, without pitch/roll and declination detail
    pub compact: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compact() -> Self {
        Self { compact: true }
    }

    pub fn format_text(&self, update: &EngineUpdate) -> String {
        let mut output = String::new();

        match update {
            EngineUpdate::Heading { heading, .. } => {
                output.push_str(&compass_line(heading));
                if !self.compact {
                    output.push_str(&format!(
                        "\n  Pitch: {:.1}°  Roll: {:.1}°",
                        heading.pitch_degrees, heading.roll_degrees
                    ));
                    match heading.declination_degrees {
                        Some(declination) => output.push_str(&format!("\n  Declination: {:+.2}°", declination)),
                        None => output.push_str("\n  Declination: not applied (no fix)"),
                    }
                }
            }
            EngineUpdate::Nearest { point, distance_m, location, .. } => {
                if !self.compact {
                    output.push_str(&gps_line(location));
                    output.push('\n');
                }
                output.push_str(&format!("Closest: {} ({}m)", point.name, distance_m.trunc() as i64));
            }
            EngineUpdate::Facing { point, .. } => {
                output.push_str(&format!("Looking at: {}", point.name));
            }
            EngineUpdate::FacingCleared { .. } => {
                output.push_str("None");
            }
        }

        output
    }
}

fn compass_line(heading: &HeadingResult) -> String {
    format!(
        "Compass: {}° ({})",
        heading.azimuth_degrees.trunc() as i64,
        heading.cardinal_label()
    )
}

fn gps_line(location: &Location) -> String {
    format!("GPS: {}, {}", location.latitude, location.longitude)
}

/// JSON formatter for structured output
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    pub fn format_json(&self, update: &EngineUpdate) -> Result<String, serde_json::Error> {
        if self.pretty {
            serde_json::to_string_pretty(update)
        } else {
            serde_json::to_string(update)
        }
    }
}

/// CSV formatter for data logging
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    pub include_header: bool,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self { include_header: true }
    }
}

impl CsvFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_header() -> Self {
        Self { include_header: false }
    }

    pub fn header(&self) -> String {
        "timestamp_ms,update,azimuth_deg,cardinal,declination_deg,point,distance_m".to_string()
    }

    /// Header row to print before the first update, if enabled
    pub fn preamble(&self) -> Option<String> {
        self.include_header.then(|| self.header())
    }

    pub fn format_csv(&self, update: &EngineUpdate) -> String {
        let timestamp_ms = update.timestamp_ms();
        match update {
            EngineUpdate::Heading { heading, .. } => format!(
                "{},heading,{:.2},{},{},,",
                timestamp_ms,
                heading.azimuth_degrees,
                heading.cardinal.abbreviation(),
                heading
                    .declination_degrees
                    .map(|d| format!("{:.2}", d))
                    .unwrap_or_default()
            ),
            EngineUpdate::Nearest { point, distance_m, .. } => {
                format!("{},nearest,,,,{},{:.1}", timestamp_ms, csv_field(&point.name), distance_m)
            }
            EngineUpdate::Facing { point, .. } => {
                format!("{},facing,,,,{},", timestamp_ms, csv_field(&point.name))
            }
            EngineUpdate::FacingCleared { .. } => format!("{},facing_cleared,,,,,", timestamp_ms),
        }
    }
}

/// Quote a field if it contains a separator, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
