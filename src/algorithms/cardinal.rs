//! Eight-sector compass labels

use crate::algorithms::angles::normalize_degrees;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cardinal and ordinal compass directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardinalDirection {
    North,
    Northeast,
    East,
    Southeast,
    South,
    Southwest,
    West,
    Northwest,
}

/// Inclusive upper bound of each sector after North, walking clockwise.
/// North owns [337.5, 360) and [0, 22.5).
const SECTOR_UPPER_BOUNDS: [(f64, CardinalDirection); 7] = [
    (67.5, CardinalDirection::Northeast),
    (112.5, CardinalDirection::East),
    (157.5, CardinalDirection::Southeast),
    (202.5, CardinalDirection::South),
    (247.5, CardinalDirection::Southwest),
    (292.5, CardinalDirection::West),
    (337.5, CardinalDirection::Northwest),
];

impl CardinalDirection {
    /// Map an azimuth in degrees onto one of the eight 45 degree sectors
    pub fn from_azimuth(azimuth_degrees: f64) -> Self {
        let azimuth = normalize_degrees(azimuth_degrees);
        if azimuth < 22.5 || azimuth >= 337.5 {
            return CardinalDirection::North;
        }

        SECTOR_UPPER_BOUNDS
            .iter()
            .find(|(upper, _)| azimuth <= *upper)
            .map(|(_, direction)| *direction)
            .unwrap_or(CardinalDirection::North)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CardinalDirection::North => "North",
            CardinalDirection::Northeast => "Northeast",
            CardinalDirection::East => "East",
            CardinalDirection::Southeast => "Southeast",
            CardinalDirection::South => "South",
            CardinalDirection::Southwest => "Southwest",
            CardinalDirection::West => "West",
            CardinalDirection::Northwest => "Northwest",
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            CardinalDirection::North => "N",
            CardinalDirection::Northeast => "NE",
            CardinalDirection::East => "E",
            CardinalDirection::Southeast => "SE",
            CardinalDirection::South => "S",
            CardinalDirection::Southwest => "SW",
            CardinalDirection::West => "W",
            CardinalDirection::Northwest => "NW",
        }
    }
}

impl fmt::Display for CardinalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
