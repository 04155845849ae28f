//! Inbound sensor events and outbound engine updates

use crate::core::{GeoPoint, HeadingResult, Location};
use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// One delivery from a platform sensor or location provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorEvent {
    Accelerometer {
        values: [f64; 3],
        #[serde(default)]
        timestamp_ms: u64,
    },
    Magnetometer {
        values: [f64; 3],
        #[serde(default)]
        timestamp_ms: u64,
    },
    Location {
        location: Location,
        #[serde(default)]
        timestamp_ms: u64,
    },
    /// Stop the consumer after everything queued before it
    Shutdown,
}

impl SensorEvent {
    pub fn timestamp_ms(&self) -> Option<u64> {
        match self {
            SensorEvent::Accelerometer { timestamp_ms, .. }
            | SensorEvent::Magnetometer { timestamp_ms, .. }
            | SensorEvent::Location { timestamp_ms, .. } => Some(*timestamp_ms),
            SensorEvent::Shutdown => None,
        }
    }
}

/// Something the presentation layer should show
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "update", rename_all = "snake_case")]
pub enum EngineUpdate {
    Heading {
        heading: HeadingResult,
        timestamp_ms: u64,
    },
    Nearest {
        point: GeoPoint,
        distance_m: f64,
        location: Location,
        timestamp_ms: u64,
    },
    Facing {
        point: GeoPoint,
        timestamp_ms: u64,
    },
    /// The previously faced point is no longer in view
    FacingCleared { timestamp_ms: u64 },
}

impl EngineUpdate {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            EngineUpdate::Heading { timestamp_ms, .. }
            | EngineUpdate::Nearest { timestamp_ms, .. }
            | EngineUpdate::Facing { timestamp_ms, .. }
            | EngineUpdate::FacingCleared { timestamp_ms } => *timestamp_ms,
        }
    }
}

/// Unbounded channel carrying sensor events to an `EngineDriver`
pub fn event_channel() -> (Sender<SensorEvent>, Receiver<SensorEvent>) {
    channel::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event: SensorEvent =
            serde_json::from_str(r#"{"kind":"accelerometer","values":[0.0,9.81,0.0],"timestamp_ms":20}"#).unwrap();
        assert_eq!(
            event,
            SensorEvent::Accelerometer {
                values: [0.0, 9.81, 0.0],
                timestamp_ms: 20
            }
        );

        let event: SensorEvent =
            serde_json::from_str(r#"{"kind":"location","location":{"latitude":33.6,"longitude":-112.3}}"#).unwrap();
        assert_eq!(event.timestamp_ms(), Some(0));

        let event: SensorEvent = serde_json::from_str(r#"{"kind":"shutdown"}"#).unwrap();
        assert_eq!(event, SensorEvent::Shutdown);
        assert_eq!(event.timestamp_ms(), None);
    }

    #[test]
    fn test_channel_preserves_order() {
        let (tx, rx) = event_channel();
        tx.send(SensorEvent::Magnetometer { values: [1.0, 2.0, 3.0], timestamp_ms: 1 }).unwrap();
        tx.send(SensorEvent::Shutdown).unwrap();
        assert_eq!(rx.recv().unwrap().timestamp_ms(), Some(1));
        assert_eq!(rx.recv().unwrap(), SensorEvent::Shutdown);
    }
}
