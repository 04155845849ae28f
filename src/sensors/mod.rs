//! Sources of sensor events
//!
//! A `SensorSource` stands in for the platform's sensor and location
//! services. Sources are pulled one event at a time and can be pumped into
//! the driver's channel from a separate thread.

pub mod scripted;
pub mod trace;

pub use scripted::ScriptedSource;
pub use trace::RecordedTrace;

use crate::api::events::SensorEvent;
use crate::validation::{EngineError, EngineResult};
use crossbeam::channel::Sender;
use tracing::{debug, warn};

/// Anything that yields sensor events in delivery order
pub trait SensorSource {
    /// Next event, or `None` once the source is exhausted
    fn next_event(&mut self) -> EngineResult<Option<SensorEvent>>;

    /// Short description for logs
    fn describe(&self) -> String {
        "sensor source".to_string()
    }
}

/// Forward every event from `source` into `sender`, then send `Shutdown`.
///
/// Recoverable errors (a malformed trace line) are logged and skipped; any
/// other error stops the pump. Returns the number of events forwarded, not
/// counting the final `Shutdown`.
pub fn pump<S: SensorSource + ?Sized>(source: &mut S, sender: &Sender<SensorEvent>) -> EngineResult<usize> {
    let mut forwarded = 0;

    loop {
        match source.next_event() {
            Ok(Some(SensorEvent::Shutdown)) => break,
            Ok(Some(event)) => {
                sender.send(event).map_err(|_| EngineError::ChannelClosed)?;
                forwarded += 1;
            }
            Ok(None) => break,
            Err(e) if e.is_recoverable() => {
                warn!(source = %source.describe(), error = %e, "sensor_event_skipped");
            }
            Err(e) => return Err(e),
        }
    }

    sender.send(SensorEvent::Shutdown).map_err(|_| EngineError::ChannelClosed)?;
    debug!(source = %source.describe(), forwarded, "sensor_source_exhausted");
    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::events::event_channel;
    use crate::core::Location;
    use std::io::Cursor;

    #[test]
    fn test_pump_appends_shutdown() {
        let mut source = ScriptedSource::new();
        source.push_accelerometer([0.0, 9.81, 0.0], 0);
        source.push_location(Location::new(1.0, 2.0), 5);

        let (tx, rx) = event_channel();
        assert_eq!(pump(&mut source, &tx).unwrap(), 2);

        let received: Vec<SensorEvent> = rx.try_iter().collect();
        assert_eq!(received.len(), 3);
        assert_eq!(received.last(), Some(&SensorEvent::Shutdown));
    }

    #[test]
    fn test_pump_skips_malformed_trace_lines() {
        let text = "{\"kind\":\"magnetometer\",\"values\":[1,2,3]}\nnot json\n{\"kind\":\"shutdown\"}\n{\"kind\":\"magnetometer\",\"values\":[4,5,6]}\n";
        let mut trace = RecordedTrace::new(Cursor::new(text));

        let (tx, rx) = event_channel();
        assert_eq!(pump(&mut trace, &tx).unwrap(), 1);
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_pump_reports_closed_channel() {
        let mut source = ScriptedSource::new();
        source.push_magnetometer([1.0, 0.0, 0.0], 0);

        let (tx, rx) = event_channel();
        drop(rx);
        assert!(matches!(pump(&mut source, &tx), Err(EngineError::ChannelClosed)));
    }
}
