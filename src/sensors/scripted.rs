//! In-memory sensor source for tests and demos

use crate::api::events::SensorEvent;
use crate::core::Location;
use crate::sensors::SensorSource;
use crate::validation::EngineResult;
use std::collections::VecDeque;

/// Replays a queue of events built up in code
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    queue: VecDeque<SensorEvent>,
    delivered: usize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: impl IntoIterator<Item = SensorEvent>) -> Self {
        Self {
            queue: events.into_iter().collect(),
            delivered: 0,
        }
    }

    pub fn push(&mut self, event: SensorEvent) {
        self.queue.push_back(event);
    }

    pub fn push_accelerometer(&mut self, values: [f64; 3], timestamp_ms: u64) {
        self.push(SensorEvent::Accelerometer { values, timestamp_ms });
    }

    pub fn push_magnetometer(&mut self, values: [f64; 3], timestamp_ms: u64) {
        self.push(SensorEvent::Magnetometer { values, timestamp_ms });
    }

    pub fn push_location(&mut self, location: Location, timestamp_ms: u64) {
        self.push(SensorEvent::Location { location, timestamp_ms });
    }

    pub fn queued_event_count(&self) -> usize {
        self.queue.len()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered
    }
}

impl SensorSource for ScriptedSource {
    fn next_event(&mut self) -> EngineResult<Option<SensorEvent>> {
        let event = self.queue.pop_front();
        if event.is_some() {
            self.delivered += 1;
        }
        Ok(event)
    }

    fn describe(&self) -> String {
        format!("scripted source ({} queued)", self.queue.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_replayed_in_order() {
        let mut source = ScriptedSource::from_events(vec![
            SensorEvent::Magnetometer { values: [1.0, 0.0, 0.0], timestamp_ms: 3 },
            SensorEvent::Accelerometer { values: [0.0, 0.0, 9.8], timestamp_ms: 4 },
        ]);
        assert_eq!(source.queued_event_count(), 2);
        assert_eq!(source.next_event().unwrap().and_then(|e| e.timestamp_ms()), Some(3));
        assert_eq!(source.next_event().unwrap().and_then(|e| e.timestamp_ms()), Some(4));
        assert!(source.next_event().unwrap().is_none());
        assert_eq!(source.delivered_count(), 2);
    }
}
