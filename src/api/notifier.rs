//! Change suppression for user-facing notifications
//!
//! Sits on top of the engine: the engine reports every heading it can
//! compute, and this decides which of them are worth showing.

use crate::algorithms::cardinal::CardinalDirection;
use crate::core::{HeadingResult, UserState, DEFAULT_HEADING_UPDATE_INTERVAL_MS};

/// Debounces heading updates and de-duplicates point announcements
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    /// Minimum time between heading updates with an unchanged direction
    update_interval_ms: u64,
    last_direction: Option<CardinalDirection>,
    last_heading_emit_ms: Option<u64>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_HEADING_UPDATE_INTERVAL_MS)
    }
}

impl ChangeNotifier {
    pub fn new(update_interval_ms: u64) -> Self {
        Self {
            update_interval_ms,
            last_direction: None,
            last_heading_emit_ms: None,
        }
    }

    pub fn update_interval_ms(&self) -> u64 {
        self.update_interval_ms
    }

    /// Emit when the cardinal direction changed or the interval elapsed
    pub fn should_emit_heading(&mut self, heading: &HeadingResult, now_ms: u64) -> bool {
        let direction_changed = self.last_direction != Some(heading.cardinal);
        let interval_elapsed = match self.last_heading_emit_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.update_interval_ms,
            None => true,
        };

        if direction_changed || interval_elapsed {
            self.last_direction = Some(heading.cardinal);
            self.last_heading_emit_ms = Some(now_ms);
            true
        } else {
            false
        }
    }

    /// Record `name` as announced; false if it was already the last one
    pub fn should_announce_point(&self, state: &mut UserState, name: &str) -> bool {
        if state.last_notified_point_name.as_deref() == Some(name) {
            return false;
        }
        state.last_notified_point_name = Some(name.to_string());
        true
    }

    /// Forget the last announced point; true if there was one
    pub fn clear_point(&self, state: &mut UserState) -> bool {
        state.last_notified_point_name.take().is_some()
    }

    pub fn reset(&mut self) {
        self.last_direction = None;
        self.last_heading_emit_ms = None;
    }
}
