//! Event-driven front end for the heading engine
//!
//! Consumes `SensorEvent`s from a channel, applies them to a `HeadingEngine`
//! and hands the resulting `EngineUpdate`s to registered callbacks.

use crate::api::events::{EngineUpdate, SensorEvent};
use crate::api::notifier::ChangeNotifier;
use crate::core::{GeoPoint, HeadingResult, Location, DEFAULT_FACING_TOLERANCE_DEG};
use crate::processing::engine::HeadingEngine;
use chrono::{DateTime, Duration, Utc};
use crossbeam::channel::{Receiver, TryRecvError};
use tracing::{debug, info, warn};

/// Callback invoked for every update that passes change suppression
pub type UpdateCallback = Box<dyn FnMut(&EngineUpdate) + Send>;

/// Callback registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u32);

impl CallbackHandle {
    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Counters accumulated while processing events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub events_processed: u64,
    pub headings_computed: u64,
    /// Sensor events after which no rotation matrix could be derived
    pub degenerate_samples: u64,
    pub rejected_locations: u64,
    pub updates_emitted: u64,
}

pub struct EngineDriver {
    engine: HeadingEngine,
    known_points: Vec<GeoPoint>,
    facing_tolerance_deg: f64,
    notifier: ChangeNotifier,
    receiver: Receiver<SensorEvent>,
    callbacks: Vec<(CallbackHandle, UpdateCallback)>,
    callback_counter: u32,
    stats: DriverStats,
    shutdown: bool,
    /// Instant of `timestamp_ms == 0` when replaying; wall clock otherwise
    replay_epoch: Option<DateTime<Utc>>,
}

impl EngineDriver {
    pub fn new(engine: HeadingEngine, known_points: Vec<GeoPoint>, receiver: Receiver<SensorEvent>) -> Self {
        Self {
            engine,
            known_points,
            facing_tolerance_deg: DEFAULT_FACING_TOLERANCE_DEG,
            notifier: ChangeNotifier::default(),
            receiver,
            callbacks: Vec::new(),
            callback_counter: 0,
            stats: DriverStats::default(),
            shutdown: false,
            replay_epoch: None,
        }
    }

    pub fn with_facing_tolerance(mut self, tolerance_deg: f64) -> Self {
        self.facing_tolerance_deg = tolerance_deg;
        self
    }

    pub fn with_notifier(mut self, notifier: ChangeNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Evaluate declination at `epoch + timestamp_ms` instead of the wall clock.
    /// Makes trace replay independent of when it is run.
    pub fn with_replay_epoch(mut self, epoch: DateTime<Utc>) -> Self {
        self.replay_epoch = Some(epoch);
        self
    }

    pub fn replay_epoch(&self) -> Option<DateTime<Utc>> {
        self.replay_epoch
    }

    pub fn register_callback(&mut self, callback: UpdateCallback) -> CallbackHandle {
        self.callback_counter += 1;
        let handle = CallbackHandle(self.callback_counter);
        self.callbacks.push((handle, callback));
        handle
    }

    /// Remove a callback; false if the handle was unknown
    pub fn unregister_callback(&mut self, handle: CallbackHandle) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(h, _)| *h != handle);
        self.callbacks.len() != before
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    pub fn engine(&self) -> &HeadingEngine {
        &self.engine
    }

    pub fn known_points(&self) -> &[GeoPoint] {
        &self.known_points
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Block on the channel until `Shutdown` arrives or every sender is gone
    pub fn run(&mut self) -> DriverStats {
        info!(points = self.known_points.len(), "driver_started");
        while !self.shutdown {
            match self.receiver.recv() {
                Ok(event) => {
                    self.handle_event(event);
                }
                Err(_) => {
                    debug!("event_channel_disconnected");
                    self.shutdown = true;
                }
            }
        }
        info!(
            events = self.stats.events_processed,
            updates = self.stats.updates_emitted,
            "driver_stopped"
        );
        self.stats
    }

    /// Handle whatever is queued without blocking; returns the number of events handled
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while !self.shutdown {
            match self.receiver.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.shutdown = true;
                }
            }
        }
        handled
    }

    /// Apply one event and dispatch the updates it produces
    pub fn handle_event(&mut self, event: SensorEvent) -> Vec<EngineUpdate> {
        self.stats.events_processed += 1;

        let updates = match event {
            SensorEvent::Accelerometer { values, timestamp_ms } => {
                self.engine.update_accelerometer(values);
                self.on_sensor_changed(timestamp_ms)
            }
            SensorEvent::Magnetometer { values, timestamp_ms } => {
                self.engine.update_magnetometer(values);
                self.on_sensor_changed(timestamp_ms)
            }
            SensorEvent::Location { location, timestamp_ms } => self.on_location_changed(location, timestamp_ms),
            SensorEvent::Shutdown => {
                debug!("shutdown_requested");
                self.shutdown = true;
                Vec::new()
            }
        };

        for update in &updates {
            for (_, callback) in self.callbacks.iter_mut() {
                callback(update);
            }
        }
        self.stats.updates_emitted += updates.len() as u64;
        updates
    }

    fn on_sensor_changed(&mut self, timestamp_ms: u64) -> Vec<EngineUpdate> {
        let mut updates = Vec::new();

        let heading = match self.replay_epoch {
            Some(epoch) => {
                let at = i64::try_from(timestamp_ms)
                    .ok()
                    .and_then(Duration::try_milliseconds)
                    .and_then(|offset| epoch.checked_add_signed(offset))
                    .unwrap_or(epoch);
                self.engine.current_heading_at(at)
            }
            None => self.engine.current_heading(),
        };
        let heading = match heading {
            Some(heading) => heading,
            None => {
                self.stats.degenerate_samples += 1;
                return updates;
            }
        };
        self.stats.headings_computed += 1;

        if self.notifier.should_emit_heading(&heading, timestamp_ms) {
            updates.push(EngineUpdate::Heading { heading, timestamp_ms });
        }

        if self.engine.location().is_some() {
            if let Some(update) = self.update_facing(&heading, timestamp_ms) {
                updates.push(update);
            }
        }
        updates
    }

    fn update_facing(&mut self, heading: &HeadingResult, timestamp_ms: u64) -> Option<EngineUpdate> {
        let facing = self
            .engine
            .facing_known_point(heading.azimuth_degrees, &self.known_points, self.facing_tolerance_deg);

        match facing {
            Some(point) => {
                if self.notifier.should_announce_point(self.engine.user_state_mut(), &point.name) {
                    debug!(point = %point.name, azimuth = heading.azimuth_degrees, "facing_point_changed");
                    Some(EngineUpdate::Facing { point, timestamp_ms })
                } else {
                    None
                }
            }
            None => {
                if self.notifier.clear_point(self.engine.user_state_mut()) {
                    Some(EngineUpdate::FacingCleared { timestamp_ms })
                } else {
                    None
                }
            }
        }
    }

    fn on_location_changed(&mut self, location: Location, timestamp_ms: u64) -> Vec<EngineUpdate> {
        if let Err(e) = self.engine.update_location(location) {
            warn!(error = %e, "location_rejected");
            self.stats.rejected_locations += 1;
            return Vec::new();
        }

        let nearest = match self.engine.nearest_known_point(&self.known_points) {
            Some(nearest) => nearest,
            None => return Vec::new(),
        };

        if self.notifier.should_announce_point(self.engine.user_state_mut(), &nearest.point.name) {
            debug!(
                point = %nearest.point.name,
                distance_m = nearest.distance_m,
                "nearest_point_changed"
            );
            vec![EngineUpdate::Nearest {
                point: nearest.point,
                distance_m: nearest.distance_m,
                location,
                timestamp_ms,
            }]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::geomagnetic::FixedDeclination;
    use crate::algorithms::orientation::test_vectors::upright;
    use crate::api::events::event_channel;
    use crate::processing::engine::HeadingSettings;
    use std::sync::{Arc, Mutex};

    fn driver_with(points: Vec<GeoPoint>) -> (crossbeam::channel::Sender<SensorEvent>, EngineDriver) {
        let (tx, rx) = event_channel();
        let engine =
            HeadingEngine::with_declination_model(HeadingSettings::default(), Box::new(FixedDeclination(0.0)));
        (tx, EngineDriver::new(engine, points, rx))
    }

    fn sensor_pair(heading: f64, timestamp_ms: u64) -> [SensorEvent; 2] {
        let (accel, mag) = upright(heading);
        [
            SensorEvent::Accelerometer { values: accel, timestamp_ms },
            SensorEvent::Magnetometer { values: mag, timestamp_ms },
        ]
    }

    fn north_marker() -> Vec<GeoPoint> {
        vec![GeoPoint::new("Tower", 0.01, 0.0), GeoPoint::new("Mill", 0.0, 0.01)]
    }

    fn location_event(latitude: f64, longitude: f64, timestamp_ms: u64) -> SensorEvent {
        SensorEvent::Location {
            location: Location::new(latitude, longitude),
            timestamp_ms,
        }
    }

    #[test]
    fn test_single_sensor_yields_no_update() {
        let (_tx, mut driver) = driver_with(north_marker());
        let [accel, _] = sensor_pair(0.0, 0);
        assert!(driver.handle_event(accel).is_empty());
        assert_eq!(driver.stats().degenerate_samples, 1);
    }

    #[test]
    fn test_heading_without_location_skips_facing() {
        let (_tx, mut driver) = driver_with(north_marker());
        let [accel, mag] = sensor_pair(90.0, 0);
        driver.handle_event(accel);
        let updates = driver.handle_event(mag);
        assert_eq!(updates.len(), 1);
        match &updates[0] {
            EngineUpdate::Heading { heading, .. } => assert_eq!(heading.cardinal_label(), "East"),
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[test]
    fn test_location_announces_nearest_once() {
        let (_tx, mut driver) = driver_with(north_marker());
        let updates = driver.handle_event(location_event(0.009, 0.0, 0));
        assert!(matches!(&updates[..], [EngineUpdate::Nearest { point, .. }] if point.name == "Tower"));
        assert!(driver.handle_event(location_event(0.0091, 0.0, 10)).is_empty());
    }

    #[test]
    fn test_facing_announced_then_cleared() {
        let (_tx, mut driver) = driver_with(north_marker());
        driver.handle_event(location_event(0.0, 0.0, 0));

        // Nearest announcement shares the remembered name with facing; clear it first
        let [accel, mag] = sensor_pair(200.0, 1);
        driver.handle_event(accel);
        let updates = driver.handle_event(mag);
        assert!(updates.iter().any(|u| matches!(u, EngineUpdate::FacingCleared { .. })));

        let [accel, mag] = sensor_pair(0.0, 2);
        driver.handle_event(accel);
        let updates = driver.handle_event(mag);
        assert!(updates
            .iter()
            .any(|u| matches!(u, EngineUpdate::Facing { point, .. } if point.name == "Tower")));

        let [accel, mag] = sensor_pair(2.0, 3);
        driver.handle_event(accel);
        let updates = driver.handle_event(mag);
        assert!(!updates.iter().any(|u| matches!(u, EngineUpdate::Facing { .. })));

        let [accel, mag] = sensor_pair(90.0, 4);
        driver.handle_event(accel);
        let updates = driver.handle_event(mag);
        assert!(updates
            .iter()
            .any(|u| matches!(u, EngineUpdate::Facing { point, .. } if point.name == "Mill")));
    }

    #[test]
    fn test_rejected_location_is_counted() {
        let (_tx, mut driver) = driver_with(north_marker());
        assert!(driver.handle_event(location_event(120.0, 0.0, 0)).is_empty());
        assert_eq!(driver.stats().rejected_locations, 1);
        assert!(driver.engine().location().is_none());
    }

    #[test]
    fn test_run_dispatches_to_callbacks_until_shutdown() {
        let (tx, mut driver) = driver_with(north_marker());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        driver.register_callback(Box::new(move |update| sink.lock().unwrap().push(update.clone())));

        tx.send(location_event(0.0, 0.0, 0)).unwrap();
        for event in sensor_pair(45.0, 5) {
            tx.send(event).unwrap();
        }
        tx.send(SensorEvent::Shutdown).unwrap();
        tx.send(location_event(0.009, 0.0, 9)).unwrap();

        let stats = driver.run();
        assert!(driver.is_shutdown());
        assert_eq!(stats.events_processed, 4);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len() as u64, stats.updates_emitted);
        assert!(matches!(seen.first(), Some(EngineUpdate::Nearest { .. })));
        assert!(seen.iter().any(|u| matches!(u, EngineUpdate::Heading { .. })));
    }

    #[test]
    fn test_run_stops_when_senders_dropped() {
        let (tx, mut driver) = driver_with(north_marker());
        tx.send(location_event(0.0, 0.0, 0)).unwrap();
        drop(tx);
        let stats = driver.run();
        assert_eq!(stats.events_processed, 1);
    }

    #[test]
    fn test_process_pending_does_not_block() {
        let (tx, mut driver) = driver_with(north_marker());
        assert_eq!(driver.process_pending(), 0);
        for event in sensor_pair(0.0, 0) {
            tx.send(event).unwrap();
        }
        assert_eq!(driver.process_pending(), 2);
        assert!(!driver.is_shutdown());
    }

    #[test]
    fn test_unregister_callback() {
        let (_tx, mut driver) = driver_with(north_marker());
        let handle = driver.register_callback(Box::new(|_| {}));
        assert_eq!(driver.callback_count(), 1);
        assert!(driver.unregister_callback(handle));
        assert!(!driver.unregister_callback(handle));
        assert_eq!(driver.callback_count(), 0);
    }

    /// Ten degrees east before 2023, none after
    struct SteppedDeclination;

    impl crate::algorithms::geomagnetic::DeclinationModel for SteppedDeclination {
        fn declination_degrees(&self, _location: &Location, at: DateTime<Utc>) -> f64 {
            if at.timestamp() < 1_672_531_200 {
                10.0
            } else {
                0.0
            }
        }
    }

    #[test]
    fn test_replay_epoch_fixes_declination_instant() {
        use chrono::TimeZone;

        let (tx, rx) = event_channel();
        let engine = HeadingEngine::with_declination_model(HeadingSettings::default(), Box::new(SteppedDeclination));
        let epoch = Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap();
        let mut driver = EngineDriver::new(engine, north_marker(), rx).with_replay_epoch(epoch);
        assert_eq!(driver.replay_epoch(), Some(epoch));

        tx.send(location_event(0.0, 0.0, 0)).unwrap();
        for event in sensor_pair(90.0, 1_000) {
            tx.send(event).unwrap();
        }
        driver.process_pending();

        let heading = driver.engine().last_heading().unwrap();
        assert_eq!(heading.declination_degrees, Some(10.0));
        assert!((heading.azimuth_degrees - 80.0).abs() < 1e-6);
    }
}
