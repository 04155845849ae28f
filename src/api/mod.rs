//! Event-driven interface to the heading engine
//!
//! Sensor events flow in over a channel, updates flow out to callbacks,
//! and the formatters render those updates for display or logging.

pub mod driver;
pub mod events;
pub mod formatting;
pub mod notifier;

pub use driver::{CallbackHandle, DriverStats, EngineDriver, UpdateCallback};
pub use events::{event_channel, EngineUpdate, SensorEvent};
pub use formatting::{CsvFormatter, JsonFormatter, TextFormatter};
pub use notifier::ChangeNotifier;
