//! Heading & Proximity Engine
//!
//! Turns raw accelerometer and magnetometer samples into a true-north compass
//! heading, and answers two questions about a fixed list of named points:
//! which one is nearest, and which one the user is facing.
//!
//! ```no_run
//! use heading_engine::{GeoPoint, HeadingEngine, Location};
//!
//! let mut engine = HeadingEngine::default();
//! engine.update_accelerometer([0.0, 9.81, 0.0]);
//! engine.update_magnetometer([-8.2, -40.0, -20.4]);
//! engine.update_location(Location::new(33.6054, -112.3649)).unwrap();
//!
//! if let Some(heading) = engine.current_heading() {
//!     let points = GeoPoint::demo_points();
//!     let facing = engine.facing_known_point(heading.azimuth_degrees, &points, 15.0);
//!     println!("{} -> {:?}", heading.cardinal, facing.map(|p| p.name));
//! }
//! ```

pub mod algorithms;
pub mod api;
pub mod core;
pub mod processing;
pub mod sensors;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use crate::core::{GeoPoint, HeadingResult, Location, NearestPoint, SensorSample, UserState};
pub use algorithms::{CardinalDirection, DisplayRotation, DistanceModel, GeomagneticModel, RemapAxes};
pub use api::{event_channel, ChangeNotifier, EngineDriver, EngineUpdate, SensorEvent};
pub use processing::{facing_point, nearest_point, HeadingEngine, HeadingSettings};
pub use utils::{ConfigurationManager, EngineConfig};
pub use validation::{EngineError, EngineResult};
