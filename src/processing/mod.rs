//! Heading computation and known-point lookups

pub mod engine;
pub mod proximity;

pub use engine::{heading_from_sample, EngineSnapshot, HeadingEngine, HeadingSettings};
pub use proximity::{facing_point, facing_point_default, nearest_point};
