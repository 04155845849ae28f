//! Error types and input validation

pub mod error;

pub use error::{EngineError, EngineResult};
