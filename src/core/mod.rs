//! Core types and constants for the heading and proximity engine

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
