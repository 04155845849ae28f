//! Error types for the engine's configuration, input and delivery layers
//!
//! The heading and proximity math itself never fails: degenerate input
//! produces `None`. Errors only come from the layers around it (reading
//! configuration, parsing coefficient or trace files, channel delivery).

use thiserror::Error;

/// Errors raised outside the pure heading/proximity computations
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configuration value is out of range or inconsistent
    #[error("invalid configuration: {parameter} = {value} ({reason})")]
    InvalidConfig {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Configuration names a value that must be present
    #[error("missing configuration parameter: {parameter}")]
    MissingParameter { parameter: String },

    /// Reading or writing a file failed
    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A geomagnetic coefficient file is malformed
    #[error("coefficient file line {line}: {reason}")]
    CoefficientParse { line: usize, reason: String },

    /// A recorded sensor trace contains a bad record
    #[error("trace line {line}: {reason}")]
    TraceParse { line: usize, reason: String },

    /// A location fix is outside the geodetic ranges or not finite
    #[error("invalid location: lat={latitude}, lon={longitude}")]
    InvalidLocation { latitude: f64, longitude: f64 },

    /// The other end of the event channel went away
    #[error("event channel closed")]
    ChannelClosed,
}

impl EngineError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_config(
        parameter: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        EngineError::InvalidConfig {
            parameter: parameter.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors that only affect a single input and can be skipped
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::TraceParse { .. } | EngineError::InvalidLocation { .. }
        )
    }
}

/// Result type for fallible engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = EngineError::invalid_config("facing_tolerance_deg", 120.0, "must be at most 90");
        assert_eq!(
            err.to_string(),
            "invalid configuration: facing_tolerance_deg = 120 (must be at most 90)"
        );

        let err = EngineError::CoefficientParse { line: 3, reason: "expected 6 fields".into() };
        assert_eq!(err.to_string(), "coefficient file line 3: expected 6 fields");
    }

    #[test]
    fn test_recoverability() {
        assert!(EngineError::TraceParse { line: 1, reason: "x".into() }.is_recoverable());
        assert!(!EngineError::ChannelClosed.is_recoverable());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: EngineError = json_err.into();
        assert!(matches!(err, EngineError::Serialization(_)));
    }
}
