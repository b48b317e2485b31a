//! Error types for payload decoding in sensortag-types.

use thiserror::Error;

/// Errors that can occur when decoding SensorTag characteristic payloads.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in sensortag-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload is shorter than the sensor's data layout.
    #[error("Insufficient bytes: requires {expected} bytes, got {actual}")]
    InsufficientBytes {
        /// Minimum payload size for the layout.
        expected: usize,
        /// Size of the payload that was received.
        actual: usize,
    },

    /// A value could not be interpreted.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Unrecognised sensor name.
    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),
}

impl ParseError {
    /// Fail with [`ParseError::InsufficientBytes`] if `data` is shorter than `expected`.
    pub fn check_len(data: &[u8], expected: usize) -> ParseResult<()> {
        if data.len() < expected {
            Err(ParseError::InsufficientBytes {
                expected,
                actual: data.len(),
            })
        } else {
            Ok(())
        }
    }
}

/// Result type alias using sensortag-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
