//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when encoding or parsing protocol messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload contains a framing marker and cannot be sent unescaped.
    #[error("payload contains marker byte 0x{byte:02X} at offset {offset}")]
    PayloadContainsMarker {
        /// The offending marker byte.
        byte: u8,
        /// Offset of the marker in the payload.
        offset: usize,
    },

    /// Gun index outside 0-3.
    #[error("invalid gun index: {0}")]
    InvalidGunIndex(usize),

    /// Calibration page length of zero.
    #[error("calibration page length must be positive")]
    InvalidPageLength,

    /// Payload is not a valid message document.
    #[error("invalid message document: {0}")]
    InvalidDocument(String),

    /// A required field is missing or has the wrong type.
    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::InvalidDocument(e.to_string())
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
