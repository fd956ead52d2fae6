//! Model error types.

use thiserror::Error;

/// Errors raised by the configuration model and the profile store.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Gun index outside `0..GUN_COUNT`.
    #[error("invalid gun index {index}: expected 0..{max}")]
    InvalidGunIndex {
        /// Requested index.
        index: usize,
        /// Number of guns.
        max: usize,
    },

    /// Zone index outside the gun's zone list.
    #[error("zone index {index} out of range for gun {gun} ({len} zones)")]
    ZoneIndexOutOfRange {
        /// Gun the zone belongs to.
        gun: u8,
        /// Requested index.
        index: usize,
        /// Current number of zones.
        len: usize,
    },

    /// Gun stored in a slot that does not match its own index.
    #[error("gun in slot {slot} has id {gun_id}")]
    GunIdMismatch {
        /// Position of the gun in the configuration.
        slot: usize,
        /// Index the gun claims.
        gun_id: u8,
    },

    /// Profile name that sanitizes to nothing usable as a file name.
    #[error("invalid profile name: {0:?}")]
    InvalidProfileName(String),

    /// No stored profile with this name.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// Filesystem failure in the profile store.
    #[error("profile storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Profile document could not be (de)serialized.
    #[error("profile document error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
