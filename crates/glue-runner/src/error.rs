//! Runner error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the serial transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The port could not be opened (missing, already claimed, or failed to initialize).
    #[error("connection to {port} failed: {source}")]
    Connection {
        /// Port that was requested.
        port: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// Operation needs an open link and there is none.
    #[error("not connected")]
    NotConnected,

    /// Read, write or timeout failure on an open link.
    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while loading session settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Read {
        /// Settings file path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// Settings file is not valid YAML for [`SessionSettings`](crate::SessionSettings).
    #[error("invalid settings file {path}: {source}")]
    Parse {
        /// Settings file path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: serde_yaml::Error,
    },

    /// A setting has an unusable value.
    #[error("invalid setting {name}: {reason}")]
    Invalid {
        /// Setting name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
