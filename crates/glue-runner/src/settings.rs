//! Session settings file.
//!
//! A small YAML document with defaults for every field:
//!
//! ```yaml
//! port: /dev/ttyUSB0
//! baudRate: 115200
//! writeTimeoutMs: 500
//! pollIntervalMs: 10
//! calibrationPageLength: 1000
//! profilesDir: /home/operator/profiles
//! ```

use crate::error::SettingsError;
use glue_model::default_profiles_dir;
use glue_protocol::{DEFAULT_BAUD_RATE, DEFAULT_CALIBRATION_PAGE_LENGTH, WRITE_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Settings for a controller session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SessionSettings {
    /// Port opened when none is given on the command line.
    pub port: Option<String>,
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Bound on a single frame write.
    pub write_timeout_ms: u64,
    /// Reader poll cadence while the line is idle.
    pub poll_interval_ms: u64,
    /// Page length used for calibration when none is given.
    pub calibration_page_length: u32,
    /// Profile directory. Defaults to the platform data directory.
    pub profiles_dir: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            write_timeout_ms: WRITE_TIMEOUT_MS,
            poll_interval_ms: 10,
            calibration_page_length: DEFAULT_CALIBRATION_PAGE_LENGTH,
            profiles_dir: None,
        }
    }
}

impl SessionSettings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", path.display());
                return Ok(SessionSettings::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_yaml(&text).map_err(|e| match e {
            SettingsError::Parse { source, .. } => SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse settings from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, SettingsError> {
        // An empty document is null in YAML, not an empty mapping.
        let settings: SessionSettings = if text.trim().is_empty() {
            SessionSettings::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| SettingsError::Parse {
                path: PathBuf::new(),
                source,
            })?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.baud_rate == 0 {
            return Err(SettingsError::Invalid {
                name: "baudRate",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.write_timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                name: "writeTimeoutMs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.calibration_page_length == 0 {
            return Err(SettingsError::Invalid {
                name: "calibrationPageLength",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Profile directory to use, falling back to the platform data directory.
    pub fn resolve_profiles_dir(&self) -> Option<PathBuf> {
        self.profiles_dir.clone().or_else(default_profiles_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.write_timeout(), Duration::from_millis(500));
        assert_eq!(settings.calibration_page_length, 1000);
        assert!(settings.port.is_none());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let settings = SessionSettings::from_yaml("port: COM3\nbaudRate: 9600\n").unwrap();
        assert_eq!(settings.port.as_deref(), Some("COM3"));
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.poll_interval_ms, 10);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(
            SessionSettings::from_yaml("  \n").unwrap(),
            SessionSettings::default()
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = SessionSettings::from_yaml("baudrate: 9600\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_zero_baud_rejected() {
        let err = SessionSettings::from_yaml("baudRate: 0\n").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { name: "baudRate", .. }));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SessionSettings::load(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(settings, SessionSettings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");
        fs::write(&path, "profilesDir: /tmp/glue-profiles\npollIntervalMs: 0\n").unwrap();

        let settings = SessionSettings::load(&path).unwrap();
        assert_eq!(
            settings.resolve_profiles_dir(),
            Some(PathBuf::from("/tmp/glue-profiles"))
        );
        assert_eq!(settings.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "baudRate: [fast]\n").unwrap();

        match SessionSettings::load(&path).unwrap_err() {
            SettingsError::Parse { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
