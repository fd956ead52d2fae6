//! Named configuration profiles and their on-disk store.
//!
//! Each profile is one pretty-printed JSON document in the profile directory:
//!
//! ```text
//! {
//!   "name": "Carton A",
//!   "createdAt": "2026-10-17T09:30:00+02:00",
//!   "config": { "controllerType": "dots", ... }
//! }
//! ```
//!
//! Files are addressed by a sanitized form of the profile name.

use crate::config::ControllerConfig;
use crate::error::{ModelError, ModelResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Application directory name under the platform data directory.
pub const APP_DIR_NAME: &str = "GlueControllerUI";

/// Profile subdirectory under [`APP_DIR_NAME`].
pub const PROFILES_DIR_NAME: &str = "Profiles";

const PROFILE_EXTENSION: &str = "json";

/// A named, timestamped configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Display name, also used as the storage key.
    pub name: String,
    /// When the profile was created.
    pub created_at: DateTime<Local>,
    /// Owned configuration snapshot.
    pub config: ControllerConfig,
}

impl Profile {
    /// Snapshot `config` under `name`, stamped with the current time.
    ///
    /// The configuration is deep-cloned so later edits to the live
    /// configuration never reach the profile.
    pub fn snapshot(name: impl Into<String>, config: &ControllerConfig) -> Self {
        Profile {
            name: name.into(),
            created_at: Local::now(),
            config: config.clone(),
        }
    }

    /// Serialize as a pretty-printed JSON document.
    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a JSON profile document.
    ///
    /// Rejects documents whose guns are not stored at their own index.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        let profile: Profile = serde_json::from_str(json)?;
        profile.config.check_gun_ids()?;
        Ok(profile)
    }
}

/// Replace characters that are invalid in file names.
///
/// The name is split on invalid characters, empty pieces are dropped and the
/// rest is joined with `_`, so `"a/b"` becomes `"a_b"` and `"//x"` becomes `"x"`.
pub fn sanitize_file_name(name: &str) -> String {
    name.split(is_invalid_file_name_char)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn is_invalid_file_name_char(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// Default profile directory: `<data dir>/GlueControllerUI/Profiles`.
///
/// Returns `None` when the platform has no home directory.
pub fn default_profiles_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| {
        dirs.data_dir()
            .join(APP_DIR_NAME)
            .join(PROFILES_DIR_NAME)
    })
}

/// A directory of profile documents, one file per profile.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> ModelResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(ProfileStore { dir })
    }

    /// Directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document that stores the profile called `name`.
    pub fn path_for(&self, name: &str) -> ModelResult<PathBuf> {
        let stem = sanitize_file_name(name);
        if stem.is_empty() {
            return Err(ModelError::InvalidProfileName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", stem, PROFILE_EXTENSION)))
    }

    /// All readable profiles, newest first. Unreadable documents are skipped.
    pub fn list(&self) -> ModelResult<Vec<Profile>> {
        let mut profiles = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            match read_profile(&path) {
                Ok(profile) => profiles.push(profile),
                Err(e) => warn!("Skipping unreadable profile {}: {}", path.display(), e),
            }
        }

        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    /// Write a profile, replacing any existing profile with the same file name.
    pub fn save(&self, profile: &Profile) -> ModelResult<PathBuf> {
        let path = self.path_for(&profile.name)?;
        fs::write(&path, profile.to_json()?)?;
        debug!("Saved profile '{}' to {}", profile.name, path.display());
        Ok(path)
    }

    /// Load the profile called `name`.
    pub fn load(&self, name: &str) -> ModelResult<Profile> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(ModelError::ProfileNotFound(name.to_string()));
        }
        read_profile(&path)
    }

    /// Delete the profile called `name`. Returns whether a file was removed.
    pub fn delete(&self, name: &str) -> ModelResult<bool> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        debug!("Deleted profile '{}'", name);
        Ok(true)
    }

    /// Write a profile document to an arbitrary path.
    pub fn export(&self, profile: &Profile, path: impl AsRef<Path>) -> ModelResult<()> {
        fs::write(path.as_ref(), profile.to_json()?)?;
        Ok(())
    }

    /// Read a profile document from an arbitrary path and store it.
    pub fn import(&self, path: impl AsRef<Path>) -> ModelResult<Profile> {
        let profile = read_profile(path.as_ref())?;
        self.save(&profile)?;
        Ok(profile)
    }
}

fn read_profile(path: &Path) -> ModelResult<Profile> {
    let json = fs::read_to_string(path)?;
    Profile::from_json(&json)
}
