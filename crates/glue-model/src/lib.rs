//! Glue Controller Model
//!
//! This crate holds the configuration data model shared by the protocol and
//! session layers of the glue dispensing controller:
//!
//! - [`ControllerConfig`] - global controller settings plus exactly four guns
//! - [`GunConfig`] - one dispensing gun with its ordered list of zones
//! - [`GlueZone`] - a from/to interval along the web where a gun dispenses
//! - [`Profile`] / [`ProfileStore`] - named configuration snapshots persisted as JSON
//!
//! Every type here is plain owned data. `Clone` produces a fully independent deep
//! copy, which is how a configuration crosses a persistence or load boundary.
//!
//! # Example
//!
//! ```rust
//! use glue_model::{ControllerConfig, GlueZone};
//!
//! let mut config = ControllerConfig::default();
//! config.gun_mut(2).unwrap().push_zone(GlueZone::new(0.0, 100.0, 0.0));
//!
//! let snapshot = config.clone();
//! config.gun_mut(2).unwrap().clear_zones();
//! assert_eq!(snapshot.gun(2).unwrap().zones().len(), 1);
//! ```

mod config;
mod error;
mod profile;

pub use config::*;
pub use error::*;
pub use profile::*;
