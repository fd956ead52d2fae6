//! Glue Controller Session Runner
//!
//! Serial transport and session orchestration for the glue dispensing
//! controller, plus the `gluectl` command-line tool.
//!
//! - [`Transport`] owns the serial link and publishes [`TransportEvent`]s from
//!   a background reader
//! - [`SessionController`] applies those events to a [`SessionState`] and guards
//!   every outbound command behind a connected check
//! - [`SessionSettings`] is the YAML settings file
//!
//! # Example
//!
//! ```rust
//! use glue_runner::{MemoryConnector, SessionController, Transport};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let connector = MemoryConnector::new();
//! let device = connector.add_port("ttyS0");
//! let (transport, events) = Transport::new(Arc::new(connector), Duration::from_millis(1));
//! let mut session = SessionController::new(transport, events, None);
//!
//! session.connect_to("ttyS0");
//! assert!(session.state().connected);
//!
//! session.send_heartbeat();
//! assert_eq!(device.take_written(), b"\x02{\"type\":\"heartbeat\"}\x03");
//! ```

mod error;
mod link;
mod memory;
mod session;
mod settings;
mod transport;

pub use error::*;
pub use link::*;
pub use memory::*;
pub use session::*;
pub use settings::*;
pub use transport::*;
