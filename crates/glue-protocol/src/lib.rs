//! Glue Controller Serial Protocol
//!
//! This crate provides types and utilities for talking to the glue dispensing
//! controller over its serial link. Messages are JSON text wrapped in STX/ETX
//! framing markers.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → controller): `controller_setup`, `calibrate`, `test`,
//!   `heartbeat`, each a JSON object with a `type` tag
//! - **Messages** (controller → host): calibration results carrying
//!   `pulsesPerPage`; anything else is treated as status text
//!
//! There is no acknowledgement or retry at this layer. Delivery is at most once.
//!
//! # Example
//!
//! ```rust
//! use glue_protocol::{Command, CommandProtocol, FrameCodec, Inbound};
//!
//! let mut protocol = CommandProtocol::default();
//! let frame = protocol.encode(&Command::Calibrate { page_length: 1000 }).unwrap();
//!
//! let mut codec = FrameCodec::new();
//! let payloads: Vec<Vec<u8>> = codec.feed(&frame).collect();
//! assert_eq!(payloads.len(), 1);
//!
//! let reply = br#"{"type":"calibration_result","pulsesPerPage":5000}"#;
//! assert!(matches!(protocol.decode(reply), Inbound::Calibration(_)));
//! ```

mod commands;
mod constants;
mod error;
mod frame;
mod protocol;
mod responses;

pub use commands::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use protocol::*;
pub use responses::*;
