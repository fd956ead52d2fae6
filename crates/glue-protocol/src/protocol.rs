//! Stateful command encoding and inbound decoding for one session.

use crate::commands::Command;
use crate::constants::DEFAULT_CALIBRATION_PAGE_LENGTH;
use crate::error::ProtocolResult;
use crate::frame::FrameCodec;
use crate::responses::{pulses_per_mm, Message};

/// A completed calibration run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    /// Pulses counted over the page.
    pub pulses_per_page: i64,
    /// Page length of the request the count answers.
    pub page_length: u32,
    /// Derived encoder constant.
    pub pulses_per_mm: f64,
}

/// An inbound payload decoded in the context of the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Calibration finished.
    Calibration(CalibrationResult),
    /// Anything else, as text.
    Status(String),
}

/// Builds outbound frames and interprets inbound payloads.
///
/// Remembers the page length of the most recent `calibrate` request so a later
/// calibration result can be converted to pulses per millimeter.
#[derive(Debug, Clone)]
pub struct CommandProtocol {
    page_length: u32,
}

impl Default for CommandProtocol {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION_PAGE_LENGTH)
    }
}

impl CommandProtocol {
    /// Create a protocol that assumes `page_length` until a calibration is requested.
    pub fn new(page_length: u32) -> Self {
        CommandProtocol { page_length }
    }

    /// Page length used to interpret the next calibration result.
    pub fn page_length(&self) -> u32 {
        self.page_length
    }

    /// Serialize and frame a command for transmission.
    pub fn encode(&mut self, command: &Command) -> ProtocolResult<Vec<u8>> {
        let payload = command.to_payload()?;
        let frame = FrameCodec::encode(payload.as_bytes())?;
        if let Command::Calibrate { page_length } = command {
            self.page_length = *page_length;
        }
        log::trace!("encoded {} ({} bytes)", command.type_tag(), frame.len());
        Ok(frame)
    }

    /// Interpret an inbound frame payload.
    pub fn decode(&self, payload: &[u8]) -> Inbound {
        match Message::decode(payload) {
            Message::CalibrationResult { pulses_per_page } => {
                Inbound::Calibration(CalibrationResult {
                    pulses_per_page,
                    page_length: self.page_length,
                    pulses_per_mm: pulses_per_mm(pulses_per_page, self.page_length),
                })
            }
            Message::Status(text) => Inbound::Status(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{FRAME_END, FRAME_START};
    use crate::error::ProtocolError;

    #[test]
    fn test_encode_frames_payload() {
        let mut protocol = CommandProtocol::default();
        let frame = protocol.encode(&Command::Heartbeat).unwrap();
        assert_eq!(frame.first(), Some(&FRAME_START));
        assert_eq!(frame.last(), Some(&FRAME_END));
        assert_eq!(&frame[1..frame.len() - 1], br#"{"type":"heartbeat"}"#);
    }

    #[test]
    fn test_calibrate_updates_page_length() {
        let mut protocol = CommandProtocol::new(1000);
        protocol
            .encode(&Command::Calibrate { page_length: 250 })
            .unwrap();
        assert_eq!(protocol.page_length(), 250);

        let inbound = protocol.decode(br#"{"type":"calibration_result","pulsesPerPage":5000}"#);
        assert_eq!(
            inbound,
            Inbound::Calibration(CalibrationResult {
                pulses_per_page: 5000,
                page_length: 250,
                pulses_per_mm: 2.0,
            })
        );
    }

    #[test]
    fn test_rejected_calibrate_keeps_previous_length() {
        let mut protocol = CommandProtocol::new(1000);
        assert_eq!(
            protocol.encode(&Command::Calibrate { page_length: 0 }),
            Err(ProtocolError::InvalidPageLength)
        );
        assert_eq!(protocol.page_length(), 1000);
    }

    #[test]
    fn test_calibration_with_default_length() {
        let protocol = CommandProtocol::new(1000);
        match protocol.decode(br#"{"type":"calibration_result","pulsesPerPage":5000}"#) {
            Inbound::Calibration(result) => assert_eq!(result.pulses_per_mm, 0.5),
            other => panic!("unexpected inbound: {:?}", other),
        }
    }

    #[test]
    fn test_decode_status() {
        let protocol = CommandProtocol::default();
        assert_eq!(
            protocol.decode(b"Gun 2 fault"),
            Inbound::Status("Gun 2 fault".to_string())
        );
    }
}
