//! Messages received from the controller.
//!
//! The only structured inbound message is the calibration result. Anything
//! else, including documents that fail to parse, is kept as opaque status text.

use crate::constants::{CALIBRATION_LENGTH_SCALE, MSG_CALIBRATION_RESULT};
use crate::error::{ProtocolError, ProtocolResult};
use serde_json::Value;

/// A decoded inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Encoder pulses counted over one calibration page.
    CalibrationResult {
        /// Pulse count reported by the controller.
        pulses_per_page: i64,
    },

    /// Any other payload, as text.
    Status(String),
}

impl Message {
    /// Decode an inbound frame payload.
    ///
    /// Never fails: payloads that are not a well-formed calibration result
    /// degrade to [`Message::Status`] carrying the raw text.
    pub fn decode(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        if !text.contains(MSG_CALIBRATION_RESULT) {
            return Message::Status(text.into_owned());
        }

        match parse_calibration_result(&text) {
            Ok(pulses_per_page) => Message::CalibrationResult { pulses_per_page },
            Err(e) => {
                log::debug!("unparsable calibration result ({}): {}", e, text);
                Message::Status(text.into_owned())
            }
        }
    }
}

fn parse_calibration_result(text: &str) -> ProtocolResult<i64> {
    let document: Value = serde_json::from_str(text)?;
    document
        .get("pulsesPerPage")
        .and_then(Value::as_i64)
        .ok_or(ProtocolError::MissingField("pulsesPerPage"))
}

/// Convert a calibration pulse count into pulses per millimeter.
///
/// `page_length` is the length passed to the `calibrate` request that
/// produced this count.
pub fn pulses_per_mm(pulses_per_page: i64, page_length: u32) -> f64 {
    pulses_per_page as f64 / (f64::from(page_length) * CALIBRATION_LENGTH_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_calibration_result() {
        let msg = Message::decode(br#"{"type":"calibration_result","pulsesPerPage":5000}"#);
        assert_eq!(msg, Message::CalibrationResult { pulses_per_page: 5000 });
    }

    #[test]
    fn test_decode_plain_status() {
        let msg = Message::decode(b"READY");
        assert_eq!(msg, Message::Status("READY".to_string()));

        let msg = Message::decode(br#"{"type":"status","state":"idle"}"#);
        assert_eq!(
            msg,
            Message::Status(r#"{"type":"status","state":"idle"}"#.to_string())
        );
    }

    #[test]
    fn test_malformed_calibration_degrades_to_status() {
        let raw = r#"{"type":"calibration_result","pulsesPerPage":"lots"}"#;
        assert_eq!(Message::decode(raw.as_bytes()), Message::Status(raw.to_string()));

        let raw = "calibration_result 5000";
        assert_eq!(Message::decode(raw.as_bytes()), Message::Status(raw.to_string()));

        let raw = r#"{"type":"calibration_result","pulsesPerPage":12.5}"#;
        assert_eq!(Message::decode(raw.as_bytes()), Message::Status(raw.to_string()));
    }

    #[test]
    fn test_non_utf8_payload_is_lossy_status() {
        match Message::decode(&[0xFF, b'o', b'k']) {
            Message::Status(text) => assert!(text.ends_with("ok")),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_pulses_per_mm_scaling_is_pinned() {
        // Page length 1000 with 5000 pulses: 5000 / (1000 * 10.0).
        assert_eq!(pulses_per_mm(5000, 1000), 0.5);
        assert_eq!(pulses_per_mm(12_000, 30), 40.0);
    }
}
