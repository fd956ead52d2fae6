//! Protocol constants.

// ============================================================================
// Framing
// ============================================================================

/// Start-of-frame marker (ASCII STX).
pub const FRAME_START: u8 = 0x02;

/// End-of-frame marker (ASCII ETX).
pub const FRAME_END: u8 = 0x03;

/// Largest payload the decoder accumulates before treating the frame as noise.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;

// ============================================================================
// Link parameters
// ============================================================================

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Bound on a single synchronous write, in milliseconds.
pub const WRITE_TIMEOUT_MS: u64 = 500;

// ============================================================================
// Calibration
// ============================================================================

/// Page length used when no calibration has been requested yet.
pub const DEFAULT_CALIBRATION_PAGE_LENGTH: u32 = 1000;

/// Factor applied to the requested page length before dividing the pulse count.
///
/// `pulses_per_mm = pulses_per_page / (page_length * CALIBRATION_LENGTH_SCALE)`.
/// The page length is entered in centimeters while the result is per millimeter.
pub const CALIBRATION_LENGTH_SCALE: f64 = 10.0;

// ============================================================================
// Message type tags
// ============================================================================

/// Full configuration upload.
pub const MSG_CONTROLLER_SETUP: &str = "controller_setup";

/// Encoder calibration request.
pub const MSG_CALIBRATE: &str = "calibrate";

/// Single gun test toggle.
pub const MSG_TEST: &str = "test";

/// Liveness probe.
pub const MSG_HEARTBEAT: &str = "heartbeat";

/// Calibration result reported by the controller.
pub const MSG_CALIBRATION_RESULT: &str = "calibration_result";
