//! Frame encoding/decoding utilities.
//!
//! Every message on the serial link is wrapped in a start and an end marker:
//!
//! ```text
//! +------+-------------------+------+
//! | 0x02 | payload[0..n]     | 0x03 |
//! +------+-------------------+------+
//! ```
//!
//! The payload is markerless text (JSON), so no escaping is performed. The
//! decoder is incremental and tolerates arbitrary chunking of the input.

use crate::constants::{FRAME_END, FRAME_START, MAX_PAYLOAD_LEN};
use crate::error::{ProtocolError, ProtocolResult};
use bytes::{Buf, BytesMut};

/// Incremental decoder and stateless encoder for marker-delimited frames.
///
/// Decoding rules:
/// - A start marker discards any in-progress payload and opens a new frame.
/// - An end marker inside a frame emits the payload if it is non-empty and
///   closes the frame.
/// - Any other byte inside a frame is appended to the payload.
/// - Bytes outside a frame are dropped.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Received bytes not yet scanned.
    input: BytesMut,
    /// Payload of the frame currently being received.
    payload: BytesMut,
    /// Whether a start marker has been seen since the last end marker.
    in_frame: bool,
}

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        FrameCodec::default()
    }

    /// Add received data to the input buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.input.extend_from_slice(data);
    }

    /// Push `data` and iterate over the frames completed so far.
    ///
    /// The iterator is lazy. Input it has not scanned yet stays buffered and is
    /// picked up by the next call to [`decode`](Self::decode) or `feed`.
    pub fn feed(&mut self, data: &[u8]) -> Frames<'_> {
        self.push(data);
        Frames { codec: self }
    }

    /// Scan buffered input up to the next completed frame.
    ///
    /// Returns `Some(payload)` when a frame completes, or `None` once all
    /// buffered input has been consumed.
    pub fn decode(&mut self) -> Option<Vec<u8>> {
        while self.input.has_remaining() {
            let byte = self.input.get_u8();
            match byte {
                FRAME_START => {
                    if !self.payload.is_empty() {
                        log::trace!("discarding {} byte partial frame", self.payload.len());
                    }
                    self.payload.clear();
                    self.in_frame = true;
                }
                FRAME_END if self.in_frame => {
                    self.in_frame = false;
                    if !self.payload.is_empty() {
                        let frame = self.payload.split().to_vec();
                        log::trace!("decoded {} byte frame", frame.len());
                        return Some(frame);
                    }
                }
                _ if self.in_frame => {
                    if self.payload.len() >= MAX_PAYLOAD_LEN {
                        log::trace!("frame exceeds {} bytes, dropping", MAX_PAYLOAD_LEN);
                        self.payload.clear();
                        self.in_frame = false;
                        continue;
                    }
                    self.payload.extend_from_slice(&[byte]);
                }
                _ => {}
            }
        }
        None
    }

    /// Wrap a payload in start and end markers for transmission.
    ///
    /// Fails if the payload itself contains a marker byte.
    pub fn encode(payload: &[u8]) -> ProtocolResult<Vec<u8>> {
        if let Some(offset) = payload
            .iter()
            .position(|&b| b == FRAME_START || b == FRAME_END)
        {
            return Err(ProtocolError::PayloadContainsMarker {
                byte: payload[offset],
                offset,
            });
        }

        let mut buf = Vec::with_capacity(payload.len() + 2);
        buf.push(FRAME_START);
        buf.extend_from_slice(payload);
        buf.push(FRAME_END);
        Ok(buf)
    }

    /// Whether a start marker has been seen without its end marker.
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Number of bytes buffered (unscanned input plus partial payload).
    pub fn buffered_len(&self) -> usize {
        self.input.len() + self.payload.len()
    }

    /// Drop all buffered input and any partial frame.
    pub fn reset(&mut self) {
        self.input.clear();
        self.payload.clear();
        self.in_frame = false;
    }
}

/// Lazy iterator over frames completed by a [`FrameCodec::feed`] call.
#[derive(Debug)]
pub struct Frames<'a> {
    codec: &'a mut FrameCodec,
}

impl Iterator for Frames<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.codec.decode()
    }
}
