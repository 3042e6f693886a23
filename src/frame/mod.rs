pub mod location;

use thiserror::Error;

pub use location::{resolve_location, UNKNOWN_LOCATION};

// ---------------------------------------------------------------------------
// Wire format
//
// A device reports one reading as a fixed 5-byte frame, with no delimiter
// other than the fixed length:
//
//   [0] start marker (STX, 0x02)
//   [1] location code (ASCII)
//   [2] value low byte
//   [3] value high byte
//   [4] end marker (ETX by convention, only its presence is checked)
// ---------------------------------------------------------------------------

pub const FRAME_LEN: usize = 5;
pub const START_MARKER: u8 = 0x02;
pub const END_MARKER: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    pub location_code: u8,
    pub location_label: &'static str,
    pub value: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("bad start marker: expected {expected:#04x}, found {found:#04x}")]
    BadStartMarker { expected: u8, found: u8 },
    #[error("frame must be exactly 5 bytes, got {len}")]
    ShortFrame { len: usize },
}

/// Decode one complete window.
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Result<DecodedFrame, FrameError> {
    if frame[0] != START_MARKER {
        return Err(FrameError::BadStartMarker {
            expected: START_MARKER,
            found: frame[0],
        });
    }

    Ok(DecodedFrame {
        location_code: frame[1],
        location_label: resolve_location(frame[1]),
        value: u16::from_le_bytes([frame[2], frame[3]]),
    })
}

/// Slice variant of [`decode_frame`] for callers holding a `&[u8]`.
pub fn decode_slice(bytes: &[u8]) -> Result<DecodedFrame, FrameError> {
    let frame: &[u8; FRAME_LEN] = bytes
        .try_into()
        .map_err(|_| FrameError::ShortFrame { len: bytes.len() })?;
    decode_frame(frame)
}

/// Build the frame a device would send for `(location_code, value)`.
pub fn encode_frame(location_code: u8, value: u16) -> [u8; FRAME_LEN] {
    let [lo, hi] = value.to_le_bytes();
    [START_MARKER, location_code, lo, hi, END_MARKER]
}

// ---------------------------------------------------------------------------
// Stream accumulator
// ---------------------------------------------------------------------------

/// What to do with a full window whose first byte is not [`START_MARKER`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Drop all buffered bytes and start a fresh window. A single byte lost on
    /// the wire keeps every later window misaligned until bytes happen to line
    /// up again.
    #[default]
    DiscardWindow,
    /// Drop bytes up to the next start marker already in the buffer and keep
    /// accumulating from there.
    ScanForStart,
}

/// Byte-at-a-time frame accumulator for an unframed serial stream.
///
/// The buffer never grows past `expected_len`: every full window is either
/// decoded or discarded before the next byte is accepted.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buffered: Vec<u8>,
    expected_len: usize,
    policy: SyncPolicy,
    decoded: u64,
    discarded: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(SyncPolicy::default())
    }
}

impl FrameDecoder {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            buffered: Vec::with_capacity(FRAME_LEN),
            expected_len: FRAME_LEN,
            policy,
            decoded: 0,
            discarded: 0,
        }
    }

    /// Push one byte. Returns a reading once a full, valid window is buffered.
    pub fn feed(&mut self, byte: u8) -> Option<DecodedFrame> {
        self.buffered.push(byte);
        if self.buffered.len() < self.expected_len {
            return None;
        }

        let mut window = [0u8; FRAME_LEN];
        window.copy_from_slice(&self.buffered[..FRAME_LEN]);

        match decode_frame(&window) {
            Ok(frame) => {
                self.buffered.clear();
                self.decoded += 1;
                Some(frame)
            }
            Err(e) => {
                self.discarded += 1;
                tracing::debug!(error = %e, policy = ?self.policy, "Discarding frame window");
                match self.policy {
                    SyncPolicy::DiscardWindow => self.buffered.clear(),
                    SyncPolicy::ScanForStart => {
                        let keep_from = self.buffered[1..]
                            .iter()
                            .position(|b| *b == START_MARKER)
                            .map(|i| i + 1)
                            .unwrap_or(self.buffered.len());
                        self.buffered.drain(..keep_from);
                    }
                }
                None
            }
        }
    }

    /// Push a chunk, collecting every reading it completes.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<DecodedFrame> {
        bytes.iter().filter_map(|b| self.feed(*b)).collect()
    }

    /// Bytes waiting for the current window to fill.
    pub fn pending(&self) -> usize {
        self.buffered.len()
    }

    pub fn decoded_count(&self) -> u64 {
        self.decoded
    }

    pub fn discarded_count(&self) -> u64 {
        self.discarded
    }
}
