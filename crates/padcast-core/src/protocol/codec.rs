//! Binary codec for PadCast datagrams.
//!
//! Wire format (little-endian, 27 bytes):
//! ```text
//! [version:1][client_id:4][sequence:2][buttons:2][lt:1][rt:1]
//! [lx:2][ly:2][rx:2][ry:2][timestamp_ns:8]
//! ```
//!
//! A datagram may carry trailing bytes after the fixed record (padded frames
//! happen in the wild); they are ignored up to [`MAX_PACKET_SIZE`], beyond
//! which the frame is rejected outright as garbage.

use thiserror::Error;

use crate::protocol::state::{PadState, MAX_PACKET_SIZE, MIN_PACKET_SIZE, PROTOCOL_VERSION};

/// Errors that can occur while decoding a datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The datagram length is outside the accepted range.  Defends against
    /// both truncated frames and oversized attack frames before any field is
    /// parsed.
    #[error("datagram size {len} outside accepted range {min}..={max}")]
    Size { len: usize, min: usize, max: usize },

    /// The version byte is not the supported protocol version.  Unrecognised
    /// versions are rejected, never best-effort decoded.
    #[error("unsupported protocol version: {0}")]
    Version(u8),
}

/// Encodes a [`PadState`] into its fixed-length wire representation.
///
/// Deterministic: the same state always produces the same bytes.
pub fn encode(state: &PadState) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MIN_PACKET_SIZE);
    buf.push(state.version);
    buf.extend_from_slice(&state.client_id.to_le_bytes());
    buf.extend_from_slice(&state.sequence.to_le_bytes());
    buf.extend_from_slice(&state.buttons.to_le_bytes());
    buf.push(state.left_trigger);
    buf.push(state.right_trigger);
    buf.extend_from_slice(&state.left_x.to_le_bytes());
    buf.extend_from_slice(&state.left_y.to_le_bytes());
    buf.extend_from_slice(&state.right_x.to_le_bytes());
    buf.extend_from_slice(&state.right_y.to_le_bytes());
    buf.extend_from_slice(&state.timestamp_ns.to_le_bytes());
    buf
}

/// Decodes one [`PadState`] from the beginning of `bytes`.
///
/// # Errors
///
/// Returns [`WireError::Size`] if the length is outside
/// `MIN_PACKET_SIZE..=MAX_PACKET_SIZE`, or [`WireError::Version`] if the
/// version byte differs from [`PROTOCOL_VERSION`].
pub fn decode(bytes: &[u8]) -> Result<PadState, WireError> {
    if bytes.len() < MIN_PACKET_SIZE || bytes.len() > MAX_PACKET_SIZE {
        return Err(WireError::Size {
            len: bytes.len(),
            min: MIN_PACKET_SIZE,
            max: MAX_PACKET_SIZE,
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(WireError::Version(version));
    }

    // Field widths below enforce the declared value ranges: every field is
    // read into a type exactly as wide as its wire slot, so no out-of-range
    // value can survive decoding.
    Ok(PadState {
        version,
        client_id: u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
        sequence: u16::from_le_bytes([bytes[5], bytes[6]]),
        buttons: u16::from_le_bytes([bytes[7], bytes[8]]),
        left_trigger: bytes[9],
        right_trigger: bytes[10],
        left_x: i16::from_le_bytes([bytes[11], bytes[12]]),
        left_y: i16::from_le_bytes([bytes[13], bytes[14]]),
        right_x: i16::from_le_bytes([bytes[15], bytes[16]]),
        right_y: i16::from_le_bytes([bytes[17], bytes[18]]),
        timestamp_ns: u64::from_le_bytes([
            bytes[19], bytes[20], bytes[21], bytes[22], bytes[23], bytes[24], bytes[25], bytes[26],
        ]),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
