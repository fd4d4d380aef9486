//! Length-prefixed framing.
//!
//! ```text
//! ┌─────────────────┬────────────────────────────────┐
//! │  Length (4B)    │  Request or response           │
//! │   big-endian    │  (Length bytes)                │
//! └─────────────────┴────────────────────────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Size of the length prefix.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default upper bound on a frame body (100 MiB, as Kafka's default).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Framing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Declared length exceeds the configured maximum
    TooLarge { length: usize, max: usize },
    /// Connection closed part-way through a frame
    Truncated { buffered: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooLarge { length, max } => {
                write!(f, "Frame too large: {} bytes (max {})", length, max)
            }
            FrameError::Truncated { buffered } => {
                write!(f, "Connection closed with {} bytes of partial frame", buffered)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Split one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` while the frame is still incomplete. The returned
/// bytes exclude the length prefix.
pub fn read_frame(buf: &mut BytesMut, max_frame_size: usize) -> Result<Option<Bytes>, FrameError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    // Peek without consuming
    let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if length > max_frame_size {
        return Err(FrameError::TooLarge {
            length,
            max: max_frame_size,
        });
    }

    // The buffer grows with bytes actually received, never with the
    // declared length
    if buf.len() < FRAME_HEADER_SIZE + length {
        return Ok(None);
    }

    buf.advance(FRAME_HEADER_SIZE);
    Ok(Some(buf.split_to(length).freeze()))
}

/// Append `message` to `buf` with its length prefix.
pub fn write_frame(buf: &mut BytesMut, message: &[u8]) {
    buf.reserve(FRAME_HEADER_SIZE + message.len());
    buf.put_u32(message.len() as u32);
    buf.put_slice(message);
}
