//! Request header parsing.

use super::codec::{DecodeError, Decoder};
use bytes::Bytes;

/// Size of the fixed header fields every request starts with.
pub const REQUEST_HEADER_SIZE: usize = 8;

/// Fixed request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
}

/// A framed request: fixed header plus the api-specific payload.
///
/// The payload starts at the client id and is left undecoded until a
/// handler needs it.
#[derive(Debug, Clone)]
pub struct Request {
    pub header: RequestHeader,
    pub payload: Bytes,
}

impl Request {
    /// Parse a frame body (length prefix already removed).
    pub fn parse(mut frame: Bytes) -> Result<Self, DecodeError> {
        let mut d = Decoder::new(&frame);
        let header = RequestHeader {
            api_key: d.read_i16()?,
            api_version: d.read_i16()?,
            correlation_id: d.read_i32()?,
        };

        let payload = frame.split_off(REQUEST_HEADER_SIZE);
        Ok(Request { header, payload })
    }
}
