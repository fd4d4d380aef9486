//! Request dispatch.
//!
//! Routes a parsed [`Request`] to the handler for its api key and returns
//! the encoded response (without the length prefix).
//!
//! ## Handlers
//! - `api_versions`: advertises the supported api keys and version ranges
//! - `describe_topic_partitions`: reports every topic as unknown

pub mod api_versions;
pub mod describe_topic_partitions;

use crate::protocol::{ApiKey, DecodeError, ErrorCode, Request, FALLBACK_VERSIONS};
use bytes::{BufMut, BytesMut};
use tracing::{debug, warn};

/// Minimal response: correlation id followed by an error code.
pub fn error_response(correlation_id: i32, error_code: ErrorCode) -> BytesMut {
    let mut buf = BytesMut::with_capacity(6);
    buf.put_i32(correlation_id);
    buf.put_i16(error_code.code());
    buf
}

/// Produce the response for `request`.
///
/// Fails only when the payload cannot be decoded.
pub fn dispatch(request: &Request) -> Result<BytesMut, DecodeError> {
    let header = &request.header;

    match ApiKey::from_i16(header.api_key) {
        Some(ApiKey::ApiVersions) => Ok(api_versions::handle(header)),
        Some(key) if !key.supports(header.api_version) => {
            warn!(
                api_key = header.api_key,
                api_version = header.api_version,
                "Unsupported api version"
            );
            Ok(error_response(
                header.correlation_id,
                ErrorCode::UnsupportedVersion,
            ))
        }
        Some(ApiKey::DescribeTopicPartitions) => describe_topic_partitions::handle(request),
        None => {
            let (min, max) = FALLBACK_VERSIONS;
            let error_code = if (min..=max).contains(&header.api_version) {
                ErrorCode::None
            } else {
                ErrorCode::UnsupportedVersion
            };
            debug!(
                api_key = header.api_key,
                api_version = header.api_version,
                error_code = error_code.code(),
                "Unknown api key, sending bare response"
            );
            Ok(error_response(header.correlation_id, error_code))
        }
    }
}
