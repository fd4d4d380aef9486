//! ApiVersions (key 18).
//!
//! Every in-range version gets the flexible (v3+) body layout:
//!
//! ```text
//! correlation_id  int32
//! error_code      int16
//! api_keys        compact array of { api_key int16, min int16, max int16, tagged fields }
//! throttle_time   int32
//! tagged fields
//! ```

use super::error_response;
use crate::protocol::{ApiKey, ErrorCode, KafkaBufMut, RequestHeader, SUPPORTED_APIS};
use bytes::{BufMut, BytesMut};
use tracing::warn;

/// One entry in the advertised api list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

impl From<ApiKey> for ApiVersion {
    fn from(key: ApiKey) -> Self {
        let (min_version, max_version) = key.version_range();
        ApiVersion {
            api_key: key as i16,
            min_version,
            max_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionsResponse {
    pub correlation_id: i32,
    pub error_code: ErrorCode,
    pub api_keys: Vec<ApiVersion>,
    pub throttle_time_ms: i32,
}

impl ApiVersionsResponse {
    /// Successful response advertising every supported api.
    pub fn supported(correlation_id: i32) -> Self {
        ApiVersionsResponse {
            correlation_id,
            error_code: ErrorCode::None,
            api_keys: SUPPORTED_APIS.iter().copied().map(ApiVersion::from).collect(),
            throttle_time_ms: 0,
        }
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(14 + self.api_keys.len() * 7);
        buf.put_i32(self.correlation_id);
        buf.put_i16(self.error_code.code());
        buf.put_compact_array_len(self.api_keys.len());
        for api in &self.api_keys {
            buf.put_i16(api.api_key);
            buf.put_i16(api.min_version);
            buf.put_i16(api.max_version);
            buf.put_empty_tagged_fields();
        }
        buf.put_i32(self.throttle_time_ms);
        buf.put_empty_tagged_fields();
        buf
    }
}

/// Build the ApiVersions response for `header`.
///
/// The request body is not needed to answer, so it is never decoded.
pub fn handle(header: &RequestHeader) -> BytesMut {
    if !ApiKey::ApiVersions.supports(header.api_version) {
        warn!(
            api_version = header.api_version,
            correlation_id = header.correlation_id,
            "Unsupported ApiVersions version"
        );
        return error_response(header.correlation_id, ErrorCode::UnsupportedVersion);
    }

    ApiVersionsResponse::supported(header.correlation_id).encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Decoder;

    fn header(api_version: i16, correlation_id: i32) -> RequestHeader {
        RequestHeader {
            api_key: 18,
            api_version,
            correlation_id,
        }
    }

    #[test]
    fn test_v4_response_bytes() {
        let response = handle(&header(4, 7));
        assert_eq!(
            &response[..],
            &[
                0x00, 0x00, 0x00, 0x07, // correlation id
                0x00, 0x00, // error code
                0x03, // 2 entries
                0x00, 0x12, 0x00, 0x00, 0x00, 0x04, 0x00, // ApiVersions 0..=4
                0x00, 0x4b, 0x00, 0x00, 0x00, 0x00, 0x00, // DescribeTopicPartitions 0..=0
                0x00, 0x00, 0x00, 0x00, // throttle time
                0x00, // tagged fields
            ]
        );
    }

    #[test]
    fn test_every_supported_version_advertises_api_versions() {
        for version in 0..=4 {
            let response = handle(&header(version, 1234));
            let mut d = Decoder::new(&response);
            assert_eq!(d.read_i32().unwrap(), 1234);
            assert_eq!(d.read_i16().unwrap(), 0);

            let count = d.read_compact_array_len().unwrap().unwrap();
            let mut found = false;
            for _ in 0..count {
                let key = d.read_i16().unwrap();
                let _min = d.read_i16().unwrap();
                let max = d.read_i16().unwrap();
                d.skip_tagged_fields().unwrap();
                if key == 18 {
                    assert!(max >= 4);
                    found = true;
                }
            }
            assert!(found, "v{} response is missing key 18", version);
        }
    }

    #[test]
    fn test_unsupported_version() {
        for version in [-1, 5, 42] {
            let response = handle(&header(version, 0x0102_0304));
            assert_eq!(&response[..], &[0x01, 0x02, 0x03, 0x04, 0x00, 0x23]);
        }
    }
}
