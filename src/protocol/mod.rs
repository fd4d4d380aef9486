//! Kafka wire protocol subset.
//!
//! Only what the two supported APIs need:
//! - `frame`: int32 length-prefixed framing
//! - `codec`: fixed-width ints, varints, compact/nullable strings, tagged fields
//! - `request`: the fixed request header (api key, api version, correlation id)
//!
//! Reference: <https://kafka.apache.org/protocol.html>

pub mod codec;
pub mod frame;
pub mod request;

pub use codec::{DecodeError, Decoder, KafkaBufMut};
pub use frame::FrameError;
pub use request::{Request, RequestHeader};

/// API keys this server knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum ApiKey {
    ApiVersions = 18,
    DescribeTopicPartitions = 75,
}

impl ApiKey {
    pub fn from_i16(key: i16) -> Option<Self> {
        match key {
            18 => Some(ApiKey::ApiVersions),
            75 => Some(ApiKey::DescribeTopicPartitions),
            _ => None,
        }
    }

    /// Inclusive version range advertised in ApiVersions.
    pub fn version_range(self) -> (i16, i16) {
        match self {
            ApiKey::ApiVersions => (0, 4),
            ApiKey::DescribeTopicPartitions => (0, 0),
        }
    }

    pub fn supports(self, version: i16) -> bool {
        let (min, max) = self.version_range();
        (min..=max).contains(&version)
    }
}

/// Versions an unknown api key may use and still get a bare success reply.
pub const FALLBACK_VERSIONS: (i16, i16) = (0, 4);

/// Every supported API, in the order ApiVersions lists them.
pub const SUPPORTED_APIS: [ApiKey; 2] = [ApiKey::ApiVersions, ApiKey::DescribeTopicPartitions];

/// Protocol error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum ErrorCode {
    None = 0,
    UnknownTopicOrPartition = 3,
    UnsupportedVersion = 35,
}

impl ErrorCode {
    pub fn code(self) -> i16 {
        self as i16
    }
}
