//! DescribeTopicPartitions (key 75).
//!
//! There is no topic metadata behind this server, so every requested topic
//! is answered with UNKNOWN_TOPIC_OR_PARTITION.

use crate::protocol::{DecodeError, Decoder, ErrorCode, KafkaBufMut, Request};
use bytes::{BufMut, BytesMut};
use tracing::trace;

/// Authorized-operations bitmask reported for every topic.
pub const TOPIC_AUTHORIZED_OPERATIONS: i32 = 0x0000_0df8;

/// Marker byte for a null cursor.
const NULL_CURSOR: i8 = -1;

/// Pagination cursor (request and response share the layout)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub topic_name: String,
    pub partition_index: i32,
}

impl Cursor {
    fn decode(d: &mut Decoder<'_>) -> Result<Option<Self>, DecodeError> {
        match d.read_i8()? {
            NULL_CURSOR => Ok(None),
            1 => {
                let topic_name = d.read_compact_string("cursor.topic_name")?;
                let partition_index = d.read_i32()?;
                d.skip_tagged_fields()?;
                Ok(Some(Cursor {
                    topic_name,
                    partition_index,
                }))
            }
            marker => Err(DecodeError::InvalidMarker(marker)),
        }
    }

    fn encode(cursor: Option<&Self>, buf: &mut BytesMut) {
        match cursor {
            None => buf.put_i8(NULL_CURSOR),
            Some(cursor) => {
                buf.put_i8(1);
                buf.put_compact_string(&cursor.topic_name);
                buf.put_i32(cursor.partition_index);
                buf.put_empty_tagged_fields();
            }
        }
    }
}

/// Decoded request payload (client id onwards)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeTopicPartitionsRequest {
    pub client_id: Option<String>,
    pub topics: Vec<String>,
    pub response_partition_limit: i32,
    pub cursor: Option<Cursor>,
}

impl DescribeTopicPartitionsRequest {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut d = Decoder::new(payload);

        // Rest of request header v2
        let client_id = d.read_nullable_string()?;
        d.skip_tagged_fields()?;

        let count = d
            .read_compact_array_len()?
            .ok_or(DecodeError::UnexpectedNull("topics"))?;
        let mut topics = Vec::with_capacity(count);
        for _ in 0..count {
            topics.push(d.read_compact_string("topics.name")?);
            d.skip_tagged_fields()?;
        }

        let response_partition_limit = d.read_i32()?;
        let cursor = Cursor::decode(&mut d)?;

        // Some clients stop before the trailing tagged fields
        if !d.is_empty() {
            d.skip_tagged_fields()?;
        }

        Ok(DescribeTopicPartitionsRequest {
            client_id,
            topics,
            response_partition_limit,
            cursor,
        })
    }
}

/// One entry of the response topic array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescription {
    pub error_code: ErrorCode,
    pub name: String,
    pub topic_id: [u8; 16],
    pub is_internal: bool,
    pub authorized_operations: i32,
}

impl TopicDescription {
    pub fn unknown(name: String) -> Self {
        TopicDescription {
            error_code: ErrorCode::UnknownTopicOrPartition,
            name,
            topic_id: [0; 16],
            is_internal: false,
            authorized_operations: TOPIC_AUTHORIZED_OPERATIONS,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i16(self.error_code.code());
        buf.put_compact_string(&self.name);
        buf.put_slice(&self.topic_id);
        buf.put_u8(u8::from(self.is_internal));
        // No partitions are ever known
        buf.put_compact_array_len(0);
        buf.put_i32(self.authorized_operations);
        buf.put_empty_tagged_fields();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeTopicPartitionsResponse {
    pub correlation_id: i32,
    pub throttle_time_ms: i32,
    pub topics: Vec<TopicDescription>,
    pub next_cursor: Option<Cursor>,
}

impl DescribeTopicPartitionsResponse {
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(
            12 + self.topics.iter().map(|t| 30 + t.name.len()).sum::<usize>(),
        );

        // Response header v1
        buf.put_i32(self.correlation_id);
        buf.put_empty_tagged_fields();

        buf.put_i32(self.throttle_time_ms);
        buf.put_compact_array_len(self.topics.len());
        for topic in &self.topics {
            topic.encode(&mut buf);
        }
        Cursor::encode(self.next_cursor.as_ref(), &mut buf);
        buf.put_empty_tagged_fields();
        buf
    }
}

/// Answer a DescribeTopicPartitions request.
///
/// Topics come back in request order. A payload that fails to decode is an
/// error; the caller drops the connection.
pub fn handle(request: &Request) -> Result<BytesMut, DecodeError> {
    let decoded = DescribeTopicPartitionsRequest::decode(&request.payload)?;
    trace!(
        client_id = ?decoded.client_id,
        topics = ?decoded.topics,
        partition_limit = decoded.response_partition_limit,
        cursor = ?decoded.cursor,
        "DescribeTopicPartitions"
    );

    let response = DescribeTopicPartitionsResponse {
        correlation_id: request.header.correlation_id,
        throttle_time_ms: 0,
        topics: decoded
            .topics
            .into_iter()
            .map(TopicDescription::unknown)
            .collect(),
        next_cursor: None,
    };
    Ok(response.encode())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::RequestHeader;
    use bytes::Bytes;

    /// Build a v0 request payload (client id onwards) with a null cursor.
    pub(crate) fn request_payload(client_id: &str, topics: &[&str]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_i16(client_id.len() as i16);
        buf.put_slice(client_id.as_bytes());
        buf.put_empty_tagged_fields();
        buf.put_compact_array_len(topics.len());
        for topic in topics {
            buf.put_compact_string(topic);
            buf.put_empty_tagged_fields();
        }
        buf.put_i32(100);
        buf.put_i8(NULL_CURSOR);
        buf.put_empty_tagged_fields();
        buf
    }

    fn request(correlation_id: i32, payload: BytesMut) -> Request {
        Request {
            header: RequestHeader {
                api_key: 75,
                api_version: 0,
                correlation_id,
            },
            payload: payload.freeze(),
        }
    }

    #[test]
    fn test_decode_request() {
        let payload = request_payload("kafka-cli", &["foo", "bar"]);
        let decoded = DescribeTopicPartitionsRequest::decode(&payload).unwrap();
        assert_eq!(decoded.client_id.as_deref(), Some("kafka-cli"));
        assert_eq!(decoded.topics, vec!["foo", "bar"]);
        assert_eq!(decoded.response_partition_limit, 100);
        assert_eq!(decoded.cursor, None);
    }

    #[test]
    fn test_decode_request_with_cursor() {
        let mut buf = BytesMut::new();
        buf.put_i16(-1);
        buf.put_empty_tagged_fields();
        buf.put_compact_array_len(1);
        buf.put_compact_string("foo");
        buf.put_empty_tagged_fields();
        buf.put_i32(1);
        Cursor::encode(
            Some(&Cursor {
                topic_name: "foo".to_string(),
                partition_index: 3,
            }),
            &mut buf,
        );

        let decoded = DescribeTopicPartitionsRequest::decode(&buf).unwrap();
        assert_eq!(decoded.client_id, None);
        assert_eq!(
            decoded.cursor,
            Some(Cursor {
                topic_name: "foo".to_string(),
                partition_index: 3,
            })
        );
    }

    #[test]
    fn test_decode_bad_cursor_marker() {
        let mut buf = request_payload("c", &["foo"]);
        let len = buf.len();
        buf[len - 2] = 0x05;
        assert_eq!(
            DescribeTopicPartitionsRequest::decode(&buf),
            Err(DecodeError::InvalidMarker(5))
        );
    }

    #[test]
    fn test_decode_truncated() {
        let payload = request_payload("c", &["foo"]);
        let short = &payload[..payload.len() - 3];
        assert!(matches!(
            DescribeTopicPartitionsRequest::decode(short),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_single_topic_response_bytes() {
        let response = handle(&request(7, request_payload("c", &["foo"]))).unwrap();

        let mut expected = vec![
            0x00, 0x00, 0x00, 0x07, // correlation id
            0x00, // header tagged fields
            0x00, 0x00, 0x00, 0x00, // throttle time
            0x02, // 1 topic
            0x00, 0x03, // UNKNOWN_TOPIC_OR_PARTITION
            0x04, b'f', b'o', b'o', // name
        ];
        expected.extend_from_slice(&[0u8; 16]); // topic id
        expected.extend_from_slice(&[
            0x00, // is_internal
            0x01, // empty partitions
            0x00, 0x00, 0x0d, 0xf8, // authorized operations
            0x00, // topic tagged fields
            0xff, // null cursor
            0x00, // tagged fields
        ]);
        assert_eq!(&response[..], &expected[..]);
    }

    #[test]
    fn test_every_topic_is_unknown() {
        let names = ["alpha", "beta", "gamma", "delta"];
        let response = handle(&request(99, request_payload("c", &names))).unwrap();

        let mut d = Decoder::new(&response);
        assert_eq!(d.read_i32().unwrap(), 99);
        d.skip_tagged_fields().unwrap();
        assert_eq!(d.read_i32().unwrap(), 0);
        assert_eq!(d.read_compact_array_len().unwrap(), Some(names.len()));
        for name in names {
            assert_eq!(d.read_i16().unwrap(), 3);
            assert_eq!(d.read_compact_string("name").unwrap(), name);
            assert_eq!(d.read_bytes(16).unwrap(), &[0u8; 16]);
            assert_eq!(d.read_i8().unwrap(), 0);
            assert_eq!(d.read_compact_array_len().unwrap(), Some(0));
            assert_eq!(d.read_i32().unwrap(), TOPIC_AUTHORIZED_OPERATIONS);
            d.skip_tagged_fields().unwrap();
        }
        assert_eq!(d.read_i8().unwrap(), -1);
        d.skip_tagged_fields().unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn test_empty_topic_list() {
        let response = handle(&request(1, request_payload("c", &[]))).unwrap();
        assert_eq!(
            &response[..],
            &[0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0xff, 0x00]
        );
    }

    #[test]
    fn test_handle_malformed_payload() {
        let req = Request {
            header: RequestHeader {
                api_key: 75,
                api_version: 0,
                correlation_id: 1,
            },
            payload: Bytes::from_static(&[0x00]),
        };
        assert!(handle(&req).is_err());
    }
}
