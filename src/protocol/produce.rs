//! `ProduceRequest` / `ProduceResponse` (§6.3).

use errors::Result;
use protocol::codec::{Decoder, Encoder, RequestHeader, ResponseHeader};

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceRequest {
    pub header: RequestHeader,
    pub required_acks: i16,
    pub timeout_ms: i32,
    pub topics: Vec<ProduceTopicData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceTopicData {
    pub topic: String,
    pub partitions: Vec<ProducePartitionData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProducePartitionData {
    pub partition: i32,
    pub message_set: Vec<u8>,
}

impl ProduceRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.header.encode(&mut enc);
        enc.write_i16(self.required_acks);
        enc.write_i32(self.timeout_ms);
        enc.write_array(&self.topics, |enc, topic| {
            enc.write_string(Some(&topic.topic));
            enc.write_array(&topic.partitions, |enc, partition| {
                enc.write_i32(partition.partition);
                enc.write_i32(partition.message_set.len() as i32);
                enc.extend_raw(&partition.message_set);
            });
        });
        enc.into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceResponse {
    pub header: ResponseHeader,
    pub topics: Vec<ProduceResponseTopic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceResponseTopic {
    pub topic: String,
    pub partitions: Vec<ProduceResponsePartition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceResponsePartition {
    pub partition: i32,
    pub error_code: i16,
    pub offset: i64,
}

impl ProduceResponse {
    pub fn decode(bytes: &[u8]) -> Result<ProduceResponse> {
        let mut dec = Decoder::new(bytes);
        let header = ResponseHeader::decode(&mut dec)?;
        let topics = dec.read_array(|dec| {
            let topic = dec.read_string()?.unwrap_or_default();
            let partitions = dec.read_array(|dec| {
                Ok(ProduceResponsePartition {
                    partition: dec.read_i32()?,
                    error_code: dec.read_i16()?,
                    offset: dec.read_i64()?,
                })
            })?;
            Ok(ProduceResponseTopic {
                topic: topic,
                partitions: partitions,
            })
        })?;
        dec.expect_exhausted()?;

        Ok(ProduceResponse {
            header: header,
            topics: topics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::codec::ApiKeys;

    #[test]
    fn encodes_request_header_and_body() {
        let req = ProduceRequest {
            header: RequestHeader::new(ApiKeys::Produce, 7, Some("test-client")),
            required_acks: -1,
            timeout_ms: 1500,
            topics: vec![ProduceTopicData {
                topic: "test".to_owned(),
                partitions: vec![ProducePartitionData {
                    partition: 0,
                    message_set: vec![1, 2, 3],
                }],
            }],
        };

        let bytes = req.encode();
        assert!(bytes.len() > 16);
    }

    #[test]
    fn decodes_response() {
        let mut enc = Encoder::new();
        enc.write_i32(7); // correlation_id
        enc.write_array(&["test"], |enc, topic| {
            enc.write_string(Some(topic));
            enc.write_array(&[(0i32, 0i16, 42i64)], |enc, &(partition, error, offset)| {
                enc.write_i32(partition);
                enc.write_i16(error);
                enc.write_i64(offset);
            });
        });

        let resp = ProduceResponse::decode(&enc.into_bytes()).unwrap();
        assert_eq!(resp.header.correlation_id, 7);
        assert_eq!(resp.topics[0].topic, "test");
        assert_eq!(resp.topics[0].partitions[0].offset, 42);
    }
}
