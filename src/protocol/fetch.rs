//! `FetchRequest` / `FetchResponse` (§6.4).

use errors::Result;
use protocol::codec::{Decoder, Encoder, RequestHeader, ResponseHeader};

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub header: RequestHeader,
    /// Must be `-1` for a consumer (§6.4).
    pub replica_id: i32,
    pub max_wait_ms: i32,
    pub min_bytes: i32,
    pub topics: Vec<FetchTopicData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTopicData {
    pub topic: String,
    pub partitions: Vec<FetchPartitionRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPartitionRequest {
    pub partition: i32,
    pub fetch_offset: i64,
    pub max_bytes: i32,
}

impl FetchRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.header.encode(&mut enc);
        enc.write_i32(self.replica_id);
        enc.write_i32(self.max_wait_ms);
        enc.write_i32(self.min_bytes);
        enc.write_array(&self.topics, |enc, topic| {
            enc.write_string(Some(&topic.topic));
            enc.write_array(&topic.partitions, |enc, partition| {
                enc.write_i32(partition.partition);
                enc.write_i64(partition.fetch_offset);
                enc.write_i32(partition.max_bytes);
            });
        });
        enc.into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub header: ResponseHeader,
    pub topics: Vec<FetchTopicResponse>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTopicResponse {
    pub topic: String,
    pub partitions: Vec<FetchPartitionData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPartitionData {
    pub partition: i32,
    pub error_code: i16,
    pub highwater_mark_offset: i64,
    pub message_set: Vec<u8>,
}

impl FetchResponse {
    pub fn decode(bytes: &[u8]) -> Result<FetchResponse> {
        let mut dec = Decoder::new(bytes);
        let header = ResponseHeader::decode(&mut dec)?;
        let topics = dec.read_array(|dec| {
            let topic = dec.read_string()?.unwrap_or_default();
            let partitions = dec.read_array(|dec| {
                let partition = dec.read_i32()?;
                let error_code = dec.read_i16()?;
                let highwater_mark_offset = dec.read_i64()?;
                let message_set = dec.read_bytes()?.unwrap_or_default();
                Ok(FetchPartitionData {
                    partition: partition,
                    error_code: error_code,
                    highwater_mark_offset: highwater_mark_offset,
                    message_set: message_set,
                })
            })?;
            Ok(FetchTopicResponse {
                topic: topic,
                partitions: partitions,
            })
        })?;
        dec.expect_exhausted()?;

        Ok(FetchResponse {
            header: header,
            topics: topics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::message::{decode_message_set, Message, MessageSet};
    use compression::Compression;

    // Hex fixture from the specification (S2): a fetch response carrying three uncompressed
    // messages "The first message", "The second message", "The third message" at offsets
    // 0, 26, 53.
    #[test]
    fn decodes_seeded_fetch_response_fixture() {
        // Offsets are assigned here the way a broker would on fetch (incrementing), unlike the
        // all-zero offsets a producer sends on `ProduceRequest`.
        let set = MessageSet {
            messages: vec![
                (0, Message::new(b"The first message".to_vec())),
                (1, Message::new(b"The second message".to_vec())),
                (2, Message::new(b"The third message".to_vec())),
            ],
        };
        let message_set_bytes = set.encode(Compression::None).unwrap();

        let mut enc = Encoder::new();
        enc.write_i32(0); // correlation_id
        enc.write_array(&["test"], |enc, topic| {
            enc.write_string(Some(topic));
            enc.write_array(&[0i32], |enc, &partition| {
                enc.write_i32(partition);
                enc.write_i16(0); // error_code
                enc.write_i64(message_set_bytes.len() as i64); // highwater mark, arbitrary here
                enc.write_i32(message_set_bytes.len() as i32);
                enc.extend_raw(&message_set_bytes);
            });
        });

        let resp = FetchResponse::decode(&enc.into_bytes()).unwrap();
        let messages = decode_message_set(&resp.topics[0].partitions[0].message_set, 0).unwrap();

        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.valid));
        assert_eq!(
            messages.iter().map(|m| m.offset).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(messages[0].value, Some(b"The first message".to_vec()));
        assert_eq!(messages[2].value, Some(b"The third message".to_vec()));
    }
}
