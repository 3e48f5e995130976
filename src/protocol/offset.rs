//! `OffsetRequest` / `OffsetResponse` (§6.5).

use errors::Result;
use protocol::codec::{Decoder, Encoder, RequestHeader, ResponseHeader};

/// The time-point an `OffsetRequest` asks about (§4.7, §6.5).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FetchOffset {
    /// The offset one past the last committed record (`-1` on the wire).
    Latest,
    /// The oldest retained offset (`-2` on the wire).
    Earliest,
    /// Offsets at or before this timestamp (broker-dependent semantics by version).
    Timestamp(i64),
}

impl FetchOffset {
    pub fn to_wire(&self) -> i64 {
        match *self {
            FetchOffset::Latest => -1,
            FetchOffset::Earliest => -2,
            FetchOffset::Timestamp(ts) => ts,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetRequest {
    pub header: RequestHeader,
    pub replica_id: i32,
    pub topics: Vec<OffsetTopicData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetTopicData {
    pub topic: String,
    pub partitions: Vec<OffsetPartitionRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetPartitionRequest {
    pub partition: i32,
    pub time: i64,
    pub max_number_of_offsets: i32,
}

impl OffsetRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.header.encode(&mut enc);
        enc.write_i32(self.replica_id);
        enc.write_array(&self.topics, |enc, topic| {
            enc.write_string(Some(&topic.topic));
            enc.write_array(&topic.partitions, |enc, partition| {
                enc.write_i32(partition.partition);
                enc.write_i64(partition.time);
                enc.write_i32(partition.max_number_of_offsets);
            });
        });
        enc.into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetResponse {
    pub header: ResponseHeader,
    pub topics: Vec<OffsetTopicResponse>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetTopicResponse {
    pub topic: String,
    pub partition_offsets: Vec<OffsetPartitionResponse>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetPartitionResponse {
    pub partition: i32,
    pub error_code: i16,
    pub offsets: Vec<i64>,
}

impl OffsetResponse {
    pub fn decode(bytes: &[u8]) -> Result<OffsetResponse> {
        let mut dec = Decoder::new(bytes);
        let header = ResponseHeader::decode(&mut dec)?;
        let topics = dec.read_array(|dec| {
            let topic = dec.read_string()?.unwrap_or_default();
            let partition_offsets = dec.read_array(|dec| {
                let partition = dec.read_i32()?;
                let error_code = dec.read_i16()?;
                let offsets = dec.read_array(|dec| dec.read_i64())?;
                Ok(OffsetPartitionResponse {
                    partition: partition,
                    error_code: error_code,
                    offsets: offsets,
                })
            })?;
            Ok(OffsetTopicResponse {
                topic: topic,
                partition_offsets: partition_offsets,
            })
        })?;
        dec.expect_exhausted()?;

        Ok(OffsetResponse {
            header: header,
            topics: topics,
        })
    }
}
