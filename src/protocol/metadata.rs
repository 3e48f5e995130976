//! `MetadataRequest` / `MetadataResponse` (§6.6).

use errors::Result;
use protocol::codec::{Decoder, Encoder, RequestHeader, ResponseHeader};

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRequest {
    pub header: RequestHeader,
    /// Empty means "all topics".
    pub topics: Vec<String>,
}

impl MetadataRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.header.encode(&mut enc);
        enc.write_array(&self.topics, |enc, topic| {
            enc.write_string(Some(topic));
        });
        enc.into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataResponse {
    pub header: ResponseHeader,
    pub brokers: Vec<BrokerMetadata>,
    pub topics: Vec<TopicMetadata>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMetadata {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicMetadata {
    pub error_code: i16,
    pub topic: String,
    pub partitions: Vec<PartitionMetadata>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionMetadata {
    pub error_code: i16,
    pub partition: i32,
    /// `-1` on the wire means no leader is currently known.
    pub leader: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

impl PartitionMetadata {
    pub fn leader_node_id(&self) -> Option<i32> {
        if self.leader < 0 {
            None
        } else {
            Some(self.leader)
        }
    }
}

impl MetadataResponse {
    pub fn decode(bytes: &[u8]) -> Result<MetadataResponse> {
        let mut dec = Decoder::new(bytes);
        let header = ResponseHeader::decode(&mut dec)?;

        let brokers = dec.read_array(|dec| {
            Ok(BrokerMetadata {
                node_id: dec.read_i32()?,
                host: dec.read_string()?.unwrap_or_default(),
                port: dec.read_i32()?,
            })
        })?;

        let topics = dec.read_array(|dec| {
            let error_code = dec.read_i16()?;
            let topic = dec.read_string()?.unwrap_or_default();
            let partitions = dec.read_array(|dec| {
                let error_code = dec.read_i16()?;
                let partition = dec.read_i32()?;
                let leader = dec.read_i32()?;
                let replicas = dec.read_array(|dec| dec.read_i32())?;
                let isr = dec.read_array(|dec| dec.read_i32())?;
                Ok(PartitionMetadata {
                    error_code: error_code,
                    partition: partition,
                    leader: leader,
                    replicas: replicas,
                    isr: isr,
                })
            })?;
            Ok(TopicMetadata {
                error_code: error_code,
                topic: topic,
                partitions: partitions,
            })
        })?;
        dec.expect_exhausted()?;

        Ok(MetadataResponse {
            header: header,
            brokers: brokers,
            topics: topics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_metadata_with_no_leader() {
        let mut enc = Encoder::new();
        enc.write_i32(3); // correlation_id
        enc.write_array(&[(1i32, "broker1", 9092i32)], |enc, &(id, host, port)| {
            enc.write_i32(id);
            enc.write_string(Some(host));
            enc.write_i32(port);
        });
        enc.write_array(&["test"], |enc, topic| {
            enc.write_i16(0);
            enc.write_string(Some(topic));
            enc.write_array(&[0i32], |enc, &partition| {
                enc.write_i16(0);
                enc.write_i32(partition);
                enc.write_i32(-1); // no leader
                enc.write_array::<i32, _>(&[], |_, _| {});
                enc.write_array::<i32, _>(&[], |_, _| {});
            });
        });

        let resp = MetadataResponse::decode(&enc.into_bytes()).unwrap();
        assert_eq!(resp.brokers[0].host, "broker1");
        assert_eq!(
            resp.topics[0].partitions[0].leader_node_id(),
            None
        );
    }
}
