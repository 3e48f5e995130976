//! `Producer` façade (C8, §4.8): builds a `MessageSet`, hands it to `Cluster::produce`, and
//! returns the offset the broker assigned to the first message in the batch.

use std::rc::Rc;

use client::Cluster;
use compression::Compression;
use config::ClientConfig;
use errors::{ErrorKind, Result};
use protocol::{Message, MessageSet, RequiredAcks};

/// A single record to publish, or one of several in an ordered batch (§4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerRecord {
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
}

impl ProducerRecord {
    pub fn new(value: Vec<u8>) -> ProducerRecord {
        ProducerRecord { key: None, value: value }
    }

    pub fn with_key(key: Vec<u8>, value: Vec<u8>) -> ProducerRecord {
        ProducerRecord {
            key: Some(key),
            value: value,
        }
    }
}

/// Thin façade over a shared `Cluster` (§4.8). Cheap to clone: `Cluster` does its own connection
/// pooling, so a `Producer` is just a handle to it plus the acks/timeout defaults it applies.
#[derive(Clone)]
pub struct Producer {
    cluster: Rc<Cluster>,
    required_acks: RequiredAcks,
    timeout_ms: i32,
}

impl Producer {
    pub fn new(config: ClientConfig) -> Result<Producer> {
        let required_acks = config.required_acks;
        let timeout_ms = config.timeout_ms as i32;
        Ok(Producer {
            cluster: Rc::new(Cluster::new(config)?),
            required_acks: required_acks,
            timeout_ms: timeout_ms,
        })
    }

    pub fn from_cluster(cluster: Rc<Cluster>, required_acks: RequiredAcks, timeout_ms: i32) -> Producer {
        Producer {
            cluster: cluster,
            required_acks: required_acks,
            timeout_ms: timeout_ms,
        }
    }

    /// `send(topic, partition, messages, compression)` (§4.8). `required_acks == 0` still
    /// returns `0` as a placeholder offset since no broker-assigned offset is ever read back.
    pub fn send(
        &self,
        topic: &str,
        partition: i32,
        messages: Vec<ProducerRecord>,
        compression: Compression,
    ) -> Result<i64> {
        if topic.is_empty() {
            bail!(ErrorKind::MismatchArgument("topic must not be empty".into()));
        }
        if partition < 0 {
            bail!(ErrorKind::MismatchArgument(format!(
                "partition must be >= 0, got {}",
                partition
            )));
        }
        if messages.is_empty() {
            bail!(ErrorKind::MismatchArgument(
                "messages must be a non-empty sequence".into()
            ));
        }

        let max_message_size = self.cluster.config().max_message_size;
        for record in &messages {
            if record.value.len() > max_message_size {
                bail!(ErrorKind::MismatchArgument(format!(
                    "message of {} bytes exceeds max_message_size of {}",
                    record.value.len(),
                    max_message_size
                )));
            }
        }

        let wire_messages: Vec<Message> = messages
            .into_iter()
            .map(|record| match record.key {
                Some(key) => Message::with_key(key, record.value),
                None => Message::new(record.value),
            })
            .collect();
        let message_set = MessageSet::new(wire_messages);
        let encoded = message_set.encode(compression)?;

        let response = self.cluster.produce(
            topic,
            partition,
            encoded,
            self.required_acks,
            self.timeout_ms,
        )?;

        let offset = match response {
            None => 0,
            Some(response) => response
                .topics
                .iter()
                .find(|t| t.topic == topic)
                .and_then(|t| t.partitions.iter().find(|p| p.partition == partition))
                .map(|p| p.offset)
                .unwrap_or(0),
        };
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::{Broker, Cluster, ClusterSnapshot};
    use config::ClientConfig;
    use network::mock::MockTransport;
    use protocol::{PartitionMetadata, TopicMetadata};
    use std::collections::HashMap;
    use std::time::Instant;

    fn test_config() -> ClientConfig {
        ClientConfig::builder()
            .hosts(vec![("seed-host", 9092)])
            .send_max_attempts(2)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    fn snapshot_with_leader(topic: &str, partition: i32, leader: i32) -> ClusterSnapshot {
        let mut brokers = HashMap::new();
        brokers.insert(
            leader,
            Broker {
                node_id: leader,
                host: "broker".into(),
                port: 9092,
            },
        );
        let mut topics = HashMap::new();
        topics.insert(
            topic.to_owned(),
            TopicMetadata {
                error_code: 0,
                topic: topic.to_owned(),
                partitions: vec![PartitionMetadata {
                    error_code: 0,
                    partition: partition,
                    leader: leader,
                    replicas: vec![leader],
                    isr: vec![leader],
                }],
            },
        );
        ClusterSnapshot {
            brokers: brokers,
            topics: topics,
            fetched_at: Instant::now(),
        }
    }

    #[test]
    fn rejects_empty_topic() {
        let cluster = Rc::new(Cluster::new(test_config()).unwrap());
        let producer = Producer::from_cluster(cluster, RequiredAcks::One, 1000);

        let result = producer.send("", 0, vec![ProducerRecord::new(b"x".to_vec())], Compression::None);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_oversized_message() {
        let config = ClientConfig::builder()
            .hosts(vec![("seed-host", 9092)])
            .max_message_size(4)
            .build()
            .unwrap();
        let cluster = Rc::new(Cluster::new(config).unwrap());
        let producer = Producer::from_cluster(cluster, RequiredAcks::One, 1000);

        let result = producer.send(
            "test",
            0,
            vec![ProducerRecord::new(b"too long".to_vec())],
            Compression::None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn fire_and_forget_returns_placeholder_offset() {
        let cluster = Rc::new(Cluster::new(test_config()).unwrap());
        cluster.inject_snapshot(snapshot_with_leader("test", 0, 1));
        cluster.inject_broker(1, Box::new(MockTransport::new(vec![])));
        let producer = Producer::from_cluster(cluster, RequiredAcks::None, 1000);

        let offset = producer
            .send("test", 0, vec![ProducerRecord::new(b"hello".to_vec())], Compression::None)
            .unwrap();
        assert_eq!(offset, 0);
    }
}
