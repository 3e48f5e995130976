//! `Consumer` façade (C9, §4.9): builds Fetch/Offsets requests, calls `Cluster`, and decodes and
//! validates the returned messages. No consumer-group coordination, no offset commit/fetch —
//! those are out of scope (§1, Non-goals).

use std::rc::Rc;
use std::vec;

use client::Cluster;
use config::{ClientConfig, CONSUMER_DEFAULT_MIN_BYTES};
use errors::Result;
use protocol::{decode_message_set, DecodedMessage, FetchOffset};

/// A single decoded, validated record as handed back to a caller of [`Consumer::fetch`] (§4.9).
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMessage {
    pub offset: i64,
    pub next_offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
    pub magic: i8,
    pub attributes: i8,
    pub valid: bool,
    pub error: Option<String>,
    pub highwater_mark_offset: i64,
}

fn build_fetched_messages(decoded: Vec<DecodedMessage>, highwater_mark_offset: i64) -> Vec<FetchedMessage> {
    decoded
        .into_iter()
        .map(|m| FetchedMessage {
            offset: m.offset,
            next_offset: m.next_offset,
            key: m.key,
            payload: m.value,
            magic: m.magic,
            attributes: m.attributes,
            valid: m.valid,
            error: m.error,
            highwater_mark_offset: highwater_mark_offset,
        })
        .collect()
}

/// A finite, non-restartable, in-order sequence of [`FetchedMessage`]s from a single fetch call.
/// Consuming it (via `Iterator`) is the only way to read its contents; once exhausted it cannot
/// be replayed — call [`Consumer::fetch`] again for a fresh sequence.
pub struct FetchedMessages {
    inner: vec::IntoIter<FetchedMessage>,
}

impl Iterator for FetchedMessages {
    type Item = FetchedMessage;

    fn next(&mut self) -> Option<FetchedMessage> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Thin façade over a shared `Cluster` (§4.9). Unlike the low-level `Cluster::fetch`, which
/// defaults `min_bytes` to 0, a `Consumer` defaults to `CONSUMER_DEFAULT_MIN_BYTES` (§9) to match
/// common production tuning; override with [`Consumer::with_min_bytes`].
#[derive(Clone)]
pub struct Consumer {
    cluster: Rc<Cluster>,
    min_bytes: i32,
}

impl Consumer {
    pub fn new(config: ClientConfig) -> Result<Consumer> {
        Ok(Consumer {
            cluster: Rc::new(Cluster::new(config)?),
            min_bytes: CONSUMER_DEFAULT_MIN_BYTES,
        })
    }

    pub fn from_cluster(cluster: Rc<Cluster>) -> Consumer {
        Consumer {
            cluster: cluster,
            min_bytes: CONSUMER_DEFAULT_MIN_BYTES,
        }
    }

    pub fn with_min_bytes(mut self, min_bytes: i32) -> Consumer {
        self.min_bytes = min_bytes;
        self
    }

    /// `fetch(topic, partition, offset, max_bytes)` (§4.9). Decodes the returned `MessageSet`
    /// and recomputes each message's CRC; a mismatch, an unrecognized magic byte, or a failed
    /// inner decompression marks that message `valid = false` with `error` populated, rather
    /// than failing the call.
    pub fn fetch(&self, topic: &str, partition: i32, offset: i64, max_bytes: i32) -> Result<FetchedMessages> {
        let response = self.cluster.fetch(topic, partition, offset, max_bytes, self.min_bytes)?;

        let partition_data = response
            .topics
            .iter()
            .find(|t| t.topic == topic)
            .and_then(|t| t.partitions.iter().find(|p| p.partition == partition));

        let highwater_mark_offset = partition_data.map(|p| p.highwater_mark_offset).unwrap_or(0);
        let max_message_size = self.cluster.config().max_message_size;

        let decoded = match partition_data {
            Some(p) => decode_message_set(&p.message_set, max_message_size)?,
            None => Vec::new(),
        };

        Ok(FetchedMessages {
            inner: build_fetched_messages(decoded, highwater_mark_offset).into_iter(),
        })
    }

    /// `offsets(topic, partition, time_point, max_number)` (§4.9). An empty result means no
    /// matching offsets were found; that is not an error.
    pub fn offsets(
        &self,
        topic: &str,
        partition: i32,
        time_point: FetchOffset,
        max_number: i32,
    ) -> Result<Vec<i64>> {
        let response = self.cluster.offsets(topic, partition, time_point, max_number)?;

        let offsets = response
            .topics
            .iter()
            .find(|t| t.topic == topic)
            .and_then(|t| t.partition_offsets.iter().find(|p| p.partition == partition))
            .map(|p| p.offsets.clone())
            .unwrap_or_default();

        Ok(offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::{Broker, Cluster, ClusterSnapshot};
    use compression::Compression;
    use config::ClientConfig;
    use network::mock::MockTransport;
    use protocol::{Message, MessageSet, PartitionMetadata, TopicMetadata};
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
    fn build_fetched_messages_carries_highwater_mark_and_validity() {
        let set = MessageSet::new(vec![
            Message::new(b"first".to_vec()),
            Message::new(b"second".to_vec()),
        ]);
        let bytes = set.encode(Compression::None).unwrap();
        let decoded = decode_message_set(&bytes, 0).unwrap();

        let messages = build_fetched_messages(decoded, 42);
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.valid));
        assert!(messages.iter().all(|m| m.highwater_mark_offset == 42));
        assert_eq!(messages[0].payload, Some(b"first".to_vec()));
        assert_eq!(messages[1].next_offset, messages[1].offset + 1);
    }

    #[test]
    fn build_fetched_messages_surfaces_crc_mismatch_without_erroring() {
        let set = MessageSet::new(vec![Message::new(b"hello".to_vec())]);
        let mut bytes = set.encode(Compression::None).unwrap();
        bytes[12] ^= 0xff; // corrupt a byte inside the crc field

        let decoded = decode_message_set(&bytes, 0).unwrap();
        let messages = build_fetched_messages(decoded, 0);
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].valid);
        assert!(messages[0].error.as_ref().unwrap().contains("checksum mismatch"));
    }

    #[test]
    fn fetch_is_not_restartable_once_consumed() {
        let set = MessageSet::new(vec![Message::new(b"only".to_vec())]);
        let decoded = decode_message_set(&set.encode(Compression::None).unwrap(), 0).unwrap();
        let mut sequence = FetchedMessages {
            inner: build_fetched_messages(decoded, 0).into_iter(),
        };

        assert!(sequence.next().is_some());
        assert!(sequence.next().is_none());
        assert!(sequence.next().is_none());
    }

    #[test]
    fn fetch_surfaces_io_errors_once_retries_are_exhausted() {
        let cluster = Rc::new(Cluster::new(test_config()).unwrap());
        cluster.inject_snapshot(snapshot_with_leader("test", 0, 1));
        cluster.inject_broker(1, Box::new(MockTransport::new(vec![])));
        let consumer = Consumer::from_cluster(cluster);

        let result = consumer.fetch("test", 0, 0, 1024);
        assert!(result.is_err());
    }

    #[test]
    fn offsets_surfaces_io_errors_once_retries_are_exhausted() {
        let cluster = Rc::new(Cluster::new(test_config()).unwrap());
        cluster.inject_snapshot(snapshot_with_leader("test", 0, 1));
        cluster.inject_broker(1, Box::new(MockTransport::new(vec![])));
        let consumer = Consumer::from_cluster(cluster);

        let result = consumer.offsets("test", 0, FetchOffset::Earliest, 10);
        assert!(result.is_err());
    }
}
