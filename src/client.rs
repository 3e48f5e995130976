//! `Cluster` (C7): the central routing state machine — broker pool, metadata lifecycle, and the
//! routed-request algorithm with retry/backoff (§4.7). This is the heart of the library; the
//! `producer`/`consumer` façades are thin callers of `Cluster::produce`/`fetch`/`offsets`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::thread;
use std::time::Instant;

use rand::{self, Rng, SeedableRng, StdRng};

use config::ClientConfig;
use errors::{Error, ErrorKind, KafkaCode, Result};
#[cfg(test)]
use network::Transport;
use network::BrokerIo;
use protocol::{
    self, ApiKeys, FetchOffset, FetchPartitionRequest, FetchRequest, FetchResponse,
    FetchTopicData, MetadataRequest, MetadataResponse, OffsetPartitionRequest, OffsetRequest,
    OffsetTopicData, PartitionMetadata, ProducePartitionData, ProduceRequest, ProduceResponse,
    ProduceTopicData, RequestHeader, RequiredAcks, TopicMetadata,
};

/// One broker's identity, as seen in a `MetadataResponse` (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct Broker {
    pub node_id: i32,
    pub host: String,
    pub port: u16,
}

/// An immutable view of the cluster as of the last successful metadata refresh (§3). Replaced
/// wholesale — never mutated in place — so a reader mid-request never observes a torn snapshot.
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    pub brokers: HashMap<i32, Broker>,
    pub topics: HashMap<String, TopicMetadata>,
    pub fetched_at: Instant,
}

impl ClusterSnapshot {
    fn empty() -> ClusterSnapshot {
        ClusterSnapshot {
            brokers: HashMap::new(),
            topics: HashMap::new(),
            fetched_at: Instant::now(),
        }
    }

    fn partition(&self, topic: &str, partition: i32) -> Option<&PartitionMetadata> {
        self.topics
            .get(topic)
            .and_then(|t| t.partitions.iter().find(|p| p.partition == partition))
    }

    fn leader_of(&self, topic: &str, partition: i32) -> Option<i32> {
        self.partition(topic, partition).and_then(|p| p.leader_node_id())
    }

    fn has_partition(&self, topic: &str, partition: i32) -> bool {
        self.partition(topic, partition).is_some()
    }

    fn is_stale(&self, ttl: Option<::std::time::Duration>) -> bool {
        match ttl {
            Some(ttl) => self.fetched_at.elapsed() > ttl,
            None => false,
        }
    }
}

/// How a classified per-partition error should steer the retry loop (§4.7 pseudocode).
enum Outcome<T> {
    Done(T),
    RefreshAndRetry(KafkaCode),
    Retry(KafkaCode),
    Fatal(KafkaCode),
}

/// Whether a leader is currently known for a `(topic, partition)` (§4.7 pseudocode, "leader_id ==
/// none" branch).
enum LeaderLookup {
    Found(i32),
    NoLeaderYet,
}

/// The broker directory, metadata cache, and routed-request engine (C7).
pub struct Cluster {
    config: ClientConfig,
    pool: RefCell<HashMap<i32, BrokerIo>>,
    snapshot: RefCell<Rc<ClusterSnapshot>>,
    rng: RefCell<StdRng>,
}

impl Cluster {
    pub fn new(config: ClientConfig) -> Result<Cluster> {
        let rng = match config.correlation_id_seed {
            Some(seed) => StdRng::from_seed(&[seed as usize]),
            None => {
                let mut seed_rng = rand::thread_rng();
                StdRng::from_seed(&[seed_rng.gen::<usize>()])
            }
        };

        Ok(Cluster {
            config: config,
            pool: RefCell::new(HashMap::new()),
            snapshot: RefCell::new(Rc::new(ClusterSnapshot::empty())),
            rng: RefCell::new(rng),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A negative random 31-bit integer, chosen fresh for each request (§4.7).
    fn next_correlation_id(&self) -> i32 {
        -(self.rng.borrow_mut().gen_range(1, i32::max_value()))
    }

    fn client_id(&self) -> Option<&str> {
        self.config.client_id.as_ref().map(String::as_str)
    }

    fn snapshot(&self) -> Rc<ClusterSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Dial `(host, port)` fresh — used for seed brokers, which aren't yet in the pool.
    fn dial(&self, host: &str, port: u16) -> Result<BrokerIo> {
        debug!("dialing broker {}:{}", host, port);
        BrokerIo::connect(host, port, self.config.timeout(), self.config.ip_version)
    }

    /// Borrow (dialing on demand) the pooled connection for `node_id`, whose address is looked
    /// up in the current snapshot.
    fn broker_io(&self, node_id: i32) -> Result<()> {
        if self.pool.borrow().contains_key(&node_id) {
            return Ok(());
        }
        let snapshot = self.snapshot();
        let broker = snapshot
            .brokers
            .get(&node_id)
            .ok_or(ErrorKind::NoKnownBrokers)?;
        let io = self.dial(&broker.host, broker.port)?;
        self.pool.borrow_mut().insert(node_id, io);
        self.probe_api_versions(node_id);
        Ok(())
    }

    fn with_broker_io<F, T>(&self, node_id: i32, f: F) -> Result<T>
    where
        F: FnOnce(&mut BrokerIo) -> Result<T>,
    {
        self.broker_io(node_id)?;
        let mut pool = self.pool.borrow_mut();
        let io = pool.get_mut(&node_id).ok_or(ErrorKind::NoKnownBrokers)?;
        f(io)
    }

    fn drop_broker_io(&self, node_id: i32) {
        if let Some(mut io) = self.pool.borrow_mut().remove(&node_id) {
            io.close();
        }
    }

    /// Issue a `MetadataRequest` for `topic` against seed brokers first, then any pooled broker,
    /// and atomically replace the snapshot with the result (§4.7 step 1-2).
    fn refresh_metadata(&self, topic: &str) -> Result<()> {
        debug!("refreshing metadata for topic `{}`", topic);

        let mut last_err = None;

        for &(ref host, port) in &self.config.hosts {
            match self.dial(host, port) {
                Ok(mut io) => match self.request_metadata(&mut io, topic) {
                    Ok(snapshot) => {
                        *self.snapshot.borrow_mut() = Rc::new(snapshot);
                        return Ok(());
                    }
                    Err(err) => last_err = Some(err),
                },
                Err(err) => last_err = Some(err),
            }
        }

        let pooled_ids: Vec<i32> = self.pool.borrow().keys().cloned().collect();
        for node_id in pooled_ids {
            let result = self.with_broker_io(node_id, |io| self.request_metadata(io, topic));
            match result {
                Ok(snapshot) => {
                    *self.snapshot.borrow_mut() = Rc::new(snapshot);
                    return Ok(());
                }
                Err(err) => last_err = Some(err),
            }
        }

        bail!(ErrorKind::CannotGetMetadata(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no reachable broker".into())
        ))
    }

    fn request_metadata(&self, io: &mut BrokerIo, topic: &str) -> Result<ClusterSnapshot> {
        let correlation_id = self.next_correlation_id();
        let request = MetadataRequest {
            header: RequestHeader::new(ApiKeys::Metadata, correlation_id, self.client_id()),
            topics: vec![topic.to_owned()],
        };
        io.send(&request.encode())?;
        let bytes = io.receive()?;
        let response = MetadataResponse::decode(&bytes)?;
        check_correlation_id(correlation_id, response.header.correlation_id)?;

        let brokers = response
            .brokers
            .into_iter()
            .map(|b| {
                (
                    b.node_id,
                    Broker {
                        node_id: b.node_id,
                        host: b.host,
                        port: b.port as u16,
                    },
                )
            })
            .collect();
        let topics = response
            .topics
            .into_iter()
            .map(|t| (t.topic.clone(), t))
            .collect();

        Ok(ClusterSnapshot {
            brokers: brokers,
            topics: topics,
            fetched_at: Instant::now(),
        })
    }

    /// `ApiVersionsRequest` probe (§4.13). Advisory only: failures are logged, never surfaced.
    pub fn probe_api_versions(&self, node_id: i32) {
        if self.config.dont_load_supported_api_versions {
            return;
        }
        let correlation_id = self.next_correlation_id();
        let result = self.with_broker_io(node_id, |io| {
            let request = protocol::ApiVersionsRequest {
                header: RequestHeader::new(ApiKeys::ApiVersions, correlation_id, self.client_id()),
            };
            io.send(&request.encode())?;
            let bytes = io.receive()?;
            protocol::ApiVersionsResponse::decode(&bytes)
        });
        match result {
            Ok(resp) => debug!("broker {} supports {} API(s)", node_id, resp.api_versions.len()),
            Err(err) => debug!("ApiVersions probe to broker {} failed (non-fatal): {}", node_id, err),
        }
    }

    /// Ensure the snapshot knows a leader for `(topic, partition)`, refreshing metadata as
    /// needed. Returns the leader's node id once attempts are not yet exhausted.
    fn ensure_leader(&self, topic: &str, partition: i32, attempts_left: &mut u32) -> Result<LeaderLookup> {
        loop {
            let snapshot = self.snapshot();
            if !snapshot.has_partition(topic, partition) || snapshot.is_stale(self.config.metadata_ttl()) {
                self.refresh_metadata(topic)?;
                continue;
            }
            return Ok(match snapshot.leader_of(topic, partition) {
                Some(leader_id) => LeaderLookup::Found(leader_id),
                None => {
                    if *attempts_left == 0 {
                        bail!(ErrorKind::LeaderNotFound(topic.to_owned(), partition));
                    }
                    LeaderLookup::NoLeaderYet
                }
            });
        }
    }

    /// Classify a per-partition `error_code` the way `retry_class` directs the routed-request
    /// loop (§4.5, §4.7). `UnknownTopicOrPartition` is only retryable when the broker is expected
    /// to auto-create the topic; otherwise it's fatal (§4.5).
    fn classify<T>(&self, code: i16, value: T) -> Outcome<T> {
        let kafka_code = KafkaCode::from_code(code);
        if kafka_code == KafkaCode::UnknownTopicOrPartition && !self.config.auto_create_topics_enable {
            return Outcome::Fatal(kafka_code);
        }
        match kafka_code.retry_class() {
            ::errors::RetryClass::Ok => Outcome::Done(value),
            ::errors::RetryClass::RefreshMetadata => Outcome::RefreshAndRetry(kafka_code),
            ::errors::RetryClass::Retryable => Outcome::Retry(kafka_code),
            ::errors::RetryClass::Fatal => Outcome::Fatal(kafka_code),
        }
    }

    /// `Cluster::produce` (§4.7 public contract). `required_acks == 0` returns synthetic success
    /// immediately after the write completes without waiting for a response.
    pub fn produce(
        &self,
        topic: &str,
        partition: i32,
        message_set: Vec<u8>,
        required_acks: RequiredAcks,
        timeout_ms: i32,
    ) -> Result<Option<ProduceResponse>> {
        let mut attempts_left = self.config.send_max_attempts;
        if attempts_left == 0 {
            bail!(ErrorKind::CannotSend(
                "send_max_attempts is 0; no attempt was made".into()
            ));
        }

        loop {
            let leader_id = match self.ensure_leader(topic, partition, &mut attempts_left)? {
                LeaderLookup::Found(id) => id,
                LeaderLookup::NoLeaderYet => {
                    self.backoff(&mut attempts_left)?;
                    continue;
                }
            };

            attempts_left -= 1;
            let is_last_attempt = attempts_left == 0;

            let correlation_id = self.next_correlation_id();
            let request = ProduceRequest {
                header: RequestHeader::new(ApiKeys::Produce, correlation_id, self.client_id()),
                required_acks: required_acks.code(),
                timeout_ms: timeout_ms,
                topics: vec![ProduceTopicData {
                    topic: topic.to_owned(),
                    partitions: vec![ProducePartitionData {
                        partition: partition,
                        message_set: message_set.clone(),
                    }],
                }],
            };
            let encoded = request.encode();

            let send_result = self.with_broker_io(leader_id, |io| {
                if required_acks == RequiredAcks::None {
                    // The broker never answers a no-ack produce; any failure here is a transport
                    // failure, not a server-reported error (§7).
                    io.send(&encoded)
                        .map_err(|err| Error::from(ErrorKind::SendNoAck(err.to_string())))?;
                    return Ok(None);
                }
                io.send(&encoded)?;
                let bytes = io.receive()?;
                Ok(Some(bytes))
            });

            let bytes = match send_result {
                Ok(Some(bytes)) => bytes,
                Ok(None) => return Ok(None),
                Err(err) => {
                    self.drop_broker_io(leader_id);
                    if is_last_attempt {
                        return Err(err);
                    }
                    self.sleep_backoff();
                    continue;
                }
            };

            let response = ProduceResponse::decode(&bytes)?;
            check_correlation_id(correlation_id, response.header.correlation_id)?;

            let partition_error = response
                .topics
                .iter()
                .find(|t| t.topic == topic)
                .and_then(|t| t.partitions.iter().find(|p| p.partition == partition))
                .map(|p| p.error_code)
                .unwrap_or(-1);

            match self.classify(partition_error, response) {
                Outcome::Done(response) => return Ok(Some(response)),
                Outcome::RefreshAndRetry(code) => {
                    if is_last_attempt {
                        bail!(ErrorKind::KafkaError(code));
                    }
                    self.invalidate_snapshot();
                    self.sleep_backoff();
                }
                Outcome::Retry(code) => {
                    if is_last_attempt {
                        bail!(ErrorKind::KafkaError(code));
                    }
                    self.sleep_backoff();
                }
                Outcome::Fatal(code) => bail!(ErrorKind::KafkaError(code)),
            }
        }
    }

    /// `Cluster::fetch` (§4.7 public contract). `min_bytes` is taken as a parameter rather than
    /// read off `self.config` so the `Consumer` façade can apply its own default (§9: the
    /// façade's builder defaults `min_bytes` to `CONSUMER_DEFAULT_MIN_BYTES`, distinct from the
    /// low-level default of 0).
    pub fn fetch(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
        max_bytes: i32,
        min_bytes: i32,
    ) -> Result<FetchResponse> {
        let mut attempts_left = self.config.send_max_attempts;
        if attempts_left == 0 {
            bail!(ErrorKind::CannotSend(
                "send_max_attempts is 0; no attempt was made".into()
            ));
        }

        loop {
            let leader_id = match self.ensure_leader(topic, partition, &mut attempts_left)? {
                LeaderLookup::Found(id) => id,
                LeaderLookup::NoLeaderYet => {
                    self.backoff(&mut attempts_left)?;
                    continue;
                }
            };

            attempts_left -= 1;
            let is_last_attempt = attempts_left == 0;

            let correlation_id = self.next_correlation_id();
            let request = FetchRequest {
                header: RequestHeader::new(ApiKeys::Fetch, correlation_id, self.client_id()),
                replica_id: -1,
                max_wait_ms: self.config.max_wait_ms,
                min_bytes: min_bytes,
                topics: vec![FetchTopicData {
                    topic: topic.to_owned(),
                    partitions: vec![FetchPartitionRequest {
                        partition: partition,
                        fetch_offset: offset,
                        max_bytes: max_bytes,
                    }],
                }],
            };
            let encoded = request.encode();

            let bytes = match self.with_broker_io(leader_id, |io| {
                io.send(&encoded)?;
                io.receive()
            }) {
                Ok(bytes) => bytes,
                Err(err) => {
                    self.drop_broker_io(leader_id);
                    if is_last_attempt {
                        return Err(err);
                    }
                    self.sleep_backoff();
                    continue;
                }
            };

            let response = FetchResponse::decode(&bytes)?;
            check_correlation_id(correlation_id, response.header.correlation_id)?;

            let partition_error = response
                .topics
                .iter()
                .find(|t| t.topic == topic)
                .and_then(|t| t.partitions.iter().find(|p| p.partition == partition))
                .map(|p| p.error_code)
                .unwrap_or(-1);

            match self.classify(partition_error, response) {
                Outcome::Done(response) => return Ok(response),
                Outcome::RefreshAndRetry(code) => {
                    if is_last_attempt {
                        bail!(ErrorKind::KafkaError(code));
                    }
                    self.invalidate_snapshot();
                    self.sleep_backoff();
                }
                Outcome::Retry(code) => {
                    if is_last_attempt {
                        bail!(ErrorKind::KafkaError(code));
                    }
                    self.sleep_backoff();
                }
                Outcome::Fatal(code) => bail!(ErrorKind::KafkaError(code)),
            }
        }
    }

    /// `Cluster::offsets` (§4.7 public contract).
    pub fn offsets(
        &self,
        topic: &str,
        partition: i32,
        time_point: FetchOffset,
        max_offsets: i32,
    ) -> Result<::protocol::OffsetResponse> {
        let mut attempts_left = self.config.send_max_attempts;
        if attempts_left == 0 {
            bail!(ErrorKind::CannotSend(
                "send_max_attempts is 0; no attempt was made".into()
            ));
        }

        loop {
            let leader_id = match self.ensure_leader(topic, partition, &mut attempts_left)? {
                LeaderLookup::Found(id) => id,
                LeaderLookup::NoLeaderYet => {
                    self.backoff(&mut attempts_left)?;
                    continue;
                }
            };

            attempts_left -= 1;
            let is_last_attempt = attempts_left == 0;

            let correlation_id = self.next_correlation_id();
            let request = OffsetRequest {
                header: RequestHeader::new(ApiKeys::Offsets, correlation_id, self.client_id()),
                replica_id: -1,
                topics: vec![OffsetTopicData {
                    topic: topic.to_owned(),
                    partitions: vec![OffsetPartitionRequest {
                        partition: partition,
                        time: time_point.to_wire(),
                        max_number_of_offsets: max_offsets,
                    }],
                }],
            };
            let encoded = request.encode();

            let bytes = match self.with_broker_io(leader_id, |io| {
                io.send(&encoded)?;
                io.receive()
            }) {
                Ok(bytes) => bytes,
                Err(err) => {
                    self.drop_broker_io(leader_id);
                    if is_last_attempt {
                        return Err(err);
                    }
                    self.sleep_backoff();
                    continue;
                }
            };

            let response = ::protocol::OffsetResponse::decode(&bytes)?;
            check_correlation_id(correlation_id, response.header.correlation_id)?;

            let partition_error = response
                .topics
                .iter()
                .find(|t| t.topic == topic)
                .and_then(|t| t.partition_offsets.iter().find(|p| p.partition == partition))
                .map(|p| p.error_code)
                .unwrap_or(-1);

            match self.classify(partition_error, response) {
                Outcome::Done(response) => return Ok(response),
                Outcome::RefreshAndRetry(code) => {
                    if is_last_attempt {
                        bail!(ErrorKind::KafkaError(code));
                    }
                    self.invalidate_snapshot();
                    self.sleep_backoff();
                }
                Outcome::Retry(code) => {
                    if is_last_attempt {
                        bail!(ErrorKind::KafkaError(code));
                    }
                    self.sleep_backoff();
                }
                Outcome::Fatal(code) => bail!(ErrorKind::KafkaError(code)),
            }
        }
    }

    fn invalidate_snapshot(&self) {
        *self.snapshot.borrow_mut() = Rc::new(ClusterSnapshot::empty());
    }

    fn backoff(&self, attempts_left: &mut u32) -> Result<()> {
        if *attempts_left == 0 {
            bail!(ErrorKind::NoKnownBrokers);
        }
        *attempts_left -= 1;
        thread::sleep(self.config.retry_backoff());
        Ok(())
    }

    /// Sleep between send attempts whose budget was already decremented up front (§4.7, P6):
    /// unlike `backoff`, this never touches `attempts_left` or bails.
    fn sleep_backoff(&self) {
        thread::sleep(self.config.retry_backoff());
    }

    /// Test-only hook: inject a pre-wired connection for a known node id, bypassing `dial`.
    #[cfg(test)]
    pub fn inject_broker(&self, node_id: i32, transport: Box<Transport>) {
        self.pool
            .borrow_mut()
            .insert(node_id, BrokerIo::from_transport(transport));
    }

    #[cfg(test)]
    pub fn inject_snapshot(&self, snapshot: ClusterSnapshot) {
        *self.snapshot.borrow_mut() = Rc::new(snapshot);
    }
}

fn check_correlation_id(expected: i32, actual: i32) -> Result<()> {
    if expected != actual {
        bail!(ErrorKind::MismatchCorrelationId(expected, actual));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use byteorder::{BigEndian, ByteOrder};

    use super::*;
    use network::mock::MockTransport;
    use protocol::codec::Encoder;
    use protocol::{PartitionMetadata as WirePartitionMetadata, TopicMetadata as WireTopicMetadata};

    fn test_config() -> ClientConfig {
        ClientConfig::builder()
            .hosts(vec![("seed-host", 9092)])
            .send_max_attempts(3)
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
                partitions: vec![WirePartitionMetadata {
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
    fn produce_with_required_acks_none_returns_without_reading_a_response() {
        let cluster = Cluster::new(test_config()).unwrap();
        cluster.inject_snapshot(snapshot_with_leader("test", 0, 1));
        cluster.inject_broker(1, Box::new(MockTransport::new(vec![])));

        let result = cluster.produce("test", 0, vec![1, 2, 3], RequiredAcks::None, 1000);
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn fetch_surfaces_io_errors_once_retries_are_exhausted() {
        let cluster = Cluster::new(test_config()).unwrap();
        cluster.inject_snapshot(snapshot_with_leader("test", 0, 1));
        cluster.inject_broker(1, Box::new(MockTransport::new(vec![])));

        // No response queued: every IO attempt fails, exhausting retries (send_max_attempts=3).
        let result = cluster.fetch("test", 0, 0, 1024, 0);
        assert!(result.is_err());
    }

    #[test]
    fn metadata_miss_triggers_refresh_before_routing() {
        let cluster = Cluster::new(test_config()).unwrap();
        // No snapshot at all yet; refresh_metadata will try to dial the seed host and fail since
        // nothing is listening — this proves the miss path is taken rather than panicking.
        let result = cluster.fetch("unknown-topic", 0, 0, 1024, 0);
        assert!(result.is_err());
    }

    fn snapshot_with_no_leader(topic: &str, partition: i32) -> ClusterSnapshot {
        let mut topics = HashMap::new();
        topics.insert(
            topic.to_owned(),
            TopicMetadata {
                error_code: 0,
                topic: topic.to_owned(),
                partitions: vec![WirePartitionMetadata {
                    error_code: 0,
                    partition: partition,
                    leader: -1,
                    replicas: vec![],
                    isr: vec![],
                }],
            },
        );
        ClusterSnapshot {
            brokers: HashMap::new(),
            topics: topics,
            fetched_at: Instant::now(),
        }
    }

    #[test]
    fn leader_not_found_retries_then_succeeds_once_metadata_catches_up() {
        let cluster = Cluster::new(test_config()).unwrap();
        cluster.inject_snapshot(snapshot_with_no_leader("test", 0));

        let mut attempts_left = cluster.config().send_max_attempts;
        let started = Instant::now();

        match cluster.ensure_leader("test", 0, &mut attempts_left).unwrap() {
            LeaderLookup::NoLeaderYet => {}
            LeaderLookup::Found(id) => panic!("expected no leader yet, got {}", id),
        }
        cluster.backoff(&mut attempts_left).unwrap();
        assert!(started.elapsed() >= cluster.config().retry_backoff());

        // Second metadata response: the leader election has now settled on broker 2.
        cluster.inject_snapshot(snapshot_with_leader("test", 0, 2));
        match cluster.ensure_leader("test", 0, &mut attempts_left).unwrap() {
            LeaderLookup::Found(leader_id) => assert_eq!(leader_id, 2),
            LeaderLookup::NoLeaderYet => panic!("expected leader to be found"),
        }
        assert_eq!(attempts_left, cluster.config().send_max_attempts - 1);
    }

    #[test]
    fn leader_not_found_fails_once_attempts_are_exhausted() {
        let cluster = Cluster::new(test_config()).unwrap();
        cluster.inject_snapshot(snapshot_with_no_leader("test", 0));

        let mut attempts_left = cluster.config().send_max_attempts;
        loop {
            match cluster.ensure_leader("test", 0, &mut attempts_left) {
                Ok(LeaderLookup::NoLeaderYet) => cluster.backoff(&mut attempts_left).unwrap(),
                Ok(LeaderLookup::Found(id)) => panic!("unexpected leader {}", id),
                Err(_) => break,
            }
        }
        assert_eq!(attempts_left, 0);

        let result = cluster.ensure_leader("test", 0, &mut attempts_left);
        assert!(result.is_err());
    }

    /// A `Transport` that never fails at the IO layer, so `drop_broker_io` never evicts it, but
    /// always answers with a classified-retryable `FetchResponse` echoing whatever correlation id
    /// it was sent — letting a test count real send attempts without predicting `rand` output.
    struct RetryableFetchTransport {
        attempts: Arc<AtomicUsize>,
        last_correlation_id: i32,
    }

    impl RetryableFetchTransport {
        fn new(attempts: Arc<AtomicUsize>) -> RetryableFetchTransport {
            RetryableFetchTransport {
                attempts: attempts,
                last_correlation_id: 0,
            }
        }
    }

    impl Transport for RetryableFetchTransport {
        fn send(&mut self, bytes: &[u8]) -> Result<()> {
            self.last_correlation_id = BigEndian::read_i32(&bytes[4..8]);
            Ok(())
        }

        fn receive(&mut self) -> Result<Vec<u8>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);

            let mut enc = Encoder::new();
            enc.write_i32(self.last_correlation_id);
            enc.write_array(&["test"], |enc, topic| {
                enc.write_string(Some(topic));
                enc.write_array(&[0i32], |enc, &partition| {
                    enc.write_i32(partition);
                    enc.write_i16(KafkaCode::RequestTimedOut.code());
                    enc.write_i64(0); // highwater mark
                    enc.write_bytes(None); // empty message set
                });
            });
            Ok(enc.into_bytes())
        }

        fn close(&mut self) {}

        fn is_alive(&self) -> bool {
            true
        }
    }

    #[test]
    fn fetch_surfaces_classified_error_after_exactly_send_max_attempts() {
        let cluster = Cluster::new(test_config()).unwrap();
        cluster.inject_snapshot(snapshot_with_leader("test", 0, 1));
        let attempts = Arc::new(AtomicUsize::new(0));
        cluster.inject_broker(1, Box::new(RetryableFetchTransport::new(attempts.clone())));

        let err = cluster.fetch("test", 0, 0, 1024, 0).unwrap_err();
        assert!(format!("{}", err).contains("RequestTimedOut"));
        assert_eq!(
            attempts.load(Ordering::SeqCst),
            cluster.config().send_max_attempts as usize
        );
    }
}
