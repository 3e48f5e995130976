//! `ClientConfig` (C11): the typed, validated configuration surface (§4.10, §6.8).
//!
//! Durations are stored as raw millisecond fields so the struct derives `Serialize`/
//! `Deserialize` without a custom `Duration` visitor, matching the way the teacher's
//! `ClientConfig`/`ProducerConfig` expose `request_timeout()`-style accessors over a plain
//! `u64` field rather than serializing `std::time::Duration` directly.

use std::time::Duration;

use network::IpVersion;
use protocol::RequiredAcks;

use errors::{ErrorKind, Result};

pub const DEFAULT_TIMEOUT_MILLIS: u64 = 1_500;
pub const DEFAULT_SEND_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_RETRY_BACKOFF_MILLIS: u64 = 200;
pub const DEFAULT_MAX_WAIT_MILLIS: i32 = 100;
pub const DEFAULT_MIN_BYTES: i32 = 0;
pub const DEFAULT_MAX_BYTES: i32 = 1024 * 1024;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;
/// The `Consumer` façade's builder overrides `min_bytes` to this value (§9), distinct from the
/// `Cluster`/low-level default of 0.
pub const CONSUMER_DEFAULT_MIN_BYTES: i32 = 10;

/// Typed, validated client configuration (§4.10). Construct via [`ClientConfig::builder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Seed broker endpoints, tried in the given order until one answers a MetadataRequest.
    pub hosts: Vec<(String, u16)>,
    pub client_id: Option<String>,
    pub timeout_ms: u64,
    pub ip_version: IpVersion,
    pub send_max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub max_wait_ms: i32,
    pub min_bytes: i32,
    pub max_bytes: i32,
    pub max_message_size: usize,
    pub required_acks: RequiredAcks,
    pub auto_create_topics_enable: bool,
    /// Seeds the correlation-id generator; `None` means seed from the OS's random source.
    pub correlation_id_seed: Option<i32>,
    /// `None` means "refresh only on a miss or a metadata-invalidating error" (§9, decided).
    pub metadata_ttl_ms: Option<u64>,
    pub dont_load_supported_api_versions: bool,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn metadata_ttl(&self) -> Option<Duration> {
        self.metadata_ttl_ms.map(Duration::from_millis)
    }
}

/// Builds a [`ClientConfig`], validating cross-field constraints that a plain struct literal
/// can't enforce (§4.10).
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    hosts: Vec<(String, u16)>,
    client_id: Option<String>,
    timeout_ms: u64,
    ip_version: IpVersion,
    send_max_attempts: u32,
    retry_backoff_ms: u64,
    max_wait_ms: i32,
    min_bytes: i32,
    max_bytes: i32,
    max_message_size: usize,
    required_acks: RequiredAcks,
    auto_create_topics_enable: bool,
    correlation_id_seed: Option<i32>,
    metadata_ttl_ms: Option<u64>,
    dont_load_supported_api_versions: bool,
}

impl Default for ClientConfigBuilder {
    fn default() -> ClientConfigBuilder {
        ClientConfigBuilder {
            hosts: Vec::new(),
            client_id: None,
            timeout_ms: DEFAULT_TIMEOUT_MILLIS,
            ip_version: IpVersion::Auto,
            send_max_attempts: DEFAULT_SEND_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MILLIS,
            max_wait_ms: DEFAULT_MAX_WAIT_MILLIS,
            min_bytes: DEFAULT_MIN_BYTES,
            max_bytes: DEFAULT_MAX_BYTES,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            required_acks: RequiredAcks::All,
            auto_create_topics_enable: true,
            correlation_id_seed: None,
            metadata_ttl_ms: None,
            dont_load_supported_api_versions: false,
        }
    }
}

impl ClientConfigBuilder {
    pub fn hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = (S, u16)>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(|(h, p)| (h.into(), p)).collect();
        self
    }

    pub fn client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn ip_version(mut self, ip_version: IpVersion) -> Self {
        self.ip_version = ip_version;
        self
    }

    pub fn send_max_attempts(mut self, n: u32) -> Self {
        self.send_max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.retry_backoff_ms = ms;
        self
    }

    pub fn max_wait_ms(mut self, ms: i32) -> Self {
        self.max_wait_ms = ms;
        self
    }

    pub fn min_bytes(mut self, n: i32) -> Self {
        self.min_bytes = n;
        self
    }

    pub fn max_bytes(mut self, n: i32) -> Self {
        self.max_bytes = n;
        self
    }

    pub fn max_message_size(mut self, n: usize) -> Self {
        self.max_message_size = n;
        self
    }

    pub fn required_acks(mut self, acks: RequiredAcks) -> Self {
        self.required_acks = acks;
        self
    }

    pub fn auto_create_topics_enable(mut self, enable: bool) -> Self {
        self.auto_create_topics_enable = enable;
        self
    }

    pub fn correlation_id_seed(mut self, seed: i32) -> Self {
        self.correlation_id_seed = Some(seed);
        self
    }

    pub fn metadata_ttl_ms(mut self, ms: u64) -> Self {
        self.metadata_ttl_ms = Some(ms);
        self
    }

    pub fn dont_load_supported_api_versions(mut self, dont: bool) -> Self {
        self.dont_load_supported_api_versions = dont;
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        if self.hosts.is_empty() {
            bail!(ErrorKind::MismatchArgument(
                "at least one seed host is required".into()
            ));
        }
        if self.retry_backoff_ms > self.timeout_ms {
            bail!(ErrorKind::MismatchArgument(format!(
                "retry_backoff_ms ({}) must not exceed timeout_ms ({})",
                self.retry_backoff_ms, self.timeout_ms
            )));
        }
        if self.send_max_attempts == 0 && self.auto_create_topics_enable {
            bail!(ErrorKind::MismatchArgument(
                "send_max_attempts must be at least 1 when auto_create_topics_enable is set"
                    .into()
            ));
        }

        Ok(ClientConfig {
            hosts: self.hosts,
            client_id: self.client_id,
            timeout_ms: self.timeout_ms,
            ip_version: self.ip_version,
            send_max_attempts: self.send_max_attempts,
            retry_backoff_ms: self.retry_backoff_ms,
            max_wait_ms: self.max_wait_ms,
            min_bytes: self.min_bytes,
            max_bytes: self.max_bytes,
            max_message_size: self.max_message_size,
            required_acks: self.required_acks,
            auto_create_topics_enable: self.auto_create_topics_enable,
            correlation_id_seed: self.correlation_id_seed,
            metadata_ttl_ms: self.metadata_ttl_ms,
            dont_load_supported_api_versions: self.dont_load_supported_api_versions,
        })
    }
}
