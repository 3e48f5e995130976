//! Error taxonomy for the client.
//!
//! Every error that crosses a public API boundary is a `Error` (built by `error_chain!`) whose
//! `ErrorKind` is either a client-side problem (bad arguments, transport failure, protocol
//! framing) or a `KafkaError` wrapping a server-reported `KafkaCode`. The retry policy in
//! `client::Cluster` consults `KafkaCode::retry_class` to decide whether to retry, refresh
//! metadata, or give up.

use std::fmt;

/// Error codes reported by a Kafka broker in a response.
///
/// See also [Kafka Errors](http://kafka.apache.org/protocol.html).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KafkaCode {
    /// The server experienced an unexpected error when processing the request.
    Unknown,
    None,
    /// The requested offset is outside the range of offsets maintained by the server for the
    /// given topic/partition.
    OffsetOutOfRange,
    /// This indicates that a message contents does not match its CRC.
    CorruptMessage,
    /// This request is for a topic or partition that does not exist on this broker.
    UnknownTopicOrPartition,
    /// The message has a negative size.
    InvalidMessageSize,
    /// Thrown if we are in the middle of a leadership election and there is currently no leader
    /// for this partition and hence it is unavailable for writes.
    LeaderNotAvailable,
    /// Thrown if the client attempts to send messages to a replica that is not the leader for
    /// some partition. Indicates that the client's metadata is out of date.
    NotLeaderForPartition,
    /// Thrown if the request exceeds the user-specified time limit in the request.
    RequestTimedOut,
    /// Not a client-facing error; used mostly by tools when a broker is not alive.
    BrokerNotAvailable,
    /// A replica is expected on a broker but is not present (can be safely ignored).
    ReplicaNotAvailable,
    /// The broker's configurable maximum message size was exceeded by the produced message.
    MessageSizeTooLarge,
    /// Internal error code for broker-to-broker communication.
    StaleControllerEpoch,
    /// The offset metadata string is larger than the configured maximum.
    OffsetMetadataTooLarge,
    /// The server disconnected before a response was received.
    NetworkException,
    GroupLoadInProgress,
    GroupCoordinatorNotAvailable,
    NotCoordinatorForGroup,
    /// The topic name is invalid, or an attempt was made to write to an internal topic.
    InvalidTopic,
    /// A message batch in a produce request exceeded the maximum configured segment size.
    RecordListTooLarge,
    /// The number of in-sync replicas is lower than the configured minimum and `acks=-1`.
    NotEnoughReplicas,
    /// The message was written to the log, but with fewer in-sync replicas than required.
    NotEnoughReplicasAfterAppend,
    /// The requested `required_acks` is invalid (anything other than -1, 0, or 1).
    InvalidRequiredAcks,
    IllegalGeneration,
    InconsistentGroupProtocol,
    InvalidGroupId,
    UnknownMemberId,
    InvalidSessionTimeout,
    RebalanceInProgress,
    InvalidCommitOffsetSize,
    TopicAuthorizationFailed,
    GroupAuthorizationFailed,
    ClusterAuthorizationFailed,
    /// The timestamp of the message is out of acceptable range.
    InvalidTimestamp,
    UnsupportedSaslMechanism,
    IllegalSaslState,
    /// The requested API version is not supported by the broker.
    UnsupportedVersion,
    TopicAlreadyExists,
    InvalidPartitions,
    InvalidReplicationFactor,
    InvalidReplicaAssignment,
    InvalidConfig,
    NotController,
    InvalidRequest,
    UnsupportedForMessageFormat,
    PolicyViolation,
    /// A code the client does not recognize; carries the raw wire value.
    Other(i16),
}

impl KafkaCode {
    /// Decode the wire `error_code` field into a `KafkaCode`.
    pub fn from_code(code: i16) -> KafkaCode {
        match code {
            -1 => KafkaCode::Unknown,
            0 => KafkaCode::None,
            1 => KafkaCode::OffsetOutOfRange,
            2 => KafkaCode::CorruptMessage,
            3 => KafkaCode::UnknownTopicOrPartition,
            4 => KafkaCode::InvalidMessageSize,
            5 => KafkaCode::LeaderNotAvailable,
            6 => KafkaCode::NotLeaderForPartition,
            7 => KafkaCode::RequestTimedOut,
            8 => KafkaCode::BrokerNotAvailable,
            9 => KafkaCode::ReplicaNotAvailable,
            10 => KafkaCode::MessageSizeTooLarge,
            11 => KafkaCode::StaleControllerEpoch,
            12 => KafkaCode::OffsetMetadataTooLarge,
            13 => KafkaCode::NetworkException,
            14 => KafkaCode::GroupLoadInProgress,
            15 => KafkaCode::GroupCoordinatorNotAvailable,
            16 => KafkaCode::NotCoordinatorForGroup,
            17 => KafkaCode::InvalidTopic,
            18 => KafkaCode::RecordListTooLarge,
            19 => KafkaCode::NotEnoughReplicas,
            20 => KafkaCode::NotEnoughReplicasAfterAppend,
            21 => KafkaCode::InvalidRequiredAcks,
            22 => KafkaCode::IllegalGeneration,
            23 => KafkaCode::InconsistentGroupProtocol,
            24 => KafkaCode::InvalidGroupId,
            25 => KafkaCode::UnknownMemberId,
            26 => KafkaCode::InvalidSessionTimeout,
            27 => KafkaCode::RebalanceInProgress,
            28 => KafkaCode::InvalidCommitOffsetSize,
            29 => KafkaCode::TopicAuthorizationFailed,
            30 => KafkaCode::GroupAuthorizationFailed,
            31 => KafkaCode::ClusterAuthorizationFailed,
            32 => KafkaCode::InvalidTimestamp,
            33 => KafkaCode::UnsupportedSaslMechanism,
            34 => KafkaCode::IllegalSaslState,
            35 => KafkaCode::UnsupportedVersion,
            36 => KafkaCode::TopicAlreadyExists,
            37 => KafkaCode::InvalidPartitions,
            38 => KafkaCode::InvalidReplicationFactor,
            39 => KafkaCode::InvalidReplicaAssignment,
            40 => KafkaCode::InvalidConfig,
            41 => KafkaCode::NotController,
            42 => KafkaCode::InvalidRequest,
            43 => KafkaCode::UnsupportedForMessageFormat,
            44 => KafkaCode::PolicyViolation,
            other => KafkaCode::Other(other),
        }
    }

    /// The raw wire value for this code.
    pub fn code(&self) -> i16 {
        match *self {
            KafkaCode::Unknown => -1,
            KafkaCode::None => 0,
            KafkaCode::OffsetOutOfRange => 1,
            KafkaCode::CorruptMessage => 2,
            KafkaCode::UnknownTopicOrPartition => 3,
            KafkaCode::InvalidMessageSize => 4,
            KafkaCode::LeaderNotAvailable => 5,
            KafkaCode::NotLeaderForPartition => 6,
            KafkaCode::RequestTimedOut => 7,
            KafkaCode::BrokerNotAvailable => 8,
            KafkaCode::ReplicaNotAvailable => 9,
            KafkaCode::MessageSizeTooLarge => 10,
            KafkaCode::StaleControllerEpoch => 11,
            KafkaCode::OffsetMetadataTooLarge => 12,
            KafkaCode::NetworkException => 13,
            KafkaCode::GroupLoadInProgress => 14,
            KafkaCode::GroupCoordinatorNotAvailable => 15,
            KafkaCode::NotCoordinatorForGroup => 16,
            KafkaCode::InvalidTopic => 17,
            KafkaCode::RecordListTooLarge => 18,
            KafkaCode::NotEnoughReplicas => 19,
            KafkaCode::NotEnoughReplicasAfterAppend => 20,
            KafkaCode::InvalidRequiredAcks => 21,
            KafkaCode::IllegalGeneration => 22,
            KafkaCode::InconsistentGroupProtocol => 23,
            KafkaCode::InvalidGroupId => 24,
            KafkaCode::UnknownMemberId => 25,
            KafkaCode::InvalidSessionTimeout => 26,
            KafkaCode::RebalanceInProgress => 27,
            KafkaCode::InvalidCommitOffsetSize => 28,
            KafkaCode::TopicAuthorizationFailed => 29,
            KafkaCode::GroupAuthorizationFailed => 30,
            KafkaCode::ClusterAuthorizationFailed => 31,
            KafkaCode::InvalidTimestamp => 32,
            KafkaCode::UnsupportedSaslMechanism => 33,
            KafkaCode::IllegalSaslState => 34,
            KafkaCode::UnsupportedVersion => 35,
            KafkaCode::TopicAlreadyExists => 36,
            KafkaCode::InvalidPartitions => 37,
            KafkaCode::InvalidReplicationFactor => 38,
            KafkaCode::InvalidReplicaAssignment => 39,
            KafkaCode::InvalidConfig => 40,
            KafkaCode::NotController => 41,
            KafkaCode::InvalidRequest => 42,
            KafkaCode::UnsupportedForMessageFormat => 43,
            KafkaCode::PolicyViolation => 44,
            KafkaCode::Other(code) => code,
        }
    }

    /// Classification consulted by `Cluster`'s routed-request retry loop.
    pub fn retry_class(&self) -> RetryClass {
        match *self {
            KafkaCode::None => RetryClass::Ok,
            KafkaCode::NotLeaderForPartition | KafkaCode::LeaderNotAvailable => {
                RetryClass::RefreshMetadata
            }
            KafkaCode::UnknownTopicOrPartition => RetryClass::RefreshMetadata,
            KafkaCode::RequestTimedOut
            | KafkaCode::BrokerNotAvailable
            | KafkaCode::ReplicaNotAvailable
            | KafkaCode::NetworkException
            | KafkaCode::GroupLoadInProgress
            | KafkaCode::NotEnoughReplicas
            | KafkaCode::NotEnoughReplicasAfterAppend
            | KafkaCode::RebalanceInProgress
            | KafkaCode::GroupCoordinatorNotAvailable
            | KafkaCode::NotCoordinatorForGroup => RetryClass::Retryable,
            _ => RetryClass::Fatal,
        }
    }
}

impl fmt::Display for KafkaCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

/// How `Cluster::routed_request` should react to a classified server-side error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RetryClass {
    /// No error; the response is usable as-is.
    Ok,
    /// Transient; sleep `retry_backoff` and retry against the same leader.
    Retryable,
    /// The client's routing information is stale; invalidate the snapshot, refresh metadata,
    /// then retry.
    RefreshMetadata,
    /// Not recoverable by retrying; surface to the caller.
    Fatal,
}

error_chain!{
    foreign_links {
        Io(::std::io::Error);
        Utf8(::std::str::Utf8Error);
    }

    errors {
        /// An argument passed to the library was not valid (wrong type, out of range, or a
        /// non-binary string where a byte string was required).
        MismatchArgument(reason: String) {
            description("mismatched or invalid argument")
            display("mismatched argument: {}", reason)
        }
        /// A string intended to be treated as an opaque byte string contained non-byte text
        /// data that the codec refuses to round-trip silently.
        NotBinaryString {
            description("value is not a binary-safe string")
        }
        /// Failed to write a request to a `BrokerIo`.
        CannotSend(reason: String) {
            description("cannot send request")
            display("cannot send request: {}", reason)
        }
        /// Failed to read a response from a `BrokerIo`.
        CannotRecv(reason: String) {
            description("cannot receive response")
            display("cannot receive response: {}", reason)
        }
        /// Failed to bind or connect a `BrokerIo`.
        CannotBind(reason: String) {
            description("cannot establish connection")
            display("cannot establish connection: {}", reason)
        }
        /// An operation was attempted on a `BrokerIo` that has already been closed.
        NoConnection {
            description("no connection")
        }
        /// The literal host address does not match the requested IP version.
        IncompatibleHostIpVersion {
            description("host address incompatible with requested IP version")
        }
        /// The response's declared attributes could not be interpreted (unknown compression
        /// codec bits, reserved bits set).
        MetadataAttributes(reason: String) {
            description("invalid message attributes")
            display("invalid message attributes: {}", reason)
        }
        /// The API key on a decoded response header is not one this client understands.
        UnknownApiKey(key: i16) {
            description("unknown API key")
            display("unknown API key: {}", key)
        }
        /// Metadata could not be retrieved from any known or seed broker.
        CannotGetMetadata(reason: String) {
            description("cannot fetch cluster metadata")
            display("cannot fetch cluster metadata: {}", reason)
        }
        /// No leader is known for the requested topic/partition after exhausting retries.
        LeaderNotFound(topic: String, partition: i32) {
            description("no leader found for partition")
            display("no leader found for {}-{}", topic, partition)
        }
        /// A response's correlation id did not match the request that was sent.
        MismatchCorrelationId(expected: i32, actual: i32) {
            description("mismatched correlation id")
            display("expected correlation id {}, got {}", expected, actual)
        }
        /// The `Cluster` has no broker to contact at all (empty seed list, empty pool).
        NoKnownBrokers {
            description("no known brokers")
        }
        /// A decoded frame's declared size did not match the bytes available/consumed.
        RequestOrResponse(reason: String) {
            description("malformed request or response frame")
            display("malformed request or response frame: {}", reason)
        }
        /// A response referenced a topic the request did not ask about.
        TopicDoesNotMatch(expected: String, actual: String) {
            description("topic does not match")
            display("expected topic {}, got {}", expected, actual)
        }
        /// A response referenced a partition the request did not ask about.
        PartitionDoesNotMatch(expected: i32, actual: i32) {
            description("partition does not match")
            display("expected partition {}, got {}", expected, actual)
        }
        /// A compressed message-set could not be compressed or decompressed.
        Compression(reason: String) {
            description("compression error")
            display("compression error: {}", reason)
        }
        /// `required_acks != 0` but no `ProduceResponse` arrived before the connection closed.
        ResponseMessageNotReceived {
            description("expected response message was not received")
        }
        /// The group coordinator for a consumer group could not be located (reserved for
        /// forward compatibility; this client does not implement group coordination).
        GroupCoordinatorNotFound(group: String) {
            description("group coordinator not found")
            display("group coordinator not found for group {}", group)
        }
        /// `required_acks == 0`; the broker will never send a response, so errors in the
        /// produce path can only be transport-level, surfaced under this kind.
        SendNoAck(reason: String) {
            description("send failed without acknowledgement")
            display("send without acknowledgement failed: {}", reason)
        }
        /// A broker reported a server-side error for a request's topic/partition.
        KafkaError(code: KafkaCode) {
            description("broker reported an error")
            display("broker reported error: {}", code)
        }
    }
}
