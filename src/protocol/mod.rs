//! Request/response codecs for the four supported APIs (§6), plus the ApiVersions probe (§4.13).

pub mod codec;
mod message;
mod produce;
mod fetch;
mod offset;
mod metadata;
mod api_versions;

pub use self::codec::{ApiKeys, RequestHeader, ResponseHeader};
pub use self::message::{decode_message_set, DecodedMessage, Message, MessageSet, MessageTimestamp};
pub use self::produce::{ProducePartitionData, ProduceRequest, ProduceResponse, ProduceTopicData};
pub use self::fetch::{
    FetchPartitionData, FetchPartitionRequest, FetchRequest, FetchResponse, FetchTopicData,
};
pub use self::offset::{
    FetchOffset, OffsetPartitionRequest, OffsetPartitionResponse, OffsetRequest, OffsetResponse,
    OffsetTopicData, OffsetTopicResponse,
};
pub use self::metadata::{
    BrokerMetadata, MetadataRequest, MetadataResponse, PartitionMetadata, TopicMetadata,
};
pub use self::api_versions::{ApiVersionsRequest, ApiVersionsResponse, SupportedApiVersion};

/// An identifier for a partition within a topic.
pub type PartitionId = i32;

/// A monotonic record position within a partition.
pub type Offset = i64;

/// Acknowledgement requirements for a produce call (§6.3, §6.8).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequiredAcks {
    /// Fire-and-forget: the broker sends no response at all.
    None,
    /// Wait for the partition leader to write the messages to its local log.
    One,
    /// Wait for every in-sync replica to acknowledge the messages.
    All,
}

impl RequiredAcks {
    pub fn code(&self) -> i16 {
        match *self {
            RequiredAcks::None => 0,
            RequiredAcks::One => 1,
            RequiredAcks::All => -1,
        }
    }
}
