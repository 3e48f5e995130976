#![recursion_limit = "128"]
#![allow(dead_code)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
extern crate byteorder;
extern crate crc;
extern crate twox_hash;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;

#[cfg(feature = "gzip")]
extern crate flate2;
#[cfg(feature = "snappy")]
extern crate snap;
#[cfg(feature = "lz4")]
extern crate lz4_compress;

#[cfg(test)]
extern crate pretty_env_logger;

#[macro_use]
mod errors;
mod int64;
mod crc32;
mod compression;
mod protocol;
mod network;
mod config;
mod client;
mod producer;
mod consumer;

pub mod consts {
    pub use config::{
        DEFAULT_MAX_BYTES, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_MAX_WAIT_MILLIS, DEFAULT_MIN_BYTES,
        DEFAULT_RETRY_BACKOFF_MILLIS, DEFAULT_SEND_MAX_ATTEMPTS, DEFAULT_TIMEOUT_MILLIS,
    };
    pub use network::{DEFAULT_MAX_REQUEST_SIZE, DEFAULT_TIMEOUT_MILLIS as DEFAULT_IO_TIMEOUT_MILLIS};
}

pub use errors::{Error, ErrorKind, KafkaCode, RetryClass};
pub use compression::Compression;
pub use protocol::{
    DecodedMessage, FetchOffset, Message, MessageSet, MessageTimestamp, PartitionId, RequiredAcks,
};
pub use network::{BrokerIo, IpVersion, TopicPartition, Transport};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use client::{Broker, Cluster, ClusterSnapshot};
pub use producer::{Producer, ProducerRecord};
pub use consumer::{Consumer, FetchedMessage, FetchedMessages};
