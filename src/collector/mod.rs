//! Collector / publisher abstraction over storage backends.
//!
//! # Data Flow
//! ```text
//! backend (file | etcd | config storage)
//!     → DataCollector::collect() → [Data { source, value, revision }]
//!     → YamlDataMergeCollector (decode + merge) → PathConfig
//!
//! PathConfig
//!     → YamlConfigPublisher (encode) → DataPublisher::publish(revision, bytes)
//!     → backend (atomic write, CAS for etcd "all")
//! ```
//!
//! # Design Decisions
//! - Raw and decoded contracts are separate; decoding is a decorator
//! - Backends are a closed set picked by the factories in `factory.rs`
//! - Revision 0 means "unconditional"

pub mod env;
pub mod error;
pub mod factory;
pub mod file;
pub mod yaml;

use async_trait::async_trait;

use crate::tree::PathConfig;

pub use env::EnvCollector;
pub use error::{StorageError, StorageResult};
pub use factory::{CollectorFactory, Connection, Location, PublisherFactory};
pub use file::{FileDataCollector, FileDataPublisher};
pub use yaml::{YamlCollector, YamlConfigPublisher, YamlDataMergeCollector};

/// A unit of data exchanged with a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    /// Where the value came from: a file path or a full storage key.
    pub source: String,
    pub value: Vec<u8>,
    /// Backend-assigned version used for optimistic concurrency.
    pub revision: i64,
}

/// Reads raw data from a backend.
#[async_trait]
pub trait DataCollector: Send + Sync {
    async fn collect(&self) -> StorageResult<Vec<Data>>;
}

/// Writes raw data to a backend.
#[async_trait]
pub trait DataPublisher: Send + Sync {
    /// Publish `data`. A non-zero `revision` makes the write conditional.
    async fn publish(&self, revision: i64, data: &[u8]) -> StorageResult<()>;
}

/// Produces a decoded configuration tree.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self) -> StorageResult<PathConfig>;
}

/// Publishes a configuration tree.
#[async_trait]
pub trait ConfigPublisher: Send + Sync {
    async fn publish(&self, config: &PathConfig) -> StorageResult<()>;
}
