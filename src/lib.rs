//! Cluster configuration library.
//!
//! Models a hierarchical cluster configuration (cluster, group, replicaset,
//! instance), collects it from files, an etcd-style key-value store or a
//! config-storage service, validates it against a schema and publishes it back
//! with optimistic concurrency and optional integrity signing.

// Configuration model
pub mod cluster;
pub mod keyspace;
pub mod tree;
pub mod validation;

// Storage backends
pub mod collector;
pub mod etcd;
pub mod integrity;
pub mod storage;

// Cross-cutting concerns
pub mod observability;
pub mod resilience;
pub mod settings;

pub use cluster::ClusterConfig;
pub use collector::{Collector, ConfigPublisher, DataCollector, DataPublisher, StorageError};
pub use tree::{PathConfig, Value};
