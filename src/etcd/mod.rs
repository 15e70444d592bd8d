//! Coordination service (etcd) backend.
//!
//! # Responsibilities
//! - Collect configuration stored under `<prefix>/config/`
//! - Publish a whole document atomically, leaving exactly one key under the prefix
//! - Publish a single key with optimistic concurrency on its modification revision
//! - Sign and verify values when an integrity function is supplied
//!
//! # Design Decisions
//! - The network client is a trait, so the protocol runs unchanged against [`MemoryKv`]
//! - Every call is bounded by the caller's timeout; the "all" retry loop shares one deadline
//! - Only the "all" publish retries; a key publish reports a wrong revision to the caller

pub mod client;
pub mod collector;
pub mod integrity;
pub mod memory;
pub mod publisher;

pub use client::{Compare, KeyValue, KvClient, KvError, Txn, TxnOp, TxnOpResponse, TxnResponse};
pub use collector::{EtcdAllCollector, EtcdKeyCollector};
pub use integrity::{
    IntegrityEtcdAllCollector, IntegrityEtcdAllDataPublisher, IntegrityEtcdKeyCollector,
    IntegrityEtcdKeyDataPublisher,
};
pub use memory::MemoryKv;
pub use publisher::{EtcdAllDataPublisher, EtcdKeyDataPublisher};

pub(crate) const BACKEND: &str = "etcd";
