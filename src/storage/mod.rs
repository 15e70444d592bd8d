//! Database config-storage service backend.
//!
//! # Responsibilities
//! - Collect and publish configuration through `config.storage.*` calls
//! - Express the "all" replace as one server-side transaction
//! - Guard key publishes with `mod_revision` predicates
//! - Sign and verify values when an integrity function is supplied
//!
//! # Design Decisions
//! - The RPC connection is a trait; [`MemoryStorage`] answers the same calls in process
//! - Responses are decoded into typed structures; anything else is a `Response` error

pub mod client;
pub mod collector;
pub mod integrity;
pub mod memory;
pub mod publisher;

pub use client::{CallError, StorageClient, StoredValue};
pub use collector::{StorageAllCollector, StorageKeyCollector};
pub use integrity::{
    IntegrityStorageAllCollector, IntegrityStorageAllDataPublisher, IntegrityStorageKeyCollector,
    IntegrityStorageKeyDataPublisher,
};
pub use memory::MemoryStorage;
pub use publisher::{StorageAllDataPublisher, StorageKeyDataPublisher};

pub(crate) const BACKEND: &str = "config_storage";
