//! Backend selection from resolved connection parameters.
//!
//! An empty key selects the "all" variant of a network backend, a non-empty
//! key selects the single-key variant. Supplying a check or sign function
//! selects the integrity variant.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::collector::{
    Collector, ConfigPublisher, DataCollector, DataPublisher, FileDataCollector, FileDataPublisher,
    StorageError, StorageResult, YamlConfigPublisher, YamlDataMergeCollector,
};
use crate::etcd::{self, KvClient};
use crate::integrity::{CheckFunc, SignFunc};
use crate::storage::{self, StorageClient};

/// An already established backend connection.
#[derive(Clone)]
pub enum Connection {
    File(PathBuf),
    Etcd(Arc<dyn KvClient>),
    Storage(Arc<dyn StorageClient>),
}

impl Connection {
    fn backend(&self) -> &'static str {
        match self {
            Connection::File(_) => "file",
            Connection::Etcd(_) => "etcd",
            Connection::Storage(_) => "config_storage",
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connection::File(path) => f.debug_tuple("File").field(path).finish(),
            other => f.write_str(other.backend()),
        }
    }
}

/// Where configuration lives inside a network backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub prefix: String,
    /// Empty for the whole-document variant.
    pub key: String,
    pub timeout: Duration,
}

impl Location {
    pub fn new(prefix: impl Into<String>, key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            key: key.into(),
            timeout,
        }
    }

    fn is_all(&self) -> bool {
        self.key.is_empty()
    }
}

/// Builds collectors, verifying values when a check function is set.
#[derive(Clone, Default)]
pub struct CollectorFactory {
    check: Option<CheckFunc>,
}

impl CollectorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_integrity(check: CheckFunc) -> Self {
        Self { check: Some(check) }
    }

    /// A raw collector for `connection`. The location is ignored by the file backend.
    pub fn data_collector(
        &self,
        connection: &Connection,
        location: &Location,
    ) -> StorageResult<Box<dyn DataCollector>> {
        let Location {
            prefix,
            key,
            timeout,
        } = location.clone();

        let collector: Box<dyn DataCollector> = match (connection, &self.check) {
            (Connection::File(_), Some(_)) => {
                return Err(StorageError::IntegrityUnsupported { backend: "file" })
            }
            (Connection::File(path), None) => Box::new(FileDataCollector::new(path.clone())),

            (Connection::Etcd(client), None) if location.is_all() => {
                Box::new(etcd::EtcdAllCollector::new(client.clone(), prefix, timeout))
            }
            (Connection::Etcd(client), None) => {
                Box::new(etcd::EtcdKeyCollector::new(client.clone(), prefix, key, timeout))
            }
            (Connection::Etcd(client), Some(check)) if location.is_all() => Box::new(
                etcd::IntegrityEtcdAllCollector::new(client.clone(), prefix, timeout, check.clone()),
            ),
            (Connection::Etcd(client), Some(check)) => Box::new(etcd::IntegrityEtcdKeyCollector::new(
                client.clone(),
                prefix,
                key,
                timeout,
                check.clone(),
            )),

            (Connection::Storage(client), None) if location.is_all() => {
                Box::new(storage::StorageAllCollector::new(client.clone(), prefix, timeout))
            }
            (Connection::Storage(client), None) => {
                Box::new(storage::StorageKeyCollector::new(client.clone(), prefix, key, timeout))
            }
            (Connection::Storage(client), Some(check)) if location.is_all() => {
                Box::new(storage::IntegrityStorageAllCollector::new(
                    client.clone(),
                    prefix,
                    timeout,
                    check.clone(),
                ))
            }
            (Connection::Storage(client), Some(check)) => {
                Box::new(storage::IntegrityStorageKeyCollector::new(
                    client.clone(),
                    prefix,
                    key,
                    timeout,
                    check.clone(),
                ))
            }
        };

        tracing::debug!(backend = connection.backend(), prefix = %location.prefix, key = %location.key, "Collector created");
        Ok(collector)
    }

    /// A decoding collector that merges every collected entry.
    pub fn collector(
        &self,
        connection: &Connection,
        location: &Location,
    ) -> StorageResult<Box<dyn Collector>> {
        let raw = self.data_collector(connection, location)?;
        Ok(Box::new(YamlDataMergeCollector::new(raw)))
    }
}

/// Builds publishers, signing values when a sign function is set.
#[derive(Clone, Default)]
pub struct PublisherFactory {
    sign: Option<SignFunc>,
}

impl PublisherFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_integrity(sign: SignFunc) -> Self {
        Self { sign: Some(sign) }
    }

    pub fn data_publisher(
        &self,
        connection: &Connection,
        location: &Location,
    ) -> StorageResult<Box<dyn DataPublisher>> {
        let Location {
            prefix,
            key,
            timeout,
        } = location.clone();

        let publisher: Box<dyn DataPublisher> = match (connection, &self.sign) {
            (Connection::File(_), Some(_)) => {
                return Err(StorageError::IntegrityUnsupported { backend: "file" })
            }
            (Connection::File(path), None) => Box::new(FileDataPublisher::new(path.clone())),

            (Connection::Etcd(client), None) if location.is_all() => {
                Box::new(etcd::EtcdAllDataPublisher::new(client.clone(), prefix, timeout))
            }
            (Connection::Etcd(client), None) => {
                Box::new(etcd::EtcdKeyDataPublisher::new(client.clone(), prefix, key, timeout))
            }
            (Connection::Etcd(client), Some(sign)) if location.is_all() => {
                Box::new(etcd::IntegrityEtcdAllDataPublisher::new(
                    client.clone(),
                    prefix,
                    timeout,
                    sign.clone(),
                ))
            }
            (Connection::Etcd(client), Some(sign)) => {
                Box::new(etcd::IntegrityEtcdKeyDataPublisher::new(
                    client.clone(),
                    prefix,
                    key,
                    timeout,
                    sign.clone(),
                ))
            }

            (Connection::Storage(client), None) if location.is_all() => {
                Box::new(storage::StorageAllDataPublisher::new(client.clone(), prefix, timeout))
            }
            (Connection::Storage(client), None) => Box::new(storage::StorageKeyDataPublisher::new(
                client.clone(),
                prefix,
                key,
                timeout,
            )),
            (Connection::Storage(client), Some(sign)) if location.is_all() => {
                Box::new(storage::IntegrityStorageAllDataPublisher::new(
                    client.clone(),
                    prefix,
                    timeout,
                    sign.clone(),
                ))
            }
            (Connection::Storage(client), Some(sign)) => {
                Box::new(storage::IntegrityStorageKeyDataPublisher::new(
                    client.clone(),
                    prefix,
                    key,
                    timeout,
                    sign.clone(),
                ))
            }
        };

        tracing::debug!(backend = connection.backend(), prefix = %location.prefix, key = %location.key, "Publisher created");
        Ok(publisher)
    }

    /// An encoding publisher over [`Self::data_publisher`].
    pub fn publisher(
        &self,
        connection: &Connection,
        location: &Location,
    ) -> StorageResult<Box<dyn ConfigPublisher>> {
        let raw = self.data_publisher(connection, location)?;
        Ok(Box::new(YamlConfigPublisher::new(raw)))
    }
}
