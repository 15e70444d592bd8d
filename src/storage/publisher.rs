//! Config-storage publishers.
//!
//! The "all" publish is a single server-side transaction: delete everything
//! under `<prefix>/config/`, then put `<prefix>/config/all`. A key publish with
//! a revision is guarded by a `mod_revision` predicate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::collector::{DataPublisher, StorageError, StorageResult};
use crate::keyspace;
use crate::observability::metrics;
use crate::storage::client::{self, Operation, Predicate, StorageClient, TxnRequest};
use crate::storage::BACKEND;

/// Replaces everything under `<prefix>/config/` with a single `all` path.
pub struct StorageAllDataPublisher {
    client: Arc<dyn StorageClient>,
    prefix: String,
    timeout: Duration,
}

impl StorageAllDataPublisher {
    pub fn new(client: Arc<dyn StorageClient>, prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            timeout,
        }
    }

    async fn replace(&self, data: &[u8]) -> StorageResult<()> {
        let prefix = keyspace::config_prefix(&self.prefix);
        let target = keyspace::config_key(&self.prefix, keyspace::ALL_KEY);
        let request = TxnRequest {
            on_success: vec![
                Operation::Delete(prefix.clone()),
                Operation::Put(target.clone(), client::text(&target, data)?),
            ],
            ..TxnRequest::default()
        };

        let response = client::txn(self.client.as_ref(), self.timeout, &prefix, &request).await?;
        if !response.data.is_success {
            return Err(StorageError::Response {
                operation: client::TXN.to_string(),
                message: format!("transaction for {} was not applied", prefix),
            });
        }
        tracing::info!(key = %target, revision = response.revision, "Configuration published");
        Ok(())
    }
}

#[async_trait]
impl DataPublisher for StorageAllDataPublisher {
    async fn publish(&self, revision: i64, data: &[u8]) -> StorageResult<()> {
        if revision != 0 {
            return Err(StorageError::RevisionUnsupported {
                target: keyspace::config_prefix(&self.prefix),
            });
        }
        let result = self.replace(data).await;
        metrics::record_publish(BACKEND, &result);
        result
    }
}

/// Writes `<prefix>/config/<key>`, conditionally when a revision is given.
pub struct StorageKeyDataPublisher {
    client: Arc<dyn StorageClient>,
    prefix: String,
    key: String,
    timeout: Duration,
}

impl StorageKeyDataPublisher {
    pub fn new(
        client: Arc<dyn StorageClient>,
        prefix: impl Into<String>,
        key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            key: key.into(),
            timeout,
        }
    }

    async fn write(&self, revision: i64, data: &[u8]) -> StorageResult<()> {
        let key = keyspace::config_key(&self.prefix, &self.key);
        let value = client::text(&key, data)?;

        if revision == 0 {
            let response = client::put(self.client.as_ref(), self.timeout, &key, &value).await?;
            tracing::info!(key = %key, revision = response.revision, "Configuration published");
            return Ok(());
        }

        let request = TxnRequest {
            predicates: vec![Predicate {
                path: key.clone(),
                mod_revision: revision,
            }],
            on_success: vec![Operation::Put(key.clone(), value)],
            ..TxnRequest::default()
        };
        let response = client::txn(self.client.as_ref(), self.timeout, &key, &request).await?;
        if !response.data.is_success {
            return Err(StorageError::WrongRevision { key, revision });
        }
        tracing::info!(key = %key, revision = response.revision, "Configuration published");
        Ok(())
    }
}

#[async_trait]
impl DataPublisher for StorageKeyDataPublisher {
    async fn publish(&self, revision: i64, data: &[u8]) -> StorageResult<()> {
        let result = self.write(revision, data).await;
        metrics::record_publish(BACKEND, &result);
        result
    }
}
