//! Config-storage collectors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::collector::{Data, DataCollector, StorageError, StorageResult};
use crate::keyspace;
use crate::observability::metrics;
use crate::storage::client::{self, StorageClient, StoredValue};
use crate::storage::BACKEND;

pub(crate) fn to_data(stored: StoredValue) -> Data {
    Data {
        source: stored.path,
        value: stored.value.into_bytes(),
        revision: stored.mod_revision,
    }
}

/// Collects every path under `<prefix>/config/`.
pub struct StorageAllCollector {
    client: Arc<dyn StorageClient>,
    prefix: String,
    timeout: Duration,
}

impl StorageAllCollector {
    pub fn new(client: Arc<dyn StorageClient>, prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            timeout,
        }
    }

    async fn read(&self) -> StorageResult<Vec<Data>> {
        let prefix = keyspace::config_prefix(&self.prefix);
        tracing::debug!(prefix = %prefix, "Collecting configuration from config storage");

        let response = client::get(self.client.as_ref(), self.timeout, &prefix).await?;
        if response.data.is_empty() {
            return Err(StorageError::Empty { origin: prefix });
        }
        Ok(response.data.into_iter().map(to_data).collect())
    }
}

#[async_trait]
impl DataCollector for StorageAllCollector {
    async fn collect(&self) -> StorageResult<Vec<Data>> {
        let result = self.read().await;
        metrics::record_collect(BACKEND, &result);
        result
    }
}

/// Collects exactly one path, `<prefix>/config/<key>`.
pub struct StorageKeyCollector {
    client: Arc<dyn StorageClient>,
    prefix: String,
    key: String,
    timeout: Duration,
}

impl StorageKeyCollector {
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

    async fn read(&self) -> StorageResult<Vec<Data>> {
        let key = keyspace::config_key(&self.prefix, &self.key);
        tracing::debug!(key = %key, "Collecting configuration key from config storage");

        let response = client::get(self.client.as_ref(), self.timeout, &key).await?;
        match response.data.len() {
            0 => Err(StorageError::Empty { origin: key }),
            1 => Ok(response.data.into_iter().map(to_data).collect()),
            count => Err(StorageError::TooMany { origin: key, count }),
        }
    }
}

#[async_trait]
impl DataCollector for StorageKeyCollector {
    async fn collect(&self) -> StorageResult<Vec<Data>> {
        let result = self.read().await;
        metrics::record_collect(BACKEND, &result);
        result
    }
}
