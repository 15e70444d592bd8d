//! Coordination service collectors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::collector::{Data, DataCollector, StorageError, StorageResult};
use crate::etcd::client::{KeyValue, KvClient};
use crate::etcd::BACKEND;
use crate::keyspace;
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;

fn to_data(kv: KeyValue) -> Data {
    Data {
        source: kv.key,
        value: kv.value,
        revision: kv.mod_revision,
    }
}

/// Collects every key under `<prefix>/config/`.
pub struct EtcdAllCollector {
    client: Arc<dyn KvClient>,
    prefix: String,
    timeout: Duration,
}

impl EtcdAllCollector {
    pub fn new(client: Arc<dyn KvClient>, prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            timeout,
        }
    }

    async fn read(&self) -> StorageResult<Vec<Data>> {
        let prefix = keyspace::config_prefix(&self.prefix);
        tracing::debug!(prefix = %prefix, "Collecting configuration keys");

        let kvs = with_timeout(self.timeout, "get", &prefix, self.client.get(&prefix, true)).await?;
        if kvs.is_empty() {
            return Err(StorageError::Empty { origin: prefix });
        }
        Ok(kvs.into_iter().map(to_data).collect())
    }
}

#[async_trait]
impl DataCollector for EtcdAllCollector {
    async fn collect(&self) -> StorageResult<Vec<Data>> {
        let result = self.read().await;
        metrics::record_collect(BACKEND, &result);
        result
    }
}

/// Collects exactly one key, `<prefix>/config/<key>`.
pub struct EtcdKeyCollector {
    client: Arc<dyn KvClient>,
    prefix: String,
    key: String,
    timeout: Duration,
}

impl EtcdKeyCollector {
    pub fn new(
        client: Arc<dyn KvClient>,
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
        tracing::debug!(key = %key, "Collecting configuration key");

        let kvs = with_timeout(self.timeout, "get", &key, self.client.get(&key, false)).await?;
        match kvs.len() {
            0 => Err(StorageError::Empty { origin: key }),
            1 => Ok(kvs.into_iter().map(to_data).collect()),
            count => Err(StorageError::TooMany { origin: key, count }),
        }
    }
}

#[async_trait]
impl DataCollector for EtcdKeyCollector {
    async fn collect(&self) -> StorageResult<Vec<Data>> {
        let result = self.read().await;
        metrics::record_collect(BACKEND, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etcd::MemoryKv;

    async fn seeded() -> Arc<MemoryKv> {
        let kv = Arc::new(MemoryKv::new());
        kv.put("/tt/config/a", b"a: 1\n").await.unwrap();
        kv.put("/tt/config/b", b"b: 2\n").await.unwrap();
        kv.put("/tt/other", b"c: 3\n").await.unwrap();
        kv
    }

    #[tokio::test]
    async fn test_all_collects_prefix_only() {
        let kv = seeded().await;
        let data = EtcdAllCollector::new(kv, "/tt", Duration::from_secs(1))
            .collect()
            .await
            .unwrap();

        let sources: Vec<&str> = data.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["/tt/config/a", "/tt/config/b"]);
        assert_eq!(data[0].revision, 1);
    }

    #[tokio::test]
    async fn test_all_on_empty_prefix() {
        let kv = Arc::new(MemoryKv::new());
        let err = EtcdAllCollector::new(kv, "/tt/", Duration::from_secs(1))
            .collect()
            .await
            .unwrap_err();
        assert!(err.is_empty());
        assert!(err.to_string().contains("/tt/config/"));
    }

    #[tokio::test]
    async fn test_key_collects_one() {
        let kv = seeded().await;
        let data = EtcdKeyCollector::new(kv, "/tt", "b", Duration::from_secs(1))
            .collect()
            .await
            .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].value, b"b: 2\n".to_vec());
        assert_eq!(data[0].revision, 2);
    }

    #[tokio::test]
    async fn test_missing_key_is_empty() {
        let kv = seeded().await;
        let err = EtcdKeyCollector::new(kv, "/tt", "zzz", Duration::from_secs(1))
            .collect()
            .await
            .unwrap_err();
        assert!(err.is_empty());
    }
}
