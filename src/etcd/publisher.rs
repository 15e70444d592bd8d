//! Coordination service publishers.
//!
//! # Data Flow
//! ```text
//! "all":  loop until committed or the deadline passes
//!           get <prefix>/config/*            (key, mod_revision)
//!           txn if every stale key is unchanged
//!               then delete stale keys, put <prefix>/config/all
//!
//! "key":  txn if mod_revision(<prefix>/config/<key>) == revision
//!             then put <prefix>/config/<key>
//!         else WrongRevision
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::collector::{DataPublisher, StorageError, StorageResult};
use crate::etcd::client::{Compare, KeyValue, KvClient, Txn, TxnOp};
use crate::etcd::BACKEND;
use crate::keyspace;
use crate::observability::metrics;
use crate::resilience::timeouts::{with_timeout, Deadline};

/// Guards and deletions for every key in `current` that is not a target.
pub(crate) fn stale(current: &[KeyValue], targets: &[String]) -> (Vec<Compare>, Vec<TxnOp>) {
    current
        .iter()
        .filter(|kv| !targets.contains(&kv.key))
        .map(|kv| {
            (
                Compare::mod_revision(kv.key.clone(), kv.mod_revision),
                TxnOp::delete(kv.key.clone()),
            )
        })
        .unzip()
}

/// Replaces everything under `<prefix>/config/` with a single `all` key.
pub struct EtcdAllDataPublisher {
    client: Arc<dyn KvClient>,
    prefix: String,
    timeout: Duration,
}

impl EtcdAllDataPublisher {
    pub fn new(client: Arc<dyn KvClient>, prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            timeout,
        }
    }

    async fn replace(&self, data: &[u8]) -> StorageResult<()> {
        let prefix = keyspace::config_prefix(&self.prefix);
        let target = keyspace::config_key(&self.prefix, keyspace::ALL_KEY);
        let targets = [target.clone()];
        let deadline = Deadline::after(self.timeout);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let current = deadline
                .run("get", &prefix, self.client.get(&prefix, true))
                .await?;

            let (compare, mut ops) = stale(&current, &targets);
            ops.push(TxnOp::put(target.clone(), data));
            let txn = Txn::new().when(compare).and_then(ops);

            let response = deadline.run("txn", &target, self.client.txn(txn)).await?;
            if response.succeeded {
                tracing::info!(key = %target, attempt, "Configuration published");
                return Ok(());
            }

            metrics::record_cas_conflict(BACKEND);
            tracing::debug!(prefix = %prefix, attempt, "Keys changed concurrently, retrying publish");
        }
    }
}

#[async_trait]
impl DataPublisher for EtcdAllDataPublisher {
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
pub struct EtcdKeyDataPublisher {
    client: Arc<dyn KvClient>,
    prefix: String,
    key: String,
    timeout: Duration,
}

impl EtcdKeyDataPublisher {
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

    async fn write(&self, revision: i64, data: &[u8]) -> StorageResult<()> {
        let key = keyspace::config_key(&self.prefix, &self.key);
        let mut txn = Txn::new().and_then(vec![TxnOp::put(key.clone(), data)]);
        if revision != 0 {
            txn = txn.when(vec![Compare::mod_revision(key.clone(), revision)]);
        }

        let response = with_timeout(self.timeout, "txn", &key, self.client.txn(txn)).await?;
        if !response.succeeded {
            return Err(StorageError::WrongRevision { key, revision });
        }
        tracing::info!(key = %key, revision, "Configuration published");
        Ok(())
    }
}

#[async_trait]
impl DataPublisher for EtcdKeyDataPublisher {
    async fn publish(&self, revision: i64, data: &[u8]) -> StorageResult<()> {
        let result = self.write(revision, data).await;
        metrics::record_publish(BACKEND, &result);
        result
    }
}
