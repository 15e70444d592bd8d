//! Signed values on the coordination service.
//!
//! # Data Flow
//! ```text
//! collect: txn [get config/*, get hashes/*, get sig/*]
//!              → integrity::assemble → CheckFunc per key → [Data]
//!
//! publish "all": SignFunc(data) → (hashes, signature)
//!     txn if every stale key is unchanged
//!         then delete stale keys in all three namespaces, put value, hashes, signature
//!         else get config/*, hashes/*, sig/*   (fresh state for the next round)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::collector::{Data, DataCollector, DataPublisher, StorageError, StorageResult};
use crate::etcd::client::{Compare, KeyValue, KvClient, Txn, TxnOp};
use crate::etcd::publisher::stale;
use crate::etcd::BACKEND;
use crate::integrity::{self, CheckFunc, SignFunc, Signed, StoredEntry};
use crate::keyspace;
use crate::observability::metrics;
use crate::resilience::timeouts::{with_timeout, Deadline};

fn stored(kvs: Vec<KeyValue>) -> Vec<StoredEntry> {
    kvs.into_iter()
        .map(|kv| StoredEntry {
            key: kv.key,
            value: kv.value,
            revision: kv.mod_revision,
        })
        .collect()
}

/// Read the three namespaces returned by one transaction, in order.
fn split_ranges(ranges: Vec<Vec<KeyValue>>) -> StorageResult<[Vec<KeyValue>; 3]> {
    let count = ranges.len();
    <[Vec<KeyValue>; 3]>::try_from(ranges).map_err(|_| StorageError::Response {
        operation: "txn".to_string(),
        message: format!("expected 3 ranges, got {}", count),
    })
}

/// Puts of a value together with its integrity metadata.
fn signed_puts(prefix: &str, key: &str, data: &[u8], signed: Signed) -> Vec<TxnOp> {
    let mut ops = vec![TxnOp::put(keyspace::config_key(prefix, key), data)];
    for (algorithm, hash) in signed.hashes {
        ops.push(TxnOp::put(keyspace::hash_key(prefix, &algorithm, key), hash));
    }
    ops.push(TxnOp::put(keyspace::sig_key(prefix, key), signed.signature));
    ops
}

fn signed_keys(prefix: &str, key: &str, signed: &Signed) -> Vec<String> {
    let mut keys = vec![keyspace::config_key(prefix, key)];
    keys.extend(
        signed
            .hashes
            .keys()
            .map(|algorithm| keyspace::hash_key(prefix, algorithm, key)),
    );
    keys.push(keyspace::sig_key(prefix, key));
    keys
}

/// Collects and verifies every value under the prefix.
pub struct IntegrityEtcdAllCollector {
    client: Arc<dyn KvClient>,
    prefix: String,
    timeout: Duration,
    check: CheckFunc,
}

impl IntegrityEtcdAllCollector {
    pub fn new(
        client: Arc<dyn KvClient>,
        prefix: impl Into<String>,
        timeout: Duration,
        check: CheckFunc,
    ) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            timeout,
            check,
        }
    }

    async fn read(&self) -> StorageResult<Vec<Data>> {
        let config_prefix = keyspace::config_prefix(&self.prefix);
        tracing::debug!(prefix = %config_prefix, "Collecting signed configuration keys");

        let txn = Txn::new().and_then(vec![
            TxnOp::get_prefix(config_prefix.clone()),
            TxnOp::get_prefix(keyspace::hashes_prefix(&self.prefix)),
            TxnOp::get_prefix(keyspace::sig_prefix(&self.prefix)),
        ]);
        let response = with_timeout(self.timeout, "txn", &config_prefix, self.client.txn(txn)).await?;
        let [values, hashes, signatures] = split_ranges(response.ranges())?;
        if values.is_empty() {
            return Err(StorageError::Empty {
                origin: config_prefix,
            });
        }

        let entries = integrity::assemble(&self.prefix, stored(values), stored(hashes), stored(signatures));
        integrity::verify(&self.check, entries, BACKEND)
    }
}

#[async_trait]
impl DataCollector for IntegrityEtcdAllCollector {
    async fn collect(&self) -> StorageResult<Vec<Data>> {
        let result = self.read().await;
        metrics::record_collect(BACKEND, &result);
        result
    }
}

/// Collects and verifies a single value.
pub struct IntegrityEtcdKeyCollector {
    client: Arc<dyn KvClient>,
    prefix: String,
    key: String,
    timeout: Duration,
    check: CheckFunc,
}

impl IntegrityEtcdKeyCollector {
    pub fn new(
        client: Arc<dyn KvClient>,
        prefix: impl Into<String>,
        key: impl Into<String>,
        timeout: Duration,
        check: CheckFunc,
    ) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            key: key.into(),
            timeout,
            check,
        }
    }

    async fn read(&self) -> StorageResult<Vec<Data>> {
        let key = keyspace::config_key(&self.prefix, &self.key);
        tracing::debug!(key = %key, "Collecting signed configuration key");

        let txn = Txn::new().and_then(vec![
            TxnOp::get(key.clone()),
            // Hashes are laid out by algorithm first, so there is no per-key range to read.
            TxnOp::get_prefix(keyspace::hashes_prefix(&self.prefix)),
            TxnOp::get(keyspace::sig_key(&self.prefix, &self.key)),
        ]);
        let response = with_timeout(self.timeout, "txn", &key, self.client.txn(txn)).await?;
        let [values, hashes, signatures] = split_ranges(response.ranges())?;
        match values.len() {
            0 => return Err(StorageError::Empty { origin: key }),
            1 => {}
            count => return Err(StorageError::TooMany { origin: key, count }),
        }

        let hashes = hashes
            .into_iter()
            .filter(|kv| {
                keyspace::hash_owner(&self.prefix, &kv.key).is_some_and(|(_, name)| name == self.key)
            })
            .collect();
        let entries = integrity::assemble(&self.prefix, stored(values), stored(hashes), stored(signatures));
        integrity::verify(&self.check, entries, BACKEND)
    }
}

#[async_trait]
impl DataCollector for IntegrityEtcdKeyCollector {
    async fn collect(&self) -> StorageResult<Vec<Data>> {
        let result = self.read().await;
        metrics::record_collect(BACKEND, &result);
        result
    }
}

/// Signs the document and replaces every value, hash and signature under the prefix.
pub struct IntegrityEtcdAllDataPublisher {
    client: Arc<dyn KvClient>,
    prefix: String,
    timeout: Duration,
    sign: SignFunc,
}

impl IntegrityEtcdAllDataPublisher {
    pub fn new(
        client: Arc<dyn KvClient>,
        prefix: impl Into<String>,
        timeout: Duration,
        sign: SignFunc,
    ) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            timeout,
            sign,
        }
    }

    fn reads(&self) -> Vec<TxnOp> {
        vec![
            TxnOp::get_prefix(keyspace::config_prefix(&self.prefix)),
            TxnOp::get_prefix(keyspace::hashes_prefix(&self.prefix)),
            TxnOp::get_prefix(keyspace::sig_prefix(&self.prefix)),
        ]
    }

    async fn replace(&self, data: &[u8]) -> StorageResult<()> {
        let signed = integrity::sign(&self.sign, data)?;
        let targets = signed_keys(&self.prefix, keyspace::ALL_KEY, &signed);
        let puts = signed_puts(&self.prefix, keyspace::ALL_KEY, data, signed);
        let target = targets[0].clone();
        let deadline = Deadline::after(self.timeout);

        let initial = Txn::new().and_then(self.reads());
        let response = deadline.run("txn", &target, self.client.txn(initial)).await?;
        let mut current = response.ranges().concat();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let (compare, mut ops): (Vec<Compare>, Vec<TxnOp>) = stale(&current, &targets);
            ops.extend(puts.iter().cloned());
            let txn = Txn::new().when(compare).and_then(ops).or_else(self.reads());

            let response = deadline.run("txn", &target, self.client.txn(txn)).await?;
            if response.succeeded {
                tracing::info!(key = %target, attempt, "Signed configuration published");
                return Ok(());
            }

            metrics::record_cas_conflict(BACKEND);
            tracing::debug!(prefix = %self.prefix, attempt, "Keys changed concurrently, retrying publish");
            current = response.ranges().concat();
        }
    }
}

#[async_trait]
impl DataPublisher for IntegrityEtcdAllDataPublisher {
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

/// Signs and writes a single value, conditionally when a revision is given.
pub struct IntegrityEtcdKeyDataPublisher {
    client: Arc<dyn KvClient>,
    prefix: String,
    key: String,
    timeout: Duration,
    sign: SignFunc,
}

impl IntegrityEtcdKeyDataPublisher {
    pub fn new(
        client: Arc<dyn KvClient>,
        prefix: impl Into<String>,
        key: impl Into<String>,
        timeout: Duration,
        sign: SignFunc,
    ) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            key: key.into(),
            timeout,
            sign,
        }
    }

    async fn write(&self, revision: i64, data: &[u8]) -> StorageResult<()> {
        let signed = integrity::sign(&self.sign, data)?;
        let key = keyspace::config_key(&self.prefix, &self.key);
        let mut txn = Txn::new().and_then(signed_puts(&self.prefix, &self.key, data, signed));
        if revision != 0 {
            txn = txn.when(vec![Compare::mod_revision(key.clone(), revision)]);
        }

        let response = with_timeout(self.timeout, "txn", &key, self.client.txn(txn)).await?;
        if !response.succeeded {
            return Err(StorageError::WrongRevision { key, revision });
        }
        tracing::info!(key = %key, revision, "Signed configuration published");
        Ok(())
    }
}

#[async_trait]
impl DataPublisher for IntegrityEtcdKeyDataPublisher {
    async fn publish(&self, revision: i64, data: &[u8]) -> StorageResult<()> {
        let result = self.write(revision, data).await;
        metrics::record_publish(BACKEND, &result);
        result
    }
}
