//! Signed values on the config-storage service.
//!
//! Hashes and signatures are stored hex-encoded, since stored values are text.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::collector::{Data, DataCollector, DataPublisher, StorageError, StorageResult};
use crate::integrity::{self, CheckFunc, SignFunc, Signed, StoredEntry};
use crate::keyspace;
use crate::observability::metrics;
use crate::storage::client::{self, Operation, Predicate, StorageClient, StoredValue, TxnRequest};
use crate::storage::BACKEND;

fn plain(values: Vec<StoredValue>) -> Vec<StoredEntry> {
    values
        .into_iter()
        .map(|v| StoredEntry {
            key: v.path,
            value: v.value.into_bytes(),
            revision: v.mod_revision,
        })
        .collect()
}

fn decoded(values: Vec<StoredValue>) -> StorageResult<Vec<StoredEntry>> {
    values
        .into_iter()
        .map(|v| {
            let value = hex::decode(&v.value).map_err(|e| StorageError::Integrity {
                key: v.path.clone(),
                message: format!("invalid hex encoding: {}", e),
            })?;
            Ok(StoredEntry {
                key: v.path,
                value,
                revision: v.mod_revision,
            })
        })
        .collect()
}

fn signed_puts(prefix: &str, key: &str, value: String, signed: Signed) -> Vec<Operation> {
    let mut ops = vec![Operation::Put(keyspace::config_key(prefix, key), value)];
    for (algorithm, hash) in signed.hashes {
        ops.push(Operation::Put(
            keyspace::hash_key(prefix, &algorithm, key),
            hex::encode(hash),
        ));
    }
    ops.push(Operation::Put(
        keyspace::sig_key(prefix, key),
        hex::encode(signed.signature),
    ));
    ops
}

/// Drop hashes and signatures of values that were not read, before they are decoded.
fn retain_owned(
    prefix: &str,
    values: &[StoredValue],
    hashes: &mut Vec<StoredValue>,
    signatures: &mut Vec<StoredValue>,
) {
    let names: BTreeSet<&str> = values
        .iter()
        .filter_map(|v| keyspace::config_name(prefix, &v.path))
        .collect();
    hashes.retain(|h| keyspace::hash_owner(prefix, &h.path).is_some_and(|(_, name)| names.contains(name)));
    signatures.retain(|s| keyspace::sig_owner(prefix, &s.path).is_some_and(|name| names.contains(name)));
}

/// Run a read-only transaction and verify what it returned.
async fn read_verified(
    storage: &dyn StorageClient,
    timeout: Duration,
    prefix: &str,
    target: &str,
    reads: Vec<Operation>,
    check: &CheckFunc,
    single: bool,
) -> StorageResult<Vec<Data>> {
    let request = TxnRequest {
        on_success: reads,
        ..TxnRequest::default()
    };
    let response = client::txn(storage, timeout, target, &request).await?;
    let ranges = response.data.ranges().map_err(|e| StorageError::Response {
        operation: client::TXN.to_string(),
        message: e.to_string(),
    })?;
    let count = ranges.len();
    let [values, mut hashes, mut signatures] =
        <[Vec<StoredValue>; 3]>::try_from(ranges).map_err(|_| StorageError::Response {
            operation: client::TXN.to_string(),
            message: format!("expected 3 ranges, got {}", count),
        })?;

    match values.len() {
        0 => {
            return Err(StorageError::Empty {
                origin: target.to_string(),
            })
        }
        count if single && count > 1 => {
            return Err(StorageError::TooMany {
                origin: target.to_string(),
                count,
            })
        }
        _ => {}
    }

    retain_owned(prefix, &values, &mut hashes, &mut signatures);
    let entries = integrity::assemble(prefix, plain(values), decoded(hashes)?, decoded(signatures)?);
    integrity::verify(check, entries, BACKEND)
}

/// Collects and verifies every value under the prefix.
pub struct IntegrityStorageAllCollector {
    client: Arc<dyn StorageClient>,
    prefix: String,
    timeout: Duration,
    check: CheckFunc,
}

impl IntegrityStorageAllCollector {
    pub fn new(
        client: Arc<dyn StorageClient>,
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
}

#[async_trait]
impl DataCollector for IntegrityStorageAllCollector {
    async fn collect(&self) -> StorageResult<Vec<Data>> {
        let target = keyspace::config_prefix(&self.prefix);
        let reads = vec![
            Operation::Get(target.clone()),
            Operation::Get(keyspace::hashes_prefix(&self.prefix)),
            Operation::Get(keyspace::sig_prefix(&self.prefix)),
        ];
        let result = read_verified(
            self.client.as_ref(),
            self.timeout,
            &self.prefix,
            &target,
            reads,
            &self.check,
            false,
        )
        .await;
        metrics::record_collect(BACKEND, &result);
        result
    }
}

/// Collects and verifies a single value.
pub struct IntegrityStorageKeyCollector {
    client: Arc<dyn StorageClient>,
    prefix: String,
    key: String,
    timeout: Duration,
    check: CheckFunc,
}

impl IntegrityStorageKeyCollector {
    pub fn new(
        client: Arc<dyn StorageClient>,
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
}

#[async_trait]
impl DataCollector for IntegrityStorageKeyCollector {
    async fn collect(&self) -> StorageResult<Vec<Data>> {
        let target = keyspace::config_key(&self.prefix, &self.key);
        let reads = vec![
            Operation::Get(target.clone()),
            Operation::Get(keyspace::hashes_prefix(&self.prefix)),
            Operation::Get(keyspace::sig_key(&self.prefix, &self.key)),
        ];
        let result = read_verified(
            self.client.as_ref(),
            self.timeout,
            &self.prefix,
            &target,
            reads,
            &self.check,
            true,
        )
        .await;
        metrics::record_collect(BACKEND, &result);
        result
    }
}

/// Signs the document and replaces every value, hash and signature under the prefix.
pub struct IntegrityStorageAllDataPublisher {
    client: Arc<dyn StorageClient>,
    prefix: String,
    timeout: Duration,
    sign: SignFunc,
}

impl IntegrityStorageAllDataPublisher {
    pub fn new(
        client: Arc<dyn StorageClient>,
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

    async fn replace(&self, data: &[u8]) -> StorageResult<()> {
        let target = keyspace::config_key(&self.prefix, keyspace::ALL_KEY);
        let value = client::text(&target, data)?;
        let signed = integrity::sign(&self.sign, data)?;

        let mut on_success = vec![
            Operation::Delete(keyspace::config_prefix(&self.prefix)),
            Operation::Delete(keyspace::hashes_prefix(&self.prefix)),
            Operation::Delete(keyspace::sig_prefix(&self.prefix)),
        ];
        on_success.extend(signed_puts(&self.prefix, keyspace::ALL_KEY, value, signed));
        let request = TxnRequest {
            on_success,
            ..TxnRequest::default()
        };

        let response = client::txn(self.client.as_ref(), self.timeout, &target, &request).await?;
        if !response.data.is_success {
            return Err(StorageError::Response {
                operation: client::TXN.to_string(),
                message: format!("transaction for {} was not applied", target),
            });
        }
        tracing::info!(key = %target, revision = response.revision, "Signed configuration published");
        Ok(())
    }
}

#[async_trait]
impl DataPublisher for IntegrityStorageAllDataPublisher {
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
pub struct IntegrityStorageKeyDataPublisher {
    client: Arc<dyn StorageClient>,
    prefix: String,
    key: String,
    timeout: Duration,
    sign: SignFunc,
}

impl IntegrityStorageKeyDataPublisher {
    pub fn new(
        client: Arc<dyn StorageClient>,
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
        let key = keyspace::config_key(&self.prefix, &self.key);
        let value = client::text(&key, data)?;
        let signed = integrity::sign(&self.sign, data)?;

        let mut request = TxnRequest {
            on_success: signed_puts(&self.prefix, &self.key, value, signed),
            ..TxnRequest::default()
        };
        if revision != 0 {
            request.predicates.push(Predicate {
                path: key.clone(),
                mod_revision: revision,
            });
        }

        let response = client::txn(self.client.as_ref(), self.timeout, &key, &request).await?;
        if !response.data.is_success {
            return Err(StorageError::WrongRevision { key, revision });
        }
        tracing::info!(key = %key, revision = response.revision, "Signed configuration published");
        Ok(())
    }
}

#[async_trait]
impl DataPublisher for IntegrityStorageKeyDataPublisher {
    async fn publish(&self, revision: i64, data: &[u8]) -> StorageResult<()> {
        let result = self.write(revision, data).await;
        metrics::record_publish(BACKEND, &result);
        result
    }
}
