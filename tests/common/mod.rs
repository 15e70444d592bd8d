//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use cluster_config::etcd::{KeyValue, KvClient, KvError, MemoryKv, Txn, TxnResponse};
use cluster_config::integrity::{CheckFunc, Hashes, SignFunc, Signed};

pub const PREFIX: &str = "/tt";
pub const TIMEOUT: Duration = Duration::from_secs(1);

const SECRET: &[u8] = b"test-signing-key";

/// A three-level topology with `wal.dir` set at every scope.
pub const CLUSTER_YAML: &str = r#"
wal:
  dir: cluster
groups:
  storages:
    wal:
      dir: group
    replicasets:
      s-001:
        wal:
          dir: replicaset
        instances:
          s-001-a:
            wal:
              dir: instance
          s-001-b: {}
"#;

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn signature(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(SECRET);
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Signs with a sha256 hash and a keyed sha256 signature.
pub fn sha256_signer() -> SignFunc {
    Arc::new(|data: &[u8]| {
        let mut hashes = BTreeMap::new();
        hashes.insert("sha256".to_string(), Sha256::digest(data).to_vec());
        Ok::<_, String>(Signed {
            hashes,
            signature: signature(data),
        })
    })
}

/// Verifies what [`sha256_signer`] produced.
pub fn sha256_checker() -> CheckFunc {
    Arc::new(|data: &[u8], hashes: &Hashes, sig: &[u8]| {
        let expected = Sha256::digest(data).to_vec();
        match hashes.get("sha256") {
            Some(hash) if *hash == expected => {}
            Some(hash) => {
                return Err(format!(
                    "sha256 mismatch: stored {}, computed {}",
                    hex::encode(hash),
                    hex::encode(&expected)
                ))
            }
            None => return Err("missing sha256 hash".to_string()),
        }
        if sig != signature(data).as_slice() {
            return Err("invalid signature".to_string());
        }
        Ok::<(), String>(())
    })
}

/// A store where another writer touches `victim` before each guarded commit.
///
/// Only transactions with compares are interfered with, so plain reads issued
/// as transactions pass through untouched.
pub struct InterferingKv {
    pub inner: MemoryKv,
    victim: String,
    remaining: AtomicU32,
    commits: AtomicU32,
    delay: Duration,
}

impl InterferingKv {
    /// Interfere with the first `times` guarded commits.
    pub fn new(victim: &str, times: u32) -> Self {
        Self {
            inner: MemoryKv::new(),
            victim: victim.to_string(),
            remaining: AtomicU32::new(times),
            commits: AtomicU32::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Interfere forever, spending `delay` on every read.
    pub fn forever(victim: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(victim, u32::MAX)
        }
    }

    /// Number of guarded commits attempted.
    pub fn commits(&self) -> u32 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvClient for InterferingKv {
    async fn get(&self, key: &str, prefix: bool) -> Result<Vec<KeyValue>, KvError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.get(key, prefix).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        self.inner.put(key, value).await
    }

    async fn txn(&self, txn: Txn) -> Result<TxnResponse, KvError> {
        if !txn.compare.is_empty() {
            self.commits.fetch_add(1, Ordering::SeqCst);
            let interfere = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if interfere {
                self.inner.put(&self.victim, b"concurrent: 1\n").await?;
            }
        }
        self.inner.txn(txn).await
    }
}
