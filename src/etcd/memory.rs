//! In-process coordination service.
//!
//! Keeps a single revision counter like etcd: every write request that changes
//! the store, including a transaction with several writes, advances it by one,
//! and each written key records the new revision as its modification revision.
//! Deleting keys that do not exist changes nothing and keeps the revision.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::etcd::client::{
    Compare, KeyValue, KvClient, KvError, Txn, TxnOp, TxnOpResponse, TxnResponse,
};

#[derive(Debug, Default)]
struct State {
    revision: i64,
    entries: BTreeMap<String, (Vec<u8>, i64)>,
}

impl State {
    fn range(&self, key: &str, prefix: bool) -> Vec<KeyValue> {
        let to_kv = |(k, (v, rev)): (&String, &(Vec<u8>, i64))| KeyValue {
            key: k.clone(),
            value: v.clone(),
            mod_revision: *rev,
        };
        if prefix {
            self.entries
                .range(key.to_string()..)
                .take_while(|(k, _)| k.starts_with(key))
                .map(to_kv)
                .collect()
        } else {
            self.entries.get_key_value(key).map(to_kv).into_iter().collect()
        }
    }

    fn holds(&self, compare: &Compare) -> bool {
        let current = self.entries.get(&compare.key).map(|(_, rev)| *rev).unwrap_or(0);
        current == compare.mod_revision
    }

    fn apply(&mut self, op: &TxnOp, revision: i64) -> TxnOpResponse {
        match op {
            TxnOp::Get { key, prefix } => TxnOpResponse::Get(self.range(key, *prefix)),
            TxnOp::Put { key, value } => {
                self.entries.insert(key.clone(), (value.clone(), revision));
                TxnOpResponse::Put
            }
            TxnOp::Delete { key } => TxnOpResponse::Delete {
                deleted: i64::from(self.entries.remove(key).is_some()),
            },
        }
    }
}

/// A [`KvClient`] backed by a map in memory.
#[derive(Debug, Default)]
pub struct MemoryKv {
    state: Mutex<State>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, KvError> {
        self.state
            .lock()
            .map_err(|_| KvError("memory store lock poisoned".to_string()))
    }

    /// Current store revision.
    pub fn revision(&self) -> Result<i64, KvError> {
        Ok(self.lock()?.revision)
    }

    /// Every stored key, sorted.
    pub fn keys(&self) -> Result<Vec<String>, KvError> {
        Ok(self.lock()?.entries.keys().cloned().collect())
    }
}

#[async_trait]
impl KvClient for MemoryKv {
    async fn get(&self, key: &str, prefix: bool) -> Result<Vec<KeyValue>, KvError> {
        Ok(self.lock()?.range(key, prefix))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        let mut state = self.lock()?;
        state.revision += 1;
        let revision = state.revision;
        state.entries.insert(key.to_string(), (value.to_vec(), revision));
        Ok(())
    }

    async fn txn(&self, txn: Txn) -> Result<TxnResponse, KvError> {
        let mut state = self.lock()?;
        let succeeded = txn.compare.iter().all(|c| state.holds(c));
        let ops = if succeeded { &txn.success } else { &txn.failure };

        let next = state.revision + 1;
        let mut changed = false;
        let mut responses = Vec::with_capacity(ops.len());
        for op in ops {
            let response = state.apply(op, next);
            changed |= matches!(
                response,
                TxnOpResponse::Put | TxnOpResponse::Delete { deleted: 1.. }
            );
            responses.push(response);
        }
        if changed {
            state.revision = next;
        }

        Ok(TxnResponse {
            succeeded,
            responses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_advances_revision() {
        let kv = MemoryKv::new();
        kv.put("/tt/config/a", b"1").await.unwrap();
        kv.put("/tt/config/b", b"2").await.unwrap();

        let all = kv.get("/tt/config/", true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].mod_revision, 1);
        assert_eq!(all[1].mod_revision, 2);
        assert_eq!(kv.revision().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_prefix_read_is_bounded() {
        let kv = MemoryKv::new();
        kv.put("/tt/config/a", b"1").await.unwrap();
        kv.put("/tt/configx", b"2").await.unwrap();
        kv.put("/tu/config/a", b"3").await.unwrap();

        let keys: Vec<String> = kv
            .get("/tt/config/", true)
            .await
            .unwrap()
            .into_iter()
            .map(|kv| kv.key)
            .collect();
        assert_eq!(keys, vec!["/tt/config/a"]);
        assert!(kv.get("/tt/config/", false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_txn_compare_on_missing_key() {
        let kv = MemoryKv::new();
        let txn = Txn::new()
            .when(vec![Compare::mod_revision("/k", 0)])
            .and_then(vec![TxnOp::put("/k", "v")]);
        assert!(kv.txn(txn.clone()).await.unwrap().succeeded);
        assert!(!kv.txn(txn).await.unwrap().succeeded);
    }

    #[tokio::test]
    async fn test_txn_writes_share_one_revision() {
        let kv = MemoryKv::new();
        kv.put("/old", b"x").await.unwrap();

        let response = kv
            .txn(Txn::new().and_then(vec![
                TxnOp::delete("/old"),
                TxnOp::put("/a", "1"),
                TxnOp::put("/b", "2"),
            ]))
            .await
            .unwrap();

        assert!(response.succeeded);
        assert_eq!(response.responses[0], TxnOpResponse::Delete { deleted: 1 });
        assert_eq!(kv.revision().unwrap(), 2);
        assert_eq!(kv.keys().unwrap(), vec!["/a", "/b"]);
        assert!(kv
            .get("/", true)
            .await
            .unwrap()
            .iter()
            .all(|kv| kv.mod_revision == 2));
    }

    #[tokio::test]
    async fn test_delete_of_missing_key_keeps_revision() {
        let kv = MemoryKv::new();
        kv.put("/k", b"v").await.unwrap();

        let response = kv
            .txn(Txn::new().and_then(vec![TxnOp::delete("/missing"), TxnOp::get("/k")]))
            .await
            .unwrap();

        assert_eq!(response.responses[0], TxnOpResponse::Delete { deleted: 0 });
        assert_eq!(kv.revision().unwrap(), 1);
        assert_eq!(response.ranges()[0][0].mod_revision, 1);
    }

    #[tokio::test]
    async fn test_failed_txn_runs_failure_branch() {
        let kv = MemoryKv::new();
        kv.put("/k", b"v").await.unwrap();

        let response = kv
            .txn(
                Txn::new()
                    .when(vec![Compare::mod_revision("/k", 7)])
                    .and_then(vec![TxnOp::delete("/k")])
                    .or_else(vec![TxnOp::get("/k")]),
            )
            .await
            .unwrap();

        assert!(!response.succeeded);
        assert_eq!(response.ranges()[0][0].value, b"v".to_vec());
        assert_eq!(kv.revision().unwrap(), 1);
    }
}
