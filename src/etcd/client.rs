//! Client contract of the coordination service.
//!
//! Models the subset of the etcd KV API the publish protocol needs: point and
//! prefix reads returning each key's modification revision, plain puts, and
//! transactions guarded by modification-revision equality.

use async_trait::async_trait;
use thiserror::Error;

/// A stored key with its last modification revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
    pub mod_revision: i64,
}

/// Transaction guard: `key` was last modified at `mod_revision`.
///
/// A missing key has modification revision 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compare {
    pub key: String,
    pub mod_revision: i64,
}

impl Compare {
    pub fn mod_revision(key: impl Into<String>, mod_revision: i64) -> Self {
        Self {
            key: key.into(),
            mod_revision,
        }
    }
}

/// One operation of a transaction branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOp {
    Get { key: String, prefix: bool },
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl TxnOp {
    pub fn get(key: impl Into<String>) -> Self {
        TxnOp::Get {
            key: key.into(),
            prefix: false,
        }
    }

    pub fn get_prefix(prefix: impl Into<String>) -> Self {
        TxnOp::Get {
            key: prefix.into(),
            prefix: true,
        }
    }

    pub fn put(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        TxnOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        TxnOp::Delete { key: key.into() }
    }
}

/// Result of one [`TxnOp`], in the same position as the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOpResponse {
    Get(Vec<KeyValue>),
    Put,
    Delete { deleted: i64 },
}

/// A compare-then-commit transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Txn {
    pub compare: Vec<Compare>,
    pub success: Vec<TxnOp>,
    pub failure: Vec<TxnOp>,
}

impl Txn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(mut self, compare: Vec<Compare>) -> Self {
        self.compare = compare;
        self
    }

    pub fn and_then(mut self, ops: Vec<TxnOp>) -> Self {
        self.success = ops;
        self
    }

    pub fn or_else(mut self, ops: Vec<TxnOp>) -> Self {
        self.failure = ops;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnResponse {
    /// Whether every compare held and the success branch ran.
    pub succeeded: bool,
    pub responses: Vec<TxnOpResponse>,
}

impl TxnResponse {
    /// Results of the `Get` operations of the executed branch, in order.
    pub fn ranges(self) -> Vec<Vec<KeyValue>> {
        self.responses
            .into_iter()
            .filter_map(|response| match response {
                TxnOpResponse::Get(kvs) => Some(kvs),
                _ => None,
            })
            .collect()
    }
}

/// Failure reported by a coordination service client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct KvError(pub String);

/// Coordination service connection.
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Read `key`, or every key starting with it when `prefix` is set. Keys come back sorted.
    async fn get(&self, key: &str, prefix: bool) -> Result<Vec<KeyValue>, KvError>;

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), KvError>;

    async fn txn(&self, txn: Txn) -> Result<TxnResponse, KvError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txn_builder() {
        let txn = Txn::new()
            .when(vec![Compare::mod_revision("/tt/config/a", 3)])
            .and_then(vec![TxnOp::delete("/tt/config/a"), TxnOp::put("/tt/config/all", "x")])
            .or_else(vec![TxnOp::get_prefix("/tt/config/")]);

        assert_eq!(txn.compare.len(), 1);
        assert_eq!(txn.success.len(), 2);
        assert_eq!(
            txn.failure,
            vec![TxnOp::Get {
                key: "/tt/config/".to_string(),
                prefix: true
            }]
        );
    }

    #[test]
    fn test_ranges_skip_writes() {
        let kv = KeyValue {
            key: "k".to_string(),
            value: b"v".to_vec(),
            mod_revision: 1,
        };
        let response = TxnResponse {
            succeeded: true,
            responses: vec![
                TxnOpResponse::Put,
                TxnOpResponse::Get(vec![kv.clone()]),
                TxnOpResponse::Delete { deleted: 1 },
                TxnOpResponse::Get(vec![]),
            ],
        };
        assert_eq!(response.ranges(), vec![vec![kv], vec![]]);
    }
}
