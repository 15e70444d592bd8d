//! Client contract of the database config-storage service.
//!
//! # Responsibilities
//! - Define the remote procedure call seam (`config.storage.*` functions)
//! - Encode requests and decode the nested response structures
//! - Wrap every call with the caller's timeout
//!
//! # Wire Format
//! ```text
//! config.storage.get(path)         → {data: [{path, value, mod_revision}], revision}
//! config.storage.put(path, value)  → {revision}
//! config.storage.delete(path)      → {data: [{path, value, mod_revision}], revision}
//! config.storage.txn({predicates, on_success, on_failure})
//!                                  → {data: {is_success, responses: [...]}, revision}
//! ```
//! A path ending with `/` addresses every stored path under it.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::collector::{StorageError, StorageResult};
use crate::resilience::timeouts::with_timeout;

pub const GET: &str = "config.storage.get";
pub const PUT: &str = "config.storage.put";
pub const DELETE: &str = "config.storage.delete";
pub const TXN: &str = "config.storage.txn";

/// Failure reported by the remote side or the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CallError(pub String);

/// Connection to a config-storage instance.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Call a stored function with positional arguments.
    async fn call(&self, function: &str, args: Vec<JsonValue>) -> Result<JsonValue, CallError>;
}

/// One stored path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub path: String,
    pub value: String,
    pub mod_revision: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GetResponse {
    pub data: Vec<StoredValue>,
    pub revision: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PutResponse {
    pub revision: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TxnData {
    pub is_success: bool,
    #[serde(default)]
    pub responses: Vec<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TxnResponse {
    pub data: TxnData,
    pub revision: i64,
}

impl TxnData {
    /// Decode responses of a branch that only has `get` operations.
    pub fn ranges(self) -> Result<Vec<Vec<StoredValue>>, serde_json::Error> {
        self.responses.into_iter().map(serde_json::from_value).collect()
    }
}

/// Transaction guard: `path` was last modified at `mod_revision`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub path: String,
    pub mod_revision: i64,
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ("mod_revision", "==", self.mod_revision, &self.path).serialize(serializer)
    }
}

/// Operation of a transaction branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Get(String),
    Put(String, String),
    Delete(String),
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Operation::Get(path) => ("get", path).serialize(serializer),
            Operation::Put(path, value) => ("put", path, value).serialize(serializer),
            Operation::Delete(path) => ("delete", path).serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TxnRequest {
    pub predicates: Vec<Predicate>,
    pub on_success: Vec<Operation>,
    pub on_failure: Vec<Operation>,
}

/// Call `function` within `limit` and decode its response.
pub async fn invoke<T: DeserializeOwned>(
    client: &dyn StorageClient,
    limit: Duration,
    function: &str,
    target: &str,
    args: Vec<JsonValue>,
) -> StorageResult<T> {
    let response = with_timeout(limit, function, target, client.call(function, args)).await?;
    serde_json::from_value(response).map_err(|e| StorageError::Response {
        operation: function.to_string(),
        message: e.to_string(),
    })
}

pub async fn get(client: &dyn StorageClient, limit: Duration, path: &str) -> StorageResult<GetResponse> {
    invoke(client, limit, GET, path, vec![JsonValue::from(path)]).await
}

pub async fn put(
    client: &dyn StorageClient,
    limit: Duration,
    path: &str,
    value: &str,
) -> StorageResult<PutResponse> {
    invoke(client, limit, PUT, path, vec![JsonValue::from(path), JsonValue::from(value)]).await
}

pub async fn txn(
    client: &dyn StorageClient,
    limit: Duration,
    target: &str,
    request: &TxnRequest,
) -> StorageResult<TxnResponse> {
    let argument = serde_json::to_value(request).map_err(|e| StorageError::Response {
        operation: TXN.to_string(),
        message: e.to_string(),
    })?;
    invoke(client, limit, TXN, target, vec![argument]).await
}

/// Stored values are text; published bytes must be UTF-8.
pub fn text(origin: &str, data: &[u8]) -> StorageResult<String> {
    String::from_utf8(data.to_vec()).map_err(|e| StorageError::Decode {
        origin: origin.to_string(),
        message: e.to_string(),
    })
}
