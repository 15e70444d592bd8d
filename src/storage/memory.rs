//! In-process config-storage service.
//!
//! Answers the `config.storage.*` calls the way the database module does,
//! including prefix paths, `mod_revision` predicates and a global revision that
//! advances once per write request that changes the store. A delete that
//! removes nothing keeps the revision.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use crate::storage::client::{CallError, StorageClient, StoredValue, DELETE, GET, PUT, TXN};

#[derive(Debug, Default)]
struct State {
    revision: i64,
    entries: BTreeMap<String, (String, i64)>,
}

fn is_prefix(path: &str) -> bool {
    path.ends_with('/')
}

fn malformed(what: &str, value: &JsonValue) -> CallError {
    CallError(format!("malformed {}: {}", what, value))
}

fn string_at(args: &[JsonValue], index: usize, what: &str) -> Result<String, CallError> {
    args.get(index)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| CallError(format!("missing {} argument", what)))
}

impl State {
    fn select(&self, path: &str) -> Vec<StoredValue> {
        self.entries
            .iter()
            .filter(|(k, _)| if is_prefix(path) { k.starts_with(path) } else { k.as_str() == path })
            .map(|(k, (v, rev))| StoredValue {
                path: k.clone(),
                value: v.clone(),
                mod_revision: *rev,
            })
            .collect()
    }

    fn remove(&mut self, path: &str) -> Vec<StoredValue> {
        let removed = self.select(path);
        for entry in &removed {
            self.entries.remove(&entry.path);
        }
        removed
    }

    fn holds(&self, predicate: &JsonValue) -> Result<bool, CallError> {
        let parts = predicate
            .as_array()
            .ok_or_else(|| malformed("predicate", predicate))?;
        match parts.as_slice() {
            [field, op, revision, path] if field == "mod_revision" && op == "==" => {
                let revision = revision.as_i64().ok_or_else(|| malformed("predicate", predicate))?;
                let path = path.as_str().ok_or_else(|| malformed("predicate", predicate))?;
                let current = self.entries.get(path).map(|(_, rev)| *rev).unwrap_or(0);
                Ok(current == revision)
            }
            _ => Err(malformed("predicate", predicate)),
        }
    }

    /// Run one operation, reporting whether it changed the store.
    fn apply(&mut self, operation: &JsonValue, revision: i64) -> Result<(JsonValue, bool), CallError> {
        let parts = operation
            .as_array()
            .ok_or_else(|| malformed("operation", operation))?;
        let name = parts.first().and_then(JsonValue::as_str);
        let path = parts.get(1).and_then(JsonValue::as_str);
        match (name, path) {
            (Some("get"), Some(path)) => Ok((json!(self.select(path)), false)),
            (Some("put"), Some(path)) => {
                let value = string_at(parts, 2, "value")?;
                self.entries.insert(path.to_string(), (value, revision));
                Ok((JsonValue::Null, true))
            }
            (Some("delete"), Some(path)) => {
                let removed = self.remove(path);
                let changed = !removed.is_empty();
                Ok((json!(removed), changed))
            }
            _ => Err(malformed("operation", operation)),
        }
    }

    fn txn(&mut self, request: &JsonValue) -> Result<JsonValue, CallError> {
        let list = |field: &str| -> Result<Vec<JsonValue>, CallError> {
            match request.get(field) {
                None | Some(JsonValue::Null) => Ok(Vec::new()),
                Some(JsonValue::Array(items)) => Ok(items.clone()),
                Some(other) => Err(malformed(field, other)),
            }
        };
        let predicates = list("predicates")?;
        let on_success = list("on_success")?;
        let on_failure = list("on_failure")?;

        let mut is_success = true;
        for predicate in &predicates {
            if !self.holds(predicate)? {
                is_success = false;
                break;
            }
        }

        let operations = if is_success { on_success } else { on_failure };
        let next = self.revision + 1;
        let mut changed = false;
        let mut responses = Vec::with_capacity(operations.len());
        for operation in &operations {
            let (response, wrote) = self.apply(operation, next)?;
            changed |= wrote;
            responses.push(response);
        }
        if changed {
            self.revision = next;
        }

        Ok(json!({
            "data": {"is_success": is_success, "responses": responses},
            "revision": self.revision,
        }))
    }
}

/// A [`StorageClient`] backed by a map in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, CallError> {
        self.state
            .lock()
            .map_err(|_| CallError("memory storage lock poisoned".to_string()))
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Result<Vec<String>, CallError> {
        Ok(self.lock()?.entries.keys().cloned().collect())
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn call(&self, function: &str, args: Vec<JsonValue>) -> Result<JsonValue, CallError> {
        let mut state = self.lock()?;
        match function {
            GET => {
                let path = string_at(&args, 0, "path")?;
                Ok(json!({"data": state.select(&path), "revision": state.revision}))
            }
            PUT => {
                let path = string_at(&args, 0, "path")?;
                let value = string_at(&args, 1, "value")?;
                state.revision += 1;
                let revision = state.revision;
                state.entries.insert(path, (value, revision));
                Ok(json!({ "revision": revision }))
            }
            DELETE => {
                let path = string_at(&args, 0, "path")?;
                let removed = state.remove(&path);
                if !removed.is_empty() {
                    state.revision += 1;
                }
                Ok(json!({"data": removed, "revision": state.revision}))
            }
            TXN => {
                let request = args
                    .first()
                    .ok_or_else(|| CallError("missing request argument".to_string()))?;
                state.txn(request)
            }
            other => Err(CallError(format!("unknown function {}", other))),
        }
    }
}
