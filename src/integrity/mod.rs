//! Integrity metadata for published values.
//!
//! # Responsibilities
//! - Define the sign and check contracts injected by the caller
//! - Join stored values with their per-algorithm hashes and signature
//! - Run the check for every collected value, naming the key on failure
//!
//! # Design Decisions
//! - Hashing and signing algorithms live outside this crate
//! - A value stored without a signature is checked with an empty one; the check decides
//! - Integrity failures are never retried

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collector::{Data, StorageError};
use crate::keyspace;
use crate::observability::metrics;

/// Hashes keyed by algorithm name.
pub type Hashes = BTreeMap<String, Vec<u8>>;

/// Output of a [`SignFunc`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signed {
    pub hashes: Hashes,
    pub signature: Vec<u8>,
}

/// Computes hashes and a signature for a value.
pub type SignFunc = Arc<dyn Fn(&[u8]) -> Result<Signed, String> + Send + Sync>;

/// Verifies a value against its stored hashes and signature.
pub type CheckFunc = Arc<dyn Fn(&[u8], &Hashes, &[u8]) -> Result<(), String> + Send + Sync>;

/// A raw stored key with its revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub revision: i64,
}

/// A configuration value joined with its integrity metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEntry {
    /// Key relative to the config namespace.
    pub name: String,
    /// Full stored key of the value.
    pub source: String,
    pub value: Vec<u8>,
    pub revision: i64,
    pub hashes: Hashes,
    pub signature: Vec<u8>,
}

/// Join values, hashes and signatures read from the three namespaces.
///
/// Entries are matched by the key suffix left after stripping each namespace prefix.
/// Hashes or signatures without a value are dropped. Output is sorted by name.
pub fn assemble(
    prefix: &str,
    values: Vec<StoredEntry>,
    hashes: Vec<StoredEntry>,
    signatures: Vec<StoredEntry>,
) -> Vec<SignedEntry> {
    let mut entries: BTreeMap<String, SignedEntry> = BTreeMap::new();
    for value in values {
        let Some(name) = keyspace::config_name(prefix, &value.key) else {
            continue;
        };
        entries.insert(
            name.to_string(),
            SignedEntry {
                name: name.to_string(),
                source: value.key.clone(),
                value: value.value,
                revision: value.revision,
                hashes: Hashes::new(),
                signature: Vec::new(),
            },
        );
    }

    for hash in hashes {
        let Some((algorithm, name)) = keyspace::hash_owner(prefix, &hash.key) else {
            continue;
        };
        if let Some(entry) = entries.get_mut(name) {
            entry.hashes.insert(algorithm.to_string(), hash.value);
        }
    }

    for signature in signatures {
        let Some(name) = keyspace::sig_owner(prefix, &signature.key) else {
            continue;
        };
        if let Some(entry) = entries.get_mut(name) {
            entry.signature = signature.value;
        }
    }

    entries.into_values().collect()
}

/// Check every entry and convert it into [`Data`]. The first failure aborts.
pub fn verify(
    check: &CheckFunc,
    entries: Vec<SignedEntry>,
    backend: &'static str,
) -> Result<Vec<Data>, StorageError> {
    let mut data = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Err(message) = check(&entry.value, &entry.hashes, &entry.signature) {
            metrics::record_integrity_failure(backend);
            tracing::warn!(key = %entry.source, error = %message, "Integrity check failed");
            return Err(StorageError::Integrity {
                key: entry.source,
                message,
            });
        }
        data.push(Data {
            source: entry.source,
            value: entry.value,
            revision: entry.revision,
        });
    }
    Ok(data)
}

/// Run the sign function, mapping its failure.
pub fn sign(signer: &SignFunc, data: &[u8]) -> Result<Signed, StorageError> {
    signer(data).map_err(|message| StorageError::Sign { message })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str) -> StoredEntry {
        StoredEntry {
            key: key.to_string(),
            value: value.as_bytes().to_vec(),
            revision: 7,
        }
    }

    #[test]
    fn test_assemble_matches_by_suffix() {
        let entries = assemble(
            "/tt",
            vec![entry("/tt/config/a", "va"), entry("/tt/config/b", "vb")],
            vec![
                entry("/tt/hashes/sha256/a", "ha"),
                entry("/tt/hashes/md5/a", "ma"),
                entry("/tt/hashes/sha256/orphan", "x"),
            ],
            vec![entry("/tt/sig/a", "sa")],
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[0].source, "/tt/config/a");
        assert_eq!(entries[0].hashes.len(), 2);
        assert_eq!(entries[0].hashes["sha256"], b"ha".to_vec());
        assert_eq!(entries[0].signature, b"sa".to_vec());
        assert!(entries[1].hashes.is_empty());
        assert!(entries[1].signature.is_empty());
    }

    #[test]
    fn test_verify_names_failing_key() {
        let check: CheckFunc = Arc::new(|value: &[u8], _: &Hashes, _: &[u8]| {
            if value == b"bad" {
                Err("signature mismatch".to_string())
            } else {
                Ok(())
            }
        });
        let entries = assemble(
            "/tt",
            vec![entry("/tt/config/a", "ok"), entry("/tt/config/b", "bad")],
            vec![],
            vec![],
        );

        let err = verify(&check, entries, "etcd").unwrap_err();
        assert!(matches!(err, StorageError::Integrity { ref key, .. } if key == "/tt/config/b"));
        assert!(err.to_string().contains("signature mismatch"));
    }
}
