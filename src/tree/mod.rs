//! Path-addressable configuration tree.
//!
//! # Data Flow
//! ```text
//! YAML bytes / env vars / explicit set()
//!     → PathConfig (tree of Value nodes)
//!     → get / elems / for_each (read by path)
//!     → merge (fill in lower-priority values)
//!     → Display (deterministic YAML)
//! ```
//!
//! # Design Decisions
//! - Paths are slices of segments, never dotted strings
//! - "absent" and "not a map" are distinct `PathError` variants
//! - A null intermediate node behaves as an absent map
//! - An empty mapping is a leaf during iteration, so "no instances" survives a merge
//! - A tree is single-owner; attaching one tree to another always deep-copies

pub mod value;

use std::fmt;

use thiserror::Error;

pub use value::{Mapping, Value};

/// Errors produced by path lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The terminal key (or some prefix of it) is absent.
    #[error("path \"{}\" does not exist", .path.join("."))]
    NotExist { path: Vec<String> },

    /// A prefix of the path resolves to a non-map value.
    #[error("path \"{}\" is not a map", .path.join("."))]
    NotAMap { path: Vec<String> },
}

impl PathError {
    pub fn is_not_exist(&self) -> bool {
        matches!(self, PathError::NotExist { .. })
    }
}

fn owned<S: AsRef<str>>(path: &[S]) -> Vec<String> {
    path.iter().map(|s| s.as_ref().to_string()).collect()
}

/// A configuration tree addressed by string paths.
#[derive(Debug, Clone, PartialEq)]
pub struct PathConfig {
    root: Value,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PathConfig {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            root: Value::Mapping(Mapping::new()),
        }
    }

    /// Wrap a value. A null value becomes an empty tree.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::new(),
            root => Self { root },
        }
    }

    /// Decode a YAML document. An empty document is an empty tree.
    pub fn from_yaml(data: &[u8]) -> Result<Self, serde_yaml::Error> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        let value: Value = serde_yaml::from_slice(data)?;
        Ok(Self::from_value(value))
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.root)
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        match &self.root {
            Value::Mapping(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }

    /// Get the value at `path`. An empty path returns the whole tree.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Result<&Value, PathError> {
        let mut current = &self.root;
        for (i, segment) in path.iter().enumerate() {
            current = match current {
                Value::Mapping(map) => map.get(segment.as_ref()).ok_or_else(|| {
                    PathError::NotExist {
                        path: owned(&path[..=i]),
                    }
                })?,
                Value::Null => {
                    return Err(PathError::NotExist {
                        path: owned(&path[..=i]),
                    })
                }
                _ => {
                    return Err(PathError::NotAMap {
                        path: owned(&path[..i]),
                    })
                }
            };
        }
        Ok(current)
    }

    fn get_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Result<&mut Value, PathError> {
        let mut current = &mut self.root;
        for (i, segment) in path.iter().enumerate() {
            current = match current {
                Value::Mapping(map) => map.get_mut(segment.as_ref()).ok_or_else(|| {
                    PathError::NotExist {
                        path: owned(&path[..=i]),
                    }
                })?,
                Value::Null => {
                    return Err(PathError::NotExist {
                        path: owned(&path[..=i]),
                    })
                }
                _ => {
                    return Err(PathError::NotAMap {
                        path: owned(&path[..i]),
                    })
                }
            };
        }
        Ok(current)
    }

    /// Set the value at `path`, creating intermediate maps as needed.
    ///
    /// An empty path replaces the whole tree. Pass `Value::from(&other)` to
    /// attach another tree; the conversion deep-copies it.
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: impl Into<Value>) -> Result<(), PathError> {
        let value = value.into();
        let Some((last, parents)) = path.split_last() else {
            self.root = value;
            return Ok(());
        };

        let mut current = &mut self.root;
        for (i, segment) in parents.iter().enumerate() {
            if current.is_null() {
                *current = Value::Mapping(Mapping::new());
            }
            current = match current {
                Value::Mapping(map) => map
                    .entry(segment.as_ref().to_string())
                    .or_insert(Value::Null),
                _ => {
                    return Err(PathError::NotAMap {
                        path: owned(&path[..i]),
                    })
                }
            };
        }

        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        match current {
            Value::Mapping(map) => {
                map.insert(last.as_ref().to_string(), value);
                Ok(())
            }
            _ => Err(PathError::NotAMap {
                path: owned(parents),
            }),
        }
    }

    /// Remove the subtree at `path` and return it.
    pub fn delete<S: AsRef<str>>(&mut self, path: &[S]) -> Result<Value, PathError> {
        let Some((last, parents)) = path.split_last() else {
            return Ok(std::mem::replace(&mut self.root, Value::Mapping(Mapping::new())));
        };
        match self.get_mut(parents)? {
            Value::Mapping(map) => map.remove(last.as_ref()).ok_or_else(|| PathError::NotExist {
                path: owned(path),
            }),
            Value::Null => Err(PathError::NotExist { path: owned(path) }),
            _ => Err(PathError::NotAMap {
                path: owned(parents),
            }),
        }
    }

    /// Keys of the map at `path`. A null node has no keys.
    pub fn elems<S: AsRef<str>>(&self, path: &[S]) -> Result<Vec<String>, PathError> {
        match self.get(path)? {
            Value::Mapping(map) => Ok(map.keys().cloned().collect()),
            Value::Null => Ok(Vec::new()),
            _ => Err(PathError::NotAMap { path: owned(path) }),
        }
    }

    /// Visit every leaf under `path` with its full path.
    ///
    /// Empty maps are visited as leaves. A missing `path` visits nothing.
    pub fn for_each<S, F>(&self, path: &[S], mut visit: F)
    where
        S: AsRef<str>,
        F: FnMut(&[String], &Value),
    {
        if let Ok(value) = self.get(path) {
            walk(owned(path), value, &mut visit);
        }
    }

    /// Copy every leaf of `low` that is not defined here. Existing values are never overwritten.
    pub fn merge(&mut self, low: &PathConfig) {
        low.for_each(&[] as &[&str], |path, value| {
            if let Err(PathError::NotExist { .. }) = self.get(path) {
                if let Err(err) = self.set(path, value.clone()) {
                    tracing::trace!(error = %err, "Skipping unmergeable path");
                }
            }
        });
    }
}

fn walk<F>(path: Vec<String>, value: &Value, visit: &mut F)
where
    F: FnMut(&[String], &Value),
{
    match value {
        Value::Mapping(map) if !map.is_empty() => {
            for (key, child) in map {
                let mut child_path = path.clone();
                child_path.push(key.clone());
                walk(child_path, child, visit);
            }
        }
        leaf => visit(&path, leaf),
    }
}

impl From<&PathConfig> for Value {
    fn from(config: &PathConfig) -> Self {
        config.root.clone()
    }
}

impl fmt::Display for PathConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yaml = self.to_yaml().map_err(|_| fmt::Error)?;
        f.write_str(&yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PathConfig {
        PathConfig::from_yaml(b"wal:\n  dir: /var/wal\n  mode: write\niproto:\n  listen:\n    - uri: 3301\n")
            .unwrap()
    }

    #[test]
    fn test_set_then_get() {
        let mut config = PathConfig::new();
        config.set(&["a", "b", "c"], 5).unwrap();
        assert_eq!(config.get(&["a", "b", "c"]).unwrap(), &Value::Integer(5));
        assert!(config.get(&["a", "b"]).unwrap().as_mapping().is_some());
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut config = PathConfig::new();
        config.set(&["a"], "scalar").unwrap();
        let err = config.set(&["a", "b"], 1).unwrap_err();
        assert_eq!(err, PathError::NotAMap { path: vec!["a".into()] });

        let err = config.get(&["a", "b", "c"]).unwrap_err();
        assert_eq!(err, PathError::NotAMap { path: vec!["a".into()] });
    }

    #[test]
    fn test_missing_path_is_not_exist() {
        let config = sample();
        let err = config.get(&["wal", "missing"]).unwrap_err();
        assert!(err.is_not_exist());
        assert!(err.to_string().contains("wal.missing"));
    }

    #[test]
    fn test_empty_path_addresses_whole_tree() {
        let mut config = sample();
        assert_eq!(config.get::<&str>(&[]).unwrap(), config.root());

        config.set::<&str>(&[], Value::from("x")).unwrap();
        assert_eq!(config.root(), &Value::from("x"));
    }

    #[test]
    fn test_null_intermediate_is_absent_map() {
        let mut config = PathConfig::from_yaml(b"groups:\n").unwrap();
        assert!(config.get(&["groups", "g"]).unwrap_err().is_not_exist());
        config.set(&["groups", "g", "x"], 1).unwrap();
        assert_eq!(config.get(&["groups", "g", "x"]).unwrap(), &Value::Integer(1));
    }

    #[test]
    fn test_set_tree_value_is_a_copy() {
        let source = sample();
        let mut target = PathConfig::new();
        target.set(&["copy"], Value::from(&source)).unwrap();
        target.set(&["copy", "wal", "dir"], "changed").unwrap();
        assert_eq!(source.get(&["wal", "dir"]).unwrap(), &Value::from("/var/wal"));
    }

    #[test]
    fn test_elems() {
        let config = sample();
        assert_eq!(config.elems(&["wal"]).unwrap(), vec!["dir", "mode"]);
        assert!(matches!(
            config.elems(&["wal", "dir"]),
            Err(PathError::NotAMap { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let mut config = sample();
        let removed = config.delete(&["wal"]).unwrap();
        assert!(removed.as_mapping().is_some());
        assert!(config.get(&["wal"]).unwrap_err().is_not_exist());
        assert!(config.delete(&["wal"]).unwrap_err().is_not_exist());
    }

    #[test]
    fn test_for_each_visits_leaves_with_full_paths() {
        let mut config = sample();
        config.set(&["groups"], Value::Mapping(Mapping::new())).unwrap();

        let mut seen = Vec::new();
        config.for_each::<&str, _>(&[], |path, value| seen.push((path.join("."), value.clone())));

        assert!(seen.contains(&("wal.dir".to_string(), Value::from("/var/wal"))));
        assert!(seen.contains(&("wal.mode".to_string(), Value::from("write"))));
        assert!(seen.contains(&("groups".to_string(), Value::Mapping(Mapping::new()))));
        assert!(seen.iter().any(|(path, _)| path == "iproto.listen"));
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_for_each_under_prefix() {
        let config = sample();
        let mut paths = Vec::new();
        config.for_each(&["wal"], |path, _| paths.push(path.to_vec()));
        assert_eq!(
            paths,
            vec![
                vec!["wal".to_string(), "dir".to_string()],
                vec!["wal".to_string(), "mode".to_string()]
            ]
        );
    }

    #[test]
    fn test_merge_keeps_existing_values() {
        let mut high = PathConfig::new();
        high.set(&["wal", "dir"], "high").unwrap();
        let mut low = sample();
        low.set(&["wal", "dir"], "low").unwrap();
        low.set(&["empty"], Value::Mapping(Mapping::new())).unwrap();

        high.merge(&low);
        assert_eq!(high.get(&["wal", "dir"]).unwrap(), &Value::from("high"));
        assert_eq!(high.get(&["wal", "mode"]).unwrap(), &Value::from("write"));
        assert_eq!(high.get(&["empty"]).unwrap(), &Value::Mapping(Mapping::new()));

        let snapshot = high.clone();
        high.merge(&low);
        assert_eq!(high, snapshot);
    }

    #[test]
    fn test_merge_does_not_descend_into_high_scalars() {
        let mut high = PathConfig::new();
        high.set(&["wal"], "off").unwrap();
        high.merge(&sample());
        assert_eq!(high.get(&["wal"]).unwrap(), &Value::from("off"));
    }

    #[test]
    fn test_string_round_trip() {
        let mut config = PathConfig::new();
        config.set(&["a", "str"], "123").unwrap();
        config.set(&["a", "int"], 123).unwrap();
        config.set(&["a", "float"], 1.0).unwrap();
        config.set(&["b"], Value::Sequence(vec![Value::from(true), Value::Null])).unwrap();

        let text = config.to_string();
        let decoded = PathConfig::from_yaml(text.as_bytes()).unwrap();
        assert_eq!(decoded, config);
        assert_eq!(decoded.to_string(), text);
    }

    #[test]
    fn test_empty_tree_serializes_as_empty_map() {
        let config = PathConfig::new();
        let decoded = PathConfig::from_yaml(config.to_string().as_bytes()).unwrap();
        assert_eq!(decoded, config);
    }
}
