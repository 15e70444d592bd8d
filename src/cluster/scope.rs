//! Parsed configuration scopes.
//!
//! Every scope keeps the raw subtree it was built from. Children are built
//! from clones of the parent's subtree, so a scope's `raw` is the
//! corresponding part of the parent's `raw`. The one exception is a null
//! body (`name: ~`), which declares an empty scope: its `raw` is an empty map
//! while the parent still holds the null.

use std::collections::BTreeMap;

use crate::cluster::ClusterError;
use crate::tree::{PathConfig, PathError, Value};

pub const GROUPS: &str = "groups";
pub const REPLICASETS: &str = "replicasets";
pub const INSTANCES: &str = "instances";

/// Named child scopes stored under `key`, each cloned out of `raw`.
///
/// A null child body becomes an empty map, so every scope's `raw` is a map.
fn children(
    raw: &PathConfig,
    key: &str,
    scope: &[String],
) -> Result<Vec<(String, PathConfig)>, ClusterError> {
    let mut path = scope.to_vec();
    path.push(key.to_string());

    let map = match raw.get(&[key]) {
        Ok(Value::Mapping(map)) => map,
        Ok(Value::Null) | Err(PathError::NotExist { .. }) => return Ok(Vec::new()),
        Ok(other) => return Err(ClusterError::invalid_scope(&path, other)),
        Err(PathError::NotAMap { .. }) => return Err(ClusterError::invalid_scope(scope, raw.root())),
    };

    map.iter()
        .map(|(name, value)| match value {
            Value::Mapping(_) | Value::Null => Ok((name.clone(), PathConfig::from_value(value.clone()))),
            other => {
                let mut child = path.clone();
                child.push(name.clone());
                Err(ClusterError::invalid_scope(&child, other))
            }
        })
        .collect()
}

/// An instance scope.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceConfig {
    pub raw: PathConfig,
}

/// A replicaset scope and its instances.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicasetConfig {
    pub raw: PathConfig,
    pub instances: BTreeMap<String, InstanceConfig>,
}

impl ReplicasetConfig {
    fn build(raw: PathConfig, scope: &[String]) -> Result<Self, ClusterError> {
        let instances = children(&raw, INSTANCES, scope)?
            .into_iter()
            .map(|(name, raw)| (name, InstanceConfig { raw }))
            .collect();
        Ok(Self { raw, instances })
    }
}

/// A group scope and its replicasets.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupConfig {
    pub raw: PathConfig,
    pub replicasets: BTreeMap<String, ReplicasetConfig>,
}

impl GroupConfig {
    fn build(raw: PathConfig, scope: &[String]) -> Result<Self, ClusterError> {
        let mut replicasets = BTreeMap::new();
        for (name, child) in children(&raw, REPLICASETS, scope)? {
            let mut path = scope.to_vec();
            path.extend([REPLICASETS.to_string(), name.clone()]);
            replicasets.insert(name, ReplicasetConfig::build(child, &path)?);
        }
        Ok(Self { raw, replicasets })
    }
}

/// The whole cluster document and its groups.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    pub raw: PathConfig,
    pub groups: BTreeMap<String, GroupConfig>,
}

impl ClusterConfig {
    /// Parse the scopes of a cluster document.
    pub fn from_config(raw: PathConfig) -> Result<Self, ClusterError> {
        let mut groups = BTreeMap::new();
        for (name, child) in children(&raw, GROUPS, &[])? {
            let path = vec![GROUPS.to_string(), name.clone()];
            groups.insert(name, GroupConfig::build(child, &path)?);
        }
        Ok(Self { raw, groups })
    }

    /// Decode and parse a YAML cluster document.
    pub fn from_yaml(data: &[u8]) -> Result<Self, ClusterError> {
        Self::from_config(PathConfig::from_yaml(data)?)
    }

    pub fn to_config(&self) -> &PathConfig {
        &self.raw
    }
}
