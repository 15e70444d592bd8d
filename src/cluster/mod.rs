//! Cluster configuration model and scope resolution.
//!
//! # Responsibilities
//! - Parse a cluster document into cluster, group, replicaset and instance scopes
//! - Resolve an instance's effective configuration by scope precedence
//! - Replace or add an instance's configuration and re-derive the model
//! - Collect a cluster document from several prioritized sources
//!
//! # Data Flow
//! ```text
//! [Collector] (highest priority first) → merge → ClusterConfig::from_config
//!     → instantiate(name): instance > replicaset > group > cluster
//!     → replace_instance_config(name, cfg) → fresh ClusterConfig
//! ```
//!
//! # Design Decisions
//! - Lower scopes are stripped of their children on a clone, never in place
//! - Every mutation goes through the raw document and rebuilds the scopes
//! - An unknown instance resolves to the cluster scope alone

pub mod scope;
pub mod validate;

use thiserror::Error;

use crate::collector::{Collector, StorageError};
use crate::tree::{PathConfig, PathError, Value};

pub use scope::{ClusterConfig, GroupConfig, InstanceConfig, ReplicasetConfig};
pub use validate::{validate_cluster, ScopeValidateError};

use scope::{GROUPS, INSTANCES, REPLICASETS};

/// Errors produced by the cluster model.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("instance \"{name}\" not found")]
    InstanceNotFound { name: String },

    /// A scope that is neither a map nor empty.
    #[error("invalid scope \"{path}\": {reason}")]
    InvalidScope { path: String, reason: String },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("failed to decode cluster document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ClusterError {
    pub(crate) fn invalid_scope(path: &[String], value: &Value) -> Self {
        ClusterError::InvalidScope {
            path: path.join("."),
            reason: format!("expected map, got {} {}", value.type_name(), value),
        }
    }
}

/// Copy of `raw` without `child`.
fn without(raw: &PathConfig, child: &str) -> PathConfig {
    let mut copy = raw.clone();
    if let Err(err) = copy.delete(&[child]) {
        if !err.is_not_exist() {
            tracing::trace!(error = %err, child, "Unable to strip child scope");
        }
    }
    copy
}

/// Group and replicaset holding instance `name`.
pub fn find_instance<'a>(cluster: &'a ClusterConfig, name: &str) -> Option<(&'a str, &'a str)> {
    cluster.groups.iter().find_map(|(group_name, group)| {
        group
            .replicasets
            .iter()
            .find(|(_, replicaset)| replicaset.instances.contains_key(name))
            .map(|(replicaset_name, _)| (group_name.as_str(), replicaset_name.as_str()))
    })
}

/// Group holding replicaset `name`.
pub fn find_group_by_replicaset<'a>(cluster: &'a ClusterConfig, name: &str) -> Option<&'a str> {
    cluster
        .groups
        .iter()
        .find(|(_, group)| group.replicasets.contains_key(name))
        .map(|(group_name, _)| group_name.as_str())
}

/// Names of every instance in the topology, sorted.
pub fn instances(cluster: &ClusterConfig) -> Vec<String> {
    let mut names: Vec<String> = cluster
        .groups
        .values()
        .flat_map(|group| group.replicasets.values())
        .flat_map(|replicaset| replicaset.instances.keys().cloned())
        .collect();
    names.sort();
    names
}

/// The cluster scope without its groups.
pub fn global_config(cluster: &ClusterConfig) -> PathConfig {
    without(&cluster.raw, GROUPS)
}

/// Effective configuration of instance `name`.
///
/// Scopes are merged from the instance up to the cluster; the closest scope
/// defining a path wins. An unknown name gets the cluster scope alone.
pub fn instantiate(cluster: &ClusterConfig, name: &str) -> PathConfig {
    let Some((group_name, replicaset_name)) = find_instance(cluster, name) else {
        return global_config(cluster);
    };

    let group = &cluster.groups[group_name];
    let replicaset = &group.replicasets[replicaset_name];
    let instance = &replicaset.instances[name];

    let mut config = instance.raw.clone();
    config.merge(&without(&replicaset.raw, INSTANCES));
    config.merge(&without(&group.raw, REPLICASETS));
    config.merge(&global_config(cluster));
    config
}

fn instance_path(group: &str, replicaset: &str, name: &str) -> [String; 6] {
    [
        GROUPS.to_string(),
        group.to_string(),
        REPLICASETS.to_string(),
        replicaset.to_string(),
        INSTANCES.to_string(),
        name.to_string(),
    ]
}

/// A new cluster with the configuration of existing instance `name` replaced.
pub fn replace_instance_config(
    cluster: &ClusterConfig,
    name: &str,
    config: &PathConfig,
) -> Result<ClusterConfig, ClusterError> {
    let (group, replicaset) = find_instance(cluster, name).ok_or_else(|| ClusterError::InstanceNotFound {
        name: name.to_string(),
    })?;
    set_instance_config(cluster, group, replicaset, name, config)
}

/// A new cluster with instance `name` configured under the given group and replicaset.
///
/// Missing scopes along the path are created.
pub fn set_instance_config(
    cluster: &ClusterConfig,
    group: &str,
    replicaset: &str,
    name: &str,
    config: &PathConfig,
) -> Result<ClusterConfig, ClusterError> {
    let mut raw = cluster.raw.clone();
    raw.set(&instance_path(group, replicaset, name), Value::from(config))?;
    ClusterConfig::from_config(raw)
}

/// Collect from `collectors`, given highest priority first, and parse the result.
///
/// Sources holding nothing are skipped. When every source is empty, the last
/// emptiness error is returned.
pub async fn collect_cluster_config(
    collectors: &[Box<dyn Collector>],
) -> Result<ClusterConfig, ClusterError> {
    let mut config = PathConfig::new();
    let mut collected = false;
    let mut last_empty = None;

    for (priority, collector) in collectors.iter().enumerate() {
        match collector.collect().await {
            Ok(part) => {
                config.merge(&part);
                collected = true;
            }
            Err(err) if err.is_empty() => {
                tracing::debug!(priority, error = %err, "Skipping empty configuration source");
                last_empty = Some(err);
            }
            Err(err) => return Err(err.into()),
        }
    }

    if let (false, Some(err)) = (collected, last_empty) {
        return Err(err.into());
    }
    ClusterConfig::from_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{StorageResult, YamlCollector};
    use async_trait::async_trait;

    const DOCUMENT: &str = r#"
wal:
  dir: cluster
log:
  level: info
groups:
  g:
    wal:
      dir: group
    replicasets:
      r:
        wal:
          dir: replicaset
        instances:
          i:
            wal:
              dir: instance
          sibling:
            log:
              level: debug
"#;

    fn cluster() -> ClusterConfig {
        ClusterConfig::from_yaml(DOCUMENT.as_bytes()).unwrap()
    }

    fn wal_dir(config: &PathConfig) -> &Value {
        config.get(&["wal", "dir"]).unwrap()
    }

    #[test]
    fn test_find_instance() {
        let cluster = cluster();
        assert_eq!(find_instance(&cluster, "i"), Some(("g", "r")));
        assert_eq!(find_instance(&cluster, "nope"), None);
        assert_eq!(find_group_by_replicaset(&cluster, "r"), Some("g"));
        assert_eq!(find_group_by_replicaset(&cluster, "x"), None);
        assert_eq!(instances(&cluster), vec!["i", "sibling"]);
    }

    #[test]
    fn test_instantiate_precedence() {
        let mut cluster = cluster();
        assert_eq!(wal_dir(&instantiate(&cluster, "i")), &Value::from("instance"));

        let path = ["groups", "g", "replicasets", "r", "instances", "i", "wal"];
        let mut raw = cluster.raw.clone();
        raw.delete(&path).unwrap();
        cluster = ClusterConfig::from_config(raw).unwrap();
        assert_eq!(wal_dir(&instantiate(&cluster, "i")), &Value::from("replicaset"));

        let mut raw = cluster.raw.clone();
        raw.delete(&["groups", "g", "replicasets", "r", "instances", "i"]).unwrap();
        raw.delete(&["groups", "g", "replicasets", "r", "wal"]).unwrap();
        cluster = ClusterConfig::from_config(raw).unwrap();
        assert!(instances(&cluster).contains(&"sibling".to_string()));
        assert_eq!(wal_dir(&instantiate(&cluster, "sibling")), &Value::from("group"));

        let mut raw = cluster.raw.clone();
        raw.delete(&["groups", "g", "wal"]).unwrap();
        cluster = ClusterConfig::from_config(raw).unwrap();
        assert_eq!(wal_dir(&instantiate(&cluster, "sibling")), &Value::from("cluster"));
    }

    #[test]
    fn test_instantiate_does_not_leak_siblings() {
        let cluster = cluster();
        let config = instantiate(&cluster, "i");
        assert_eq!(config.get(&["log", "level"]).unwrap(), &Value::from("info"));
        assert!(config.get(&["instances"]).unwrap_err().is_not_exist());
        assert!(config.get(&["replicasets"]).unwrap_err().is_not_exist());
        assert!(config.get(&["groups"]).unwrap_err().is_not_exist());
    }

    #[test]
    fn test_instantiate_unknown_is_global_scope() {
        let cluster = cluster();
        let config = instantiate(&cluster, "ghost");
        assert_eq!(config, global_config(&cluster));
        assert_eq!(wal_dir(&config), &Value::from("cluster"));
        assert!(cluster.raw.get(&["groups"]).is_ok());
    }

    #[test]
    fn test_replace_instance_config() {
        let cluster = cluster();
        let mut replacement = PathConfig::new();
        replacement.set(&["wal", "dir"], "replaced").unwrap();

        let updated = replace_instance_config(&cluster, "i", &replacement).unwrap();
        assert_eq!(wal_dir(&instantiate(&updated, "i")), &Value::from("replaced"));
        assert_eq!(
            updated.groups["g"].replicasets["r"].instances["i"].raw,
            replacement
        );
        assert_eq!(wal_dir(&instantiate(&cluster, "i")), &Value::from("instance"));
    }

    #[test]
    fn test_replace_unknown_instance() {
        let cluster = cluster();
        let before = cluster.raw.to_string();
        let err = replace_instance_config(&cluster, "ghost", &PathConfig::new()).unwrap_err();
        assert!(err.to_string().contains("ghost"));
        assert_eq!(cluster.raw.to_string(), before);
    }

    #[test]
    fn test_set_instance_config_creates_scopes() {
        let cluster = cluster();
        let mut config = PathConfig::new();
        config.set(&["wal", "dir"], "new").unwrap();

        let updated = set_instance_config(&cluster, "g2", "r2", "fresh", &config).unwrap();
        assert_eq!(find_instance(&updated, "fresh"), Some(("g2", "r2")));
        assert_eq!(wal_dir(&instantiate(&updated, "fresh")), &Value::from("new"));
        assert_eq!(instances(&updated).len(), 3);
    }

    struct EmptySource;

    #[async_trait]
    impl Collector for EmptySource {
        async fn collect(&self) -> StorageResult<PathConfig> {
            Err(StorageError::Empty {
                origin: "nowhere".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_collect_cluster_config_priority() {
        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(YamlCollector::new("wal:\n  dir: high\n")),
            Box::new(EmptySource),
            Box::new(YamlCollector::new(DOCUMENT)),
        ];
        let cluster = collect_cluster_config(&collectors).await.unwrap();
        assert_eq!(wal_dir(&cluster.raw), &Value::from("high"));
        assert_eq!(instances(&cluster), vec!["i", "sibling"]);
    }

    #[tokio::test]
    async fn test_collect_cluster_config_all_empty() {
        let collectors: Vec<Box<dyn Collector>> = vec![Box::new(EmptySource), Box::new(EmptySource)];
        let err = collect_cluster_config(&collectors).await.unwrap_err();
        assert!(matches!(err, ClusterError::Storage(ref e) if e.is_empty()));
    }
}
