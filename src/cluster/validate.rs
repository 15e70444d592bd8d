//! Schema validation of every instance in a cluster.

use std::fmt;

use crate::cluster::{global_config, instances, instantiate, ClusterConfig};
use crate::validation::{validate, SchemaPath, ValidateError};

/// Validation failures of one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeValidateError {
    /// Instance name, or `None` for the cluster scope.
    pub instance: Option<String>,
    pub error: ValidateError,
}

impl fmt::Display for ScopeValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match &self.instance {
            Some(name) => format!("instance \"{}\"", name),
            None => "cluster".to_string(),
        };
        for (i, (path, message)) in self.error.leaves().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}: {}", scope, path.join("."), message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ScopeValidateError {}

/// Validate the effective configuration of every instance.
///
/// A topology without instances validates the cluster scope. All failures are
/// returned together, in instance name order.
pub fn validate_cluster(
    cluster: &ClusterConfig,
    schema: &[SchemaPath],
) -> Result<(), Vec<ScopeValidateError>> {
    let names = instances(cluster);
    let mut errors = Vec::new();

    if names.is_empty() {
        if let Err(error) = validate(&global_config(cluster), schema) {
            errors.push(ScopeValidateError {
                instance: None,
                error,
            });
        }
    }

    for name in names {
        if let Err(error) = validate(&instantiate(cluster, &name), schema) {
            tracing::debug!(instance = %name, "Instance configuration is invalid");
            errors.push(ScopeValidateError {
                instance: Some(name),
                error,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::tarantool_schema;

    #[test]
    fn test_every_instance_is_reported() {
        let cluster = ClusterConfig::from_yaml(
            br#"
database:
  mode: rw
groups:
  g:
    replicasets:
      r:
        instances:
          a:
            wal:
              mode: sometimes
          b:
            memtx:
              memory: plenty
          c: {}
"#,
        )
        .unwrap();

        let errors = validate_cluster(&cluster, tarantool_schema()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].instance.as_deref(), Some("a"));
        assert!(errors[0].to_string().starts_with("instance \"a\": wal.mode: "));
        assert_eq!(errors[1].instance.as_deref(), Some("b"));
        assert!(errors[1].to_string().contains("memtx.memory"));
    }

    #[test]
    fn test_cluster_scope_without_instances() {
        let cluster = ClusterConfig::from_yaml(b"security:\n  disable_guest: '123'\n").unwrap();
        let errors = validate_cluster(&cluster, tarantool_schema()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].instance, None);
        assert!(errors[0].to_string().contains("security.disable_guest"));
    }

    #[test]
    fn test_valid_cluster() {
        let cluster = ClusterConfig::from_yaml(b"wal:\n  mode: write\n").unwrap();
        assert!(validate_cluster(&cluster, tarantool_schema()).is_ok());
    }
}
