//! Schema validation of configuration trees.
//!
//! # Responsibilities
//! - Check values against a declarative list of (path, validator) pairs
//! - Aggregate every violation, keyed by configuration path
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - The schema is advisory: paths absent from the tree are skipped
//! - Null values count as "not set" and are skipped
//! - Errors at the same path are coalesced; output is sorted by depth, then by path

pub mod schema;
pub mod validators;

use std::collections::BTreeMap;
use std::fmt;

use crate::tree::{PathConfig, PathError, Value};

pub use schema::{tarantool_schema, SCHEMA_VERSION};
pub use validators::{
    AllowedValidator, AnyValidator, ArrayValidator, BooleanValidator, IntegerValidator,
    MapValidator, NumberValidator, RecordValidator, SequenceValidator, StringValidator, Validator,
};

/// A declarative validation rule.
pub struct SchemaPath {
    pub path: Vec<String>,
    pub validator: Box<dyn Validator>,
}

impl SchemaPath {
    /// Rule for a dotted path such as `wal.dir`.
    pub fn new(dotted: &str, validator: Box<dyn Validator>) -> Self {
        Self {
            path: dotted.split('.').map(str::to_string).collect(),
            validator,
        }
    }
}

/// A validation failure tree keyed by configuration path.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidateError {
    /// A leaf failure.
    Reason(String),
    /// Failures under a path relative to the enclosing node.
    Path {
        path: Vec<String>,
        causes: Vec<ValidateError>,
    },
}

impl ValidateError {
    pub fn reason(message: impl Into<String>) -> Self {
        ValidateError::Reason(message.into())
    }

    /// Wrap `cause` under `path`.
    pub fn at(path: Vec<String>, cause: ValidateError) -> Self {
        ValidateError::Path {
            path,
            causes: vec![cause],
        }
    }

    /// Collect several failures at the current position.
    pub fn group(mut causes: Vec<ValidateError>) -> Self {
        if causes.len() == 1 {
            return causes.remove(0);
        }
        ValidateError::Path {
            path: Vec::new(),
            causes,
        }
    }

    /// Every leaf failure with its full path.
    pub fn leaves(&self) -> Vec<(Vec<String>, String)> {
        let mut out = Vec::new();
        self.collect_leaves(&[], &mut out);
        out
    }

    fn collect_leaves(&self, prefix: &[String], out: &mut Vec<(Vec<String>, String)>) {
        match self {
            ValidateError::Reason(message) => out.push((prefix.to_vec(), message.clone())),
            ValidateError::Path { path, causes } => {
                let mut full = prefix.to_vec();
                full.extend(path.iter().cloned());
                for cause in causes {
                    cause.collect_leaves(&full, out);
                }
            }
        }
    }
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (path, message)) in self.leaves().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            if path.is_empty() {
                write!(f, "{}", message)?;
            } else {
                write!(f, "{}: {}", path.join("."), message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidateError {}

/// Coalesce errors with identical paths and sort by depth, then lexicographically.
///
/// Top-level reasons are grouped under the empty path. Duplicate causes are dropped.
pub fn merge_by_path(errors: Vec<ValidateError>) -> Vec<ValidateError> {
    let mut by_path: BTreeMap<Vec<String>, Vec<ValidateError>> = BTreeMap::new();
    for error in errors {
        let (path, causes) = match error {
            ValidateError::Path { path, causes } => (path, causes),
            reason => (Vec::new(), vec![reason]),
        };
        let merged = by_path.entry(path).or_default();
        for cause in causes {
            if !merged.contains(&cause) {
                merged.push(cause);
            }
        }
    }

    let mut nodes: Vec<(Vec<String>, Vec<ValidateError>)> = by_path.into_iter().collect();
    nodes.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
    nodes
        .into_iter()
        .map(|(path, causes)| ValidateError::Path { path, causes })
        .collect()
}

/// Validate every schema path present in `config`.
pub fn validate(config: &PathConfig, schema: &[SchemaPath]) -> Result<(), ValidateError> {
    let mut errors = Vec::new();
    for rule in schema {
        match config.get(&rule.path) {
            Ok(Value::Null) | Err(PathError::NotExist { .. }) => continue,
            Ok(value) => {
                if let Err(e) = rule.validator.validate(value) {
                    errors.push(ValidateError::at(rule.path.clone(), e));
                }
            }
            Err(PathError::NotAMap { path }) => {
                let actual = config
                    .get(&path)
                    .map(|v| format!("{} {}", v.type_name(), v))
                    .unwrap_or_default();
                errors.push(ValidateError::at(
                    path,
                    ValidateError::reason(format!("expected map, got {}", actual)),
                ));
            }
        }
    }

    let merged = merge_by_path(errors);
    if merged.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Path {
            path: Vec::new(),
            causes: merged,
        })
    }
}
