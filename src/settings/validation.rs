//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value formats (env prefix, log level)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ToolSettings → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::settings::schema::ToolSettings;

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single invalid setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted settings field, e.g. `env.prefix`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check settings, collecting every problem.
pub fn validate_settings(settings: &ToolSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.env.enabled && settings.env.prefix.is_empty() {
        errors.push(ValidationError::new("env.prefix", "must not be empty when env is enabled"));
    }

    let level = settings.logging.level.to_lowercase();
    if !LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "logging.level",
            format!("must be one of {}, got {:?}", LEVELS.join(", "), settings.logging.level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
