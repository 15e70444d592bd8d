//! Settings loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::settings::schema::ToolSettings;
use crate::settings::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate settings from TOML text.
pub fn parse_settings(content: &str) -> Result<ToolSettings, SettingsError> {
    let settings: ToolSettings = toml::from_str(content)?;
    validate_settings(&settings).map_err(SettingsError::Validation)?;
    Ok(settings)
}

/// Load and validate settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<ToolSettings, SettingsError> {
    let content = fs::read_to_string(path)?;
    let settings = parse_settings(&content)?;
    tracing::debug!(path = %path.display(), "Settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings = parse_settings("[env]\nprefix = \"APP_\"\n").unwrap();
        assert_eq!(settings.env.prefix, "APP_");
        assert!(settings.env.enabled);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = parse_settings("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(parse_settings("[logging"), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_backend_location_is_not_a_setting() {
        let settings = parse_settings("[connection]\nprefix = \"\"\ntimeout_secs = 0\n").unwrap();
        assert_eq!(settings, ToolSettings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster-config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\njson = true\n").unwrap();

        let settings = load_settings(&path).unwrap();
        assert!(settings.logging.json);
        assert!(matches!(
            load_settings(&dir.path().join("missing.toml")),
            Err(SettingsError::Io(_))
        ));
    }
}
