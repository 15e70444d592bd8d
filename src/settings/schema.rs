//! Settings schema definitions.
//!
//! Settings of the tool itself, as opposed to the cluster configuration it
//! manages. All sections default, so an empty file is a valid settings file.
//! Network backend locations are not settings: the library takes them from
//! the caller together with an established connection.

use serde::{Deserialize, Serialize};

/// Root settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Environment variable layering.
    pub env: EnvSettings,

    pub logging: LoggingSettings,
}

/// Environment variable settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvSettings {
    /// Whether variables override the collected configuration.
    pub enabled: bool,

    /// Variable name prefix (e.g., "TT_" gives "TT_WAL_DIR").
    pub prefix: String,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "TT_".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` takes precedence.
    pub level: String,

    /// Emit JSON lines instead of plain text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
