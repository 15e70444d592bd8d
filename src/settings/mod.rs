//! Tool settings subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ToolSettings (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, parse_settings, SettingsError};
pub use schema::{EnvSettings, LoggingSettings, ToolSettings};
pub use validation::{validate_settings, ValidationError};
