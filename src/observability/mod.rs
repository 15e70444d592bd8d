//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! collectors / publishers / CAS loop produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters by backend and outcome)
//! ```
//!
//! # Design Decisions
//! - Structured fields (prefix, key, attempt), never pre-formatted messages
//! - Metrics are cheap; without an installed recorder they are no-ops
//! - Stdout is left to the command output

pub mod logging;
pub mod metrics;
