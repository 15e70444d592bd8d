//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a storage backend:
//!     → timeouts.rs (per-call timeout, or the remainder of an overall deadline)
//!     → On conflict: only the "all" publish CAS loop retries, under the same deadline
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - No automatic reconnect or backoff; that belongs to the calling tool
//! - Conflicts on key-scoped writes are returned to the caller, never retried here

pub mod timeouts;
