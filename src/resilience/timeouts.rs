//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every backend call with a timeout
//! - Carry one overall deadline across the calls of a retry loop
//! - Turn client failures into `StorageError` with operation context
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities and `tokio::time::Instant`, so tests can pause the clock
//! - Timeout errors are distinct from other errors
//! - An expired deadline is reported before the next call is issued

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout, Instant};

use crate::collector::StorageError;

/// Run `call` with a timeout, mapping client errors into [`StorageError::Backend`].
pub async fn with_timeout<T, E, F>(
    limit: Duration,
    operation: &str,
    target: &str,
    call: F,
) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StorageError::Backend {
            operation: operation.to_string(),
            target: target.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Err(StorageError::Timeout {
            operation: operation.to_string(),
            timeout: limit,
        }),
    }
}

/// Overall deadline shared by a sequence of calls.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    /// Time left, or a timeout error once the deadline has passed.
    pub fn check(&self, operation: &str) -> Result<Duration, StorageError> {
        let now = Instant::now();
        if now >= self.at {
            return Err(StorageError::Timeout {
                operation: operation.to_string(),
                timeout: self.timeout,
            });
        }
        Ok(self.at - now)
    }

    /// Run `call` with whatever time is left.
    pub async fn run<T, E, F>(&self, operation: &str, target: &str, call: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let remaining = self.check(operation)?;
        match timeout(remaining, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StorageError::Backend {
                operation: operation.to_string(),
                target: target.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(StorageError::Timeout {
                operation: operation.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}
