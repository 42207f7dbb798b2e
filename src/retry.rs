//! Resilient Invocation Layer
//!
//! Wraps a fallible async call with bounded retry. Only errors for which
//! [`Error::is_transient`] holds are retried; the wait before retry number
//! `n` (counting failed attempts from 1) is `n²` time units. When the bound
//! is exhausted the last error is returned unchanged.

use crate::error::{Error, Result};
use backoff::backoff::Backoff;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

// =============================================================================
// Configuration
// =============================================================================

/// Retry policy of the invocation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Length of one backoff time unit in milliseconds
    pub unit_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            unit_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn unit(&self) -> Duration {
        Duration::from_millis(self.unit_ms)
    }

    /// Fresh backoff schedule for one invocation
    pub fn backoff(&self) -> QuadraticBackoff {
        QuadraticBackoff::new(self.max_attempts, self.unit())
    }
}

// =============================================================================
// Quadratic Backoff
// =============================================================================

/// Backoff schedule yielding `1², 2², …` units until the attempt bound
#[derive(Debug, Clone)]
pub struct QuadraticBackoff {
    failures: u32,
    max_attempts: u32,
    unit: Duration,
}

impl QuadraticBackoff {
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self {
            failures: 0,
            max_attempts: max_attempts.max(1),
            unit,
        }
    }
}

impl Backoff for QuadraticBackoff {
    fn reset(&mut self) {
        self.failures = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.max_attempts {
            return None;
        }
        Some(self.unit * self.failures * self.failures)
    }
}

// =============================================================================
// Retry
// =============================================================================

/// Run `operation`, retrying transient failures per `config`
///
/// `what` names the call in log lines.
pub async fn retry_transient<T, F, Fut>(config: &RetryConfig, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    backoff::future::retry_notify(
        config.backoff(),
        || {
            let call = operation();
            async move {
                call.await.map_err(|e| {
                    if e.is_transient() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        },
        |err: Error, wait: Duration| {
            attempt += 1;
            warn!(
                "Recovering from a failed {}. Try number {}, retrying in {:?}: {}",
                what, attempt, wait, err
            );
        },
    )
    .await
}
