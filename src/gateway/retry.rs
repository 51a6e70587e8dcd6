//! Retry policy for upstream stat fetches.
//!
//! Classification is data-driven: an error is transient when its code, its
//! status, or its lowercased message matches the configured sets. Backoff is
//! linear (`base * n` after the n-th failed attempt).

use crate::config::GatewayConfig;
use crate::error::SourceError;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    codes: HashSet<String>,
    statuses: HashSet<u16>,
    patterns: Vec<String>,
}

/// How a retried operation finished. `attempts` counts every upstream call
/// made, including the final one.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    Permanent { error: SourceError, attempts: u32 },
    Exhausted { error: SourceError, attempts: u32 },
}

impl RetryPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.retry_base_delay(),
            codes: config.transient_codes.iter().cloned().collect(),
            statuses: config.transient_statuses.iter().copied().collect(),
            patterns: config
                .transient_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_transient(&self, error: &SourceError) -> bool {
        if error.code.as_ref().is_some_and(|c| self.codes.contains(c)) {
            return true;
        }
        if error.status.is_some_and(|s| self.statuses.contains(&s)) {
            return true;
        }
        let message = error.message.to_lowercase();
        self.patterns.iter().any(|p| message.contains(p.as_str()))
    }

    /// Wait before the attempt that follows failed attempt `failed_attempt`.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        self.base_delay * failed_attempt
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget
    /// is spent. `op` receives the 1-based attempt number.
    pub async fn run<F, Fut, T>(&self, label: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    }
                }
                Err(error) if !self.is_transient(&error) => {
                    return RetryOutcome::Permanent {
                        error,
                        attempts: attempt,
                    }
                }
                Err(error) if attempt >= self.max_attempts => {
                    return RetryOutcome::Exhausted {
                        error,
                        attempts: attempt,
                    }
                }
                Err(error) => {
                    let wait = self.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {}ms",
                        label,
                        attempt,
                        self.max_attempts,
                        error,
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
