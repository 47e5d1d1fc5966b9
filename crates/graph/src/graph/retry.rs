// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::error::GraphError;

/// Fallback wait for a 429 without a usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Upper bound on a single rate-limit wait.
pub const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Suspends between attempts.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Why an attempt failed, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// HTTP 429, with the parsed `Retry-After` seconds if present.
    RateLimited { retry_after: Option<u64> },
    /// HTTP 5xx, connect error, timeout or truncated body.
    Transient,
}

impl Failure {
    /// Classify `err`, or `None` when it must not be retried.
    pub fn of(err: &GraphError) -> Option<Self> {
        if !err.is_retryable() {
            return None;
        }
        Some(match *err {
            GraphError::RateLimited { retry_after_secs, .. } => {
                Self::RateLimited { retry_after: Some(retry_after_secs) }
            }
            _ => Self::Transient,
        })
    }
}

/// Retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Delay before retrying after `failure` on zero-based `attempt`, or `None`
    /// once the budget is spent.
    pub fn next_delay(&self, failure: Failure, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let secs = match failure {
            Failure::RateLimited { retry_after } => {
                retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS).min(MAX_RETRY_AFTER_SECS)
            }
            Failure::Transient => 1u64 << attempt.min(16),
        };
        Some(Duration::from_secs(secs))
    }
}

/// Parse a `Retry-After` header given in seconds. HTTP dates are ignored.
pub fn parse_retry_after(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
