// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Retry policy for external metadata sources.
//!
//! Transient failures (5xx, timeouts, connection errors) are retried with
//! exponential backoff under a wall-clock budget. Permanent failures
//! (4xx other than 429) are surfaced immediately.

use rand::Rng;
use std::time::{Duration, Instant};

/// Error from an external fetch, classified for retry purposes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Retrying cannot help (bad request, auth failure, missing resource).
    #[error("permanent: {0}")]
    Permanent(String),
    /// Worth retrying (server error, timeout, rate limit).
    #[error("transient: {0}")]
    Transient(String),
}

impl FetchError {
    /// Classify an HTTP status. 429 counts as transient; other 4xx are
    /// permanent.
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            429 => FetchError::Transient(format!("{context}: HTTP 429")),
            400..=499 => FetchError::Permanent(format!("{context}: HTTP {status}")),
            _ => FetchError::Transient(format!("{context}: HTTP {status}")),
        }
    }

    /// Classify a reqwest error: everything at the transport level is
    /// transient.
    pub fn from_reqwest(err: reqwest::Error, context: &str) -> Self {
        FetchError::Transient(format!("{context}: {err}"))
    }
}

/// Exponential backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub initial_backoff: Duration,
    /// Wall-clock budget across all tries, including sleeps.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 3,
            initial_backoff: Duration::from_millis(500),
            max_elapsed: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Looser policy for slow sources (lyric pages, wikitext fetches).
    pub fn extended() -> Self {
        Self {
            max_tries: 5,
            initial_backoff: Duration::from_millis(500),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

/// Run `f` under the policy, sleeping between transient failures.
///
/// Returns the first success, the first permanent error, or the last
/// transient error once tries or the time budget run out.
pub async fn with_retry<T, Fut, F>(
    policy: &RetryPolicy,
    op: &str,
    mut f: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    let started = Instant::now();
    let mut last_err;
    let mut attempt: u32 = 0;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err @ FetchError::Permanent(_)) => {
                tracing::debug!(op, error = %err, "Giving up on permanent error");
                return Err(err);
            }
            Err(err) => {
                tracing::debug!(op, attempt, error = %err, "Transient fetch error");
                last_err = err;
            }
        }

        attempt += 1;
        if attempt >= policy.max_tries {
            return Err(last_err);
        }

        // Exponential backoff with a little jitter
        let backoff = policy.initial_backoff * 2u32.saturating_pow(attempt - 1);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
        let delay = backoff + jitter;

        if started.elapsed() + delay >= policy.max_elapsed {
            tracing::debug!(op, "Retry time budget exhausted");
            return Err(last_err);
        }

        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_tries: u32) -> RetryPolicy {
        RetryPolicy {
            max_tries,
            initial_backoff: Duration::from_millis(1),
            max_elapsed: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            FetchError::from_status(429, "x"),
            FetchError::Transient(_)
        ));
        assert!(matches!(
            FetchError::from_status(404, "x"),
            FetchError::Permanent(_)
        ));
        assert!(matches!(
            FetchError::from_status(503, "x"),
            FetchError::Transient(_)
        ));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(5), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FetchError::Transient("boom".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(5), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Permanent("nope".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(FetchError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_tries_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Transient("still down".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(FetchError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
