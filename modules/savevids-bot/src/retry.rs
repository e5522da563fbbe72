//! Exponential-backoff retry around outbound calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use savevids_store::StoreError;
use twitter_client::TwitterError;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_transient(&self) -> bool;

    /// Minimum wait requested by the remote side, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for TwitterError {
    fn is_transient(&self) -> bool {
        TwitterError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        TwitterError::retry_after(self)
    }
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        StoreError::is_transient(self)
    }
}

/// `tries` attempts in total, waiting `delay` after the first failure and
/// multiplying the wait by `backoff` after each one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub tries: u32,
    pub delay: Duration,
    pub backoff: u32,
}

impl RetryPolicy {
    pub const fn new(tries: u32, delay: Duration, backoff: u32) -> Self {
        Self { tries, delay, backoff }
    }

    /// Same attempt count with no waiting. For tests.
    pub const fn immediate(tries: u32) -> Self {
        Self::new(tries, Duration::ZERO, 1)
    }

    /// Run `call` until it succeeds, fails permanently, or runs out of tries.
    /// The last error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, op: &str, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let tries = self.tries.max(1);
        let mut delay = self.delay;
        let mut attempt = 1;

        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= tries {
                error!(op, attempt, error = %err, "Retries exhausted");
                return Err(err);
            }

            let wait = match err.retry_after() {
                Some(hint) => hint.max(delay),
                None => delay + jitter(delay),
            };
            warn!(op, attempt, error = %err, wait_ms = wait.as_millis() as u64, "Transient failure, retrying");
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            delay = delay.saturating_mul(self.backoff);
            attempt += 1;
        }
    }
}

/// Up to a second of random spread, none when the base delay is zero.
pub(crate) fn jitter(base: Duration) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..1000))
}

/// One policy per kind of call site.
#[derive(Debug, Clone, Copy)]
pub struct RetryProfile {
    pub social_read: RetryPolicy,
    pub reply: RetryPolicy,
    pub store_read: RetryPolicy,
    pub store_write: RetryPolicy,
}

impl Default for RetryProfile {
    fn default() -> Self {
        Self {
            social_read: RetryPolicy::new(3, Duration::from_secs(3), 2),
            reply: RetryPolicy::new(3, Duration::from_secs(5), 2),
            store_read: RetryPolicy::new(3, Duration::from_secs(2), 2),
            store_write: RetryPolicy::new(3, Duration::from_secs(5), 2),
        }
    }
}

impl RetryProfile {
    /// Production attempt counts, no waiting.
    pub fn immediate() -> Self {
        let defaults = Self::default();
        Self {
            social_read: RetryPolicy::immediate(defaults.social_read.tries),
            reply: RetryPolicy::immediate(defaults.reply.tries),
            store_read: RetryPolicy::immediate(defaults.store_read.tries),
            store_write: RetryPolicy::immediate(defaults.store_write.tries),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .run("lookup", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TwitterError::Network("reset".into()))
                } else {
                    Ok("post")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "post");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_tries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(3)
            .run("lookup", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TwitterError::Api {
                    status: 503,
                    message: "over capacity".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(TwitterError::Api { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(3)
            .run("lookup", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TwitterError::NotFound("2".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_tries_still_attempts_once() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate(0)
            .run("lookup", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StoreError>(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_jitter_on_zero_delay() {
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
        assert!(jitter(Duration::from_secs(1)) < Duration::from_secs(1));
    }
}
