use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::config;

/// Errors that may be handed to [`retry_forever`].
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for mastodon_client::FeedError {
    fn is_retryable(&self) -> bool {
        mastodon_client::FeedError::is_retryable(self)
    }
}

/// Fixed-interval retry policy. Deliberately has no cap on attempts: the
/// poller prioritizes never giving up over bounding latency, and relies on
/// the shutdown signal to stop waiting.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(config::DEFAULT_RETRY_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The operation failed with a non-retryable error; surfaced as-is.
    #[error(transparent)]
    Fatal(E),
    /// Shutdown was signalled during the inter-retry wait.
    #[error("cancelled by shutdown signal")]
    Cancelled,
}

/// Run `op` until it succeeds, waiting one fixed interval between attempts.
///
/// Only retryable errors are absorbed; anything else surfaces immediately as
/// `Fatal`. The wait races the shutdown channel, so cancellation aborts
/// between attempts without re-invoking the operation.
pub async fn retry_forever<T, E, F, Fut>(
    policy: RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u64 = 1;
    loop {
        if *shutdown.borrow() {
            return Err(RetryError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    interval_secs = policy.interval.as_secs(),
                    "Transient error, waiting before retry"
                );
            }
            Err(e) => return Err(RetryError::Fatal(e)),
        }

        let sleep = tokio::time::sleep(policy.interval);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Err(RetryError::Cancelled);
                    }
                }
            }
        }
        attempt += 1;
    }
}
