//! Bounded exponential backoff shared by state and history requests.

use crate::client::ClientError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// How often and how patiently a failed request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first failure.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (zero based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Result of a retried operation.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// Every attempt failed; carries the last error
    Failed(ClientError),
    Cancelled,
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns `false` when cancelled.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

/// Run `op` until it succeeds, the policy is exhausted, or `cancel` fires.
///
/// In-flight attempts are dropped on cancellation.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut op: F,
) -> Attempt<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut retry = 0;

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Attempt::Cancelled,
            result = op() => result,
        };

        let err = match result {
            Ok(value) => return Attempt::Done(value),
            Err(err) if retry >= policy.max_retries => return Attempt::Failed(err),
            Err(err) => err,
        };

        let wait = err
            .retry_after()
            .unwrap_or_else(|| policy.backoff(retry))
            .min(policy.max_backoff);
        tracing::warn!(
            "{} failed (attempt {}/{}): {}, retrying in {:?}",
            what,
            retry + 1,
            policy.max_retries + 1,
            err,
            wait
        );

        if !pause(wait, cancel).await {
            return Attempt::Cancelled;
        }
        retry += 1;
    }
}
