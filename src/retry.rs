//! External retry execution.
//!
//! The dispatch core classifies failures; it never loops. [`retry`] is the
//! external executor that acts on the classification: it re-invokes a call
//! closure while the returned failure reports
//! [`is_retryable`](crate::Error::is_retryable), up to the policy's attempt
//! budget. Each re-invocation runs the closure from scratch, so the request
//! is rebuilt from the original arguments and no state from a failed
//! attempt is reused.

use bon::Builder;

use crate::platform::{Duration, sleep};

/// How often and how eagerly a retryable failure is re-invoked.
#[derive(Debug, Clone, Copy, Builder)]
#[builder(state_mod(name = "builder"))]
pub struct RetryPolicy {
    /// Total number of invocations allowed, including the first.
    #[builder(default = 3)]
    max_attempts: u32,

    /// Fixed pause between attempts.
    #[builder(default = Duration::from_millis(100))]
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Invokes `call` until it succeeds, fails terminally, or exhausts the
/// policy's attempts. The last failure is returned unchanged.
///
/// # Errors
///
/// Returns the final error produced by `call`, retryable or not.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut call: F) -> Result<T, E>
where
    E: crate::Error,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let budget = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < budget && err.is_retryable() => {
                tracing::debug!(attempt, "re-invoking retryable call");
                sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
