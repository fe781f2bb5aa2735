use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::{Error, QueueEvent, QueueRuntime, RateLimitSignal, is_rate_limited};

pub const RATE_LIMIT_JITTER_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }
}

/// `base * 3^attempt + jitter`.
pub fn rate_limit_delay(base: Duration, attempt: u32, jitter: Duration) -> Duration {
    base.saturating_mul(3u32.saturating_pow(attempt))
        .saturating_add(jitter)
}

/// `base * 2^attempt`.
pub fn generic_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..RATE_LIMIT_JITTER_MS))
}

/// Runs `action` until it succeeds or `policy.max_retries` retries are spent.
///
/// Rate-limit failures wait `base * 3^attempt` plus up to a second of jitter and
/// are announced through `runtime`. Other failures wait `base * 2^attempt`
/// quietly. When retries run out the last error is returned as-is.
pub async fn retry_with_backoff<T, E, F, Fut>(
    action: F,
    policy: &BackoffPolicy,
    runtime: &dyn QueueRuntime,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RateLimitSignal + Display,
{
    retry_with_backoff_when(action, policy, runtime, |_| true).await
}

/// Same as [`retry_with_backoff`], but an error for which `retryable` returns
/// false is handed back immediately.
pub async fn retry_with_backoff_when<T, E, F, Fut, P>(
    mut action: F,
    policy: &BackoffPolicy,
    runtime: &dyn QueueRuntime,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RateLimitSignal + Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        let err = match action().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !retryable(&err) {
            return Err(err);
        }

        if attempt >= policy.max_retries {
            tracing::debug!(attempt, error = %err, "retries_exhausted");
            return Err(err);
        }

        let delay = if is_rate_limited(&err) {
            let delay = rate_limit_delay(policy.base_delay, attempt, jitter());
            runtime.emit(QueueEvent::RetryScheduled {
                attempt: attempt + 1,
                delay_ms: delay.as_millis() as u64,
                error: err.to_string(),
            });
            delay
        } else {
            let delay = generic_delay(policy.base_delay, attempt);
            tracing::debug!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retry_scheduled"
            );
            delay
        };

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Races `fut` against a timer. The future is dropped on expiry; anything it
/// already sent over the network is not recalled.
pub async fn with_timeout<T, E, F>(fut: F, limit: Duration) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Error>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(limit).into()),
    }
}
