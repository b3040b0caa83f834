//! Retry utilities with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::IngestionConfig;

/// Provider `error.type` / `error.code` values that mark a response as throttling.
const RATE_LIMIT_CODES: &[&str] = &["rate_limit_exceeded", "insufficient_quota"];

/// Decide whether an HTTP API failure is throttling.
///
/// Only the status and the provider's structured error codes count. Free-form messages are
/// never inspected, so ids or token counts in them cannot flip the result.
pub fn is_rate_limited(status: Option<u16>, codes: &[&str]) -> bool {
    status == Some(429) || codes.iter().any(|code| RATE_LIMIT_CODES.contains(code))
}

/// Decide whether a gRPC failure is throttling.
pub fn is_grpc_rate_limited(code: tonic::Code) -> bool {
    code == tonic::Code::ResourceExhausted
}

/// Backoff policy for one retried operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, before jitter.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier (delay *= multiplier after each retry).
    pub multiplier: f64,
    /// Cuts a backoff sleep short and stops further attempts.
    pub cancel: Option<CancellationToken>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            cancel: None,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt bound.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Build a policy from the ingestion settings.
    pub fn from_config(config: &IngestionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_secs(config.max_delay_secs),
            ..Default::default()
        }
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Abandon the loop when `cancel` fires during a backoff sleep.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Delay after the `failures`-th retryable failure, with `jitter` in `[0, 1)` seconds.
    pub fn backoff_delay(&self, failures: u32, jitter: f64) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let exponential = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = (exponential + jitter).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run out.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> RetryResult<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_notify(operation, |_, _, _| {}).await
    }

    /// Like [`execute`](Self::execute), calling `on_retry(attempt, delay, error)` before
    /// each backoff sleep.
    pub async fn execute_notify<T, E, F, Fut, N>(
        &self,
        mut operation: F,
        mut on_retry: N,
    ) -> RetryResult<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        N: FnMut(u32, Duration, &E),
    {
        let mut state = RetryState::new(self.max_attempts.max(1));

        loop {
            state.attempts += 1;

            match operation().await {
                Ok(value) => {
                    state.succeeded = true;
                    return RetryResult::Success { value, state };
                }
                Err(error) => {
                    if !error.is_retryable() || state.attempts >= state.max_attempts {
                        return RetryResult::Failed {
                            last_error: error,
                            state,
                        };
                    }

                    let delay = self.backoff_delay(state.attempts, jitter_fraction());
                    warn!(
                        attempt = state.attempts,
                        max_attempts = state.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retryable failure, backing off"
                    );
                    on_retry(state.attempts, delay, &error);
                    state.delays.push(delay);

                    if !self.backoff(delay).await {
                        info!(attempt = state.attempts, "retry abandoned on cancellation");
                        state.cancelled = true;
                        return RetryResult::Failed {
                            last_error: error,
                            state,
                        };
                    }
                }
            }
        }
    }

    /// Sleep for `delay`; false if cancellation fired first.
    async fn backoff(&self, delay: Duration) -> bool {
        match self.cancel {
            Some(ref cancel) => tokio::select! {
                _ = sleep(delay) => true,
                _ = cancel.cancelled() => false,
            },
            None => {
                sleep(delay).await;
                true
            }
        }
    }
}

/// Attempt bookkeeping for a single retry loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempts: u32,
    pub max_attempts: u32,
    pub succeeded: bool,
    /// The loop stopped because cancellation fired while backing off.
    pub cancelled: bool,
    /// Backoff sleeps taken, in order.
    pub delays: Vec<Duration>,
}

impl RetryState {
    fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }
}

/// Retry result indicating what happened.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success { value: T, state: RetryState },
    /// Operation failed fatally or after all attempts.
    Failed { last_error: E, state: RetryState },
}

impl<T, E> RetryResult<T, E> {
    /// Convert to a Result, discarding retry information.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success { value, .. } => Ok(value),
            RetryResult::Failed { last_error, .. } => Err(last_error),
        }
    }

    /// Split into the outcome and the final retry state.
    pub fn into_parts(self) -> (Result<T, E>, RetryState) {
        match self {
            RetryResult::Success { value, state } => (Ok(value), state),
            RetryResult::Failed { last_error, state } => (Err(last_error), state),
        }
    }

    pub fn state(&self) -> &RetryState {
        match self {
            RetryResult::Success { state, .. } | RetryResult::Failed { state, .. } => state,
        }
    }
}

/// Determines if an error is retryable.
pub trait Retryable {
    /// Returns true if the operation should be retried.
    fn is_retryable(&self) -> bool;
}

/// Uniform-ish jitter in `[0, 1)` taken from the clock's sub-second nanos.
fn jitter_fraction() -> f64 {
    // Not cryptographically random; only needs to desynchronize callers.
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos) / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.0.contains("transient")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_first_attempt() {
        let counter = AtomicU32::new(0);
        let result = RetryPolicy::default()
            .execute(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>("success")
            })
            .await;

        assert_eq!(result.state().attempts, 1);
        assert!(result.state().delays.is_empty());
        assert_eq!(result.into_result().unwrap(), "success");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_retries() {
        let counter = AtomicU32::new(0);
        let k = 4;
        let result = RetryPolicy::new(5)
            .execute(|| async {
                let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if count < k {
                    Err(TestError("transient 429".to_string()))
                } else {
                    Ok(count)
                }
            })
            .await;

        let (outcome, state) = result.into_parts();
        assert_eq!(outcome.unwrap(), k);
        assert!(state.succeeded);
        assert_eq!(state.attempts, k);
        assert_eq!(state.delays.len(), (k - 1) as usize);
        // Jitter is below one second, so each delay is at least the previous minus one second.
        for pair in state.delays.windows(2) {
            assert!(pair[1] + Duration::from_secs(1) >= pair[0]);
            assert!(pair[1] >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_non_retryable_error() {
        let counter = AtomicU32::new(0);
        let result = RetryPolicy::new(5)
            .execute(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError("permanent auth failure".to_string()))
            })
            .await;

        match result {
            RetryResult::Failed { last_error, state } => {
                assert_eq!(state.attempts, 1);
                assert!(state.delays.is_empty());
                assert!(!state.succeeded);
                assert_eq!(last_error.0, "permanent auth failure");
            }
            _ => panic!("expected failure"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted() {
        let counter = AtomicU32::new(0);
        let mut notified = Vec::new();
        let result = RetryPolicy::new(3)
            .execute_notify(
                || async {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(TestError("transient quota".to_string()))
                },
                |attempt, _, _| notified.push(attempt),
            )
            .await;

        match result {
            RetryResult::Failed { state, .. } => {
                assert_eq!(state.attempts, 3);
                assert_eq!(state.delays.len(), 2);
            }
            _ => panic!("expected failure"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(notified, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let counter = AtomicU32::new(0);
        let result = RetryPolicy::new(0)
            .execute(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError("transient".to_string()))
            })
            .await;

        assert_eq!(result.state().attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_delay_formula() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1, 0.0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2, 0.0), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3, 0.5), Duration::from_millis(4500));
        assert_eq!(policy.backoff_delay(10, 0.0), Duration::from_secs(60));
        assert_eq!(policy.backoff_delay(u32::MAX, 0.9), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_respects_custom_cap() {
        let policy = RetryPolicy::new(5)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(250))
            .with_multiplier(3.0);
        assert_eq!(policy.backoff_delay(1, 0.0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2, 0.0), Duration::from_millis(250));
    }

    #[test]
    fn test_jitter_in_unit_interval() {
        for _ in 0..100 {
            let j = jitter_fraction();
            assert!((0.0..1.0).contains(&j));
        }
    }

    #[test]
    fn test_is_rate_limited() {
        assert!(is_rate_limited(Some(429), &[]));
        assert!(is_rate_limited(Some(400), &["insufficient_quota"]));
        assert!(is_rate_limited(None, &["requests", "rate_limit_exceeded"]));
        assert!(!is_rate_limited(Some(401), &["invalid_request_error", "invalid_api_key"]));
        assert!(!is_rate_limited(Some(400), &["invalid_request_error"]));
        assert!(!is_rate_limited(None, &[]));
    }

    #[test]
    fn test_is_grpc_rate_limited() {
        assert!(is_grpc_rate_limited(tonic::Code::ResourceExhausted));
        assert!(!is_grpc_rate_limited(tonic::Code::NotFound));
        assert!(!is_grpc_rate_limited(tonic::Code::Unavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retrying() {
        let counter = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let result = RetryPolicy::new(5)
            .with_cancellation(cancel)
            .execute(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError("transient 503".to_string()))
            })
            .await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        match result {
            RetryResult::Failed { state, .. } => {
                assert!(state.cancelled);
                assert_eq!(state.attempts, 1);
            }
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncancelled_token_does_not_shorten_backoff() {
        let result = RetryPolicy::new(2)
            .with_cancellation(CancellationToken::new())
            .execute(|| async { Err::<(), _>(TestError("transient".to_string())) })
            .await;

        let state = result.state();
        assert_eq!(state.attempts, 2);
        assert!(!state.cancelled);
    }
}
