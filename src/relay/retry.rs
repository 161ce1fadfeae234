//! Bounded retry with backoff for sink calls

use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on configured attempts
const MAX_ATTEMPTS: u32 = 100;

/// Retry policy: how many attempts a call gets and how long to wait between them
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Wait before the second attempt
    pub initial_backoff: Duration,
    /// Cap on any single wait
    pub max_backoff: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential)
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
    /// Whether to use exponential backoff
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            exponential: true,
        }
    }
}

impl RetryPolicy {
    /// Default backoff with the given attempt count
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            ..Default::default()
        }
    }

    /// Create a policy with fixed backoff
    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            initial_backoff: backoff,
            max_backoff: backoff,
            exponential: false,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    /// Wait before the attempt following `attempts_made` failed attempts
    pub fn next_backoff(&self, attempts_made: u32) -> Duration {
        if attempts_made == 0 {
            return Duration::ZERO;
        }

        let base = if self.exponential {
            let exponent = attempts_made.saturating_sub(1).min(30) as i32;
            let multiplier = self.backoff_multiplier.powi(exponent);
            if multiplier.is_finite() {
                Duration::from_secs_f64(
                    (self.initial_backoff.as_secs_f64() * multiplier)
                        .min(self.max_backoff.as_secs_f64()),
                )
            } else {
                self.max_backoff
            }
        } else {
            self.initial_backoff
        };

        let capped = base.min(self.max_backoff);
        let jitter = capped.as_secs_f64() * self.jitter_factor * rand::random::<f64>();
        let with_jitter = Duration::from_secs_f64(capped.as_secs_f64() + jitter);

        debug!(
            "Calculated backoff after {} attempt(s): {:?} (base: {:?})",
            attempts_made, with_jitter, base
        );

        with_jitter
    }

    /// Check if another attempt is allowed after `attempts_made` attempts
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Retry result
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Success, possibly after retries
    Success { value: T, attempts: u32 },
    /// Failed after exhausting the attempts or on a non-retryable error
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. } | RetryResult::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create a new retry executor
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute an operation, retrying every error
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_with_predicate(operation, |_| true).await
    }

    /// Execute an operation, retrying only errors accepted by `should_retry`
    pub async fn execute_with_predicate<F, Fut, P, T, E>(
        &self,
        mut operation: F,
        mut should_retry: P,
    ) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!("Operation succeeded after {} attempts", attempts);
                    }
                    return RetryResult::Success { value, attempts };
                }
                Err(error) => {
                    if !self.policy.should_retry(attempts) || !should_retry(&error) {
                        warn!(
                            "Operation failed (attempt {}/{}), giving up: {}",
                            attempts, self.policy.max_attempts, error
                        );
                        return RetryResult::Failed { error, attempts };
                    }

                    let backoff = self.policy.next_backoff(attempts);
                    warn!(
                        "Operation failed (attempt {}/{}), retrying in {:?}: {}",
                        attempts, self.policy.max_attempts, backoff, error
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            ..Default::default()
        };

        assert_eq!(policy.next_backoff(0), Duration::ZERO);

        let first = policy.next_backoff(1);
        assert!(first >= Duration::from_millis(100));
        assert!(first < Duration::from_millis(200));

        let second = policy.next_backoff(2);
        assert!(second >= Duration::from_millis(200));
        assert!(second < Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..Default::default()
        };
        assert_eq!(policy.next_backoff(40), Duration::from_secs(2));
    }

    #[test]
    fn test_fixed_backoff() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));

        assert_eq!(policy.next_backoff(0), Duration::ZERO);
        assert_eq!(policy.next_backoff(1), Duration::from_millis(500));
        assert_eq!(policy.next_backoff(2), Duration::from_millis(500));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[tokio::test]
    async fn test_retry_executor_recovers() {
        let executor = RetryExecutor::new(RetryPolicy::fixed(3, Duration::from_millis(1)));
        let count = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute(|| {
                let count = Arc::clone(&count);
                async move {
                    if count.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("temporary error")
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        match result {
            RetryResult::Success { value, attempts } => {
                assert_eq!(value, "success");
                assert_eq!(attempts, 3);
            }
            RetryResult::Failed { .. } => panic!("Expected success"),
        }
    }

    #[tokio::test]
    async fn test_retry_executor_exhausts() {
        let executor = RetryExecutor::new(RetryPolicy::fixed(2, Duration::ZERO));
        let count = Arc::new(AtomicU32::new(0));

        let result: RetryResult<(), &str> = executor
            .execute(|| {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err("down")
                }
            })
            .await;

        assert!(!result.is_success());
        assert_eq!(result.attempts(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_predicate_stops_on_permanent_error() {
        let executor = RetryExecutor::new(RetryPolicy::fixed(5, Duration::ZERO));

        let result: RetryResult<(), &str> = executor
            .execute_with_predicate(|| async { Err("permanent") }, |_| false)
            .await;

        assert_eq!(result.attempts(), 1);
    }
}
