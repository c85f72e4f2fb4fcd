use std::{fmt::Display, future::Future, time::Duration};

/// How a failed upstream call should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient: back off and try again while attempts remain
    Retryable,
    /// Server asked us to slow down; wait for the hint (if any) and retry
    RateLimited(Option<Duration>),
    /// Nothing will succeed this run (bad credentials, misconfiguration)
    Fatal,
    /// Give up on the current unit of work only
    AbandonUnit,
}

/// Errors that know how they should be retried
pub trait Classify {
    fn classify(&self) -> ErrorClass;
}

/// Bounded exponential backoff with rate-limit awareness
///
/// Rate-limited responses are retried after the server's hint and do not
/// consume an attempt; transient errors double the delay each time.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            default_retry_after: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            default_retry_after: base_delay,
        }
    }

    /// Policy with no waiting, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Runs `op` until it succeeds or its error says to stop
    ///
    /// Returns the last error once transient attempts are exhausted.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let mut failures = 0u32;

        loop {
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match error.classify() {
                ErrorClass::RateLimited(hint) => {
                    let wait = hint.unwrap_or(self.default_retry_after);
                    tracing::warn!(
                        operation,
                        retry_after_secs = wait.as_secs_f64(),
                        "Rate limited, retrying after server hint"
                    );
                    tokio::time::sleep(wait).await;
                }
                ErrorClass::Retryable => {
                    failures += 1;
                    if failures >= self.max_attempts {
                        tracing::error!(
                            operation,
                            attempts = failures,
                            error = %error,
                            "Max retries reached"
                        );
                        return Err(error);
                    }
                    let wait = self.backoff(failures);
                    tracing::warn!(
                        operation,
                        attempt = failures + 1,
                        max_attempts = self.max_attempts,
                        delay_secs = wait.as_secs_f64(),
                        error = %error,
                        "Transient failure, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                ErrorClass::Fatal | ErrorClass::AbandonUnit => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(ErrorClass);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    impl Classify for TestError {
        fn classify(&self) -> ErrorClass {
            self.0
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_secs(5));
        assert_eq!(policy.backoff(1), Duration::from_secs(5));
        assert_eq!(policy.backoff(2), Duration::from_secs(10));
        assert_eq!(policy.backoff(3), Duration::from_secs(20));
        assert_eq!(policy.backoff(4), Duration::from_secs(40));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retryable_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::immediate(5);

        let result: Result<(), TestError> = policy
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TestError(ErrorClass::Retryable))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_rate_limit_does_not_consume_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::immediate(2);

        let result: Result<u32, TestError> = policy
            .run("test", move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 6 {
                    Err(TestError(ErrorClass::RateLimited(Some(Duration::ZERO))))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_abandon_and_fatal_return_immediately() {
        for class in [ErrorClass::AbandonUnit, ErrorClass::Fatal] {
            let calls = AtomicU32::new(0);
            let counter = &calls;
            let result: Result<(), TestError> = RetryPolicy::immediate(5)
                .run("test", move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(TestError(class))
                })
                .await;

            assert_eq!(result.unwrap_err().0, class);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::immediate(3);

        let result: Result<&str, TestError> =
            tokio_test::block_on(policy.run("test", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TestError(ErrorClass::Retryable))
                } else {
                    Ok("page")
                }
            }));

        assert_eq!(result.unwrap(), "page");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
