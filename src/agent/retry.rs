//! Retry/recovery controller
//!
//! Exponential backoff with a cap and optional +/-25% jitter, applied to an
//! async operation whose errors classify themselves through `Retryable`.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::domain::ToolFailure;
use crate::llm::LlmError;

/// Errors that know whether another attempt could help
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Minimum wait requested by the other side, e.g. a rate limit
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        LlmError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl Retryable for ToolFailure {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Backoff parameters for one call path
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without waiting
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
            ..Self::default()
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_ms = self.max_backoff.as_millis() as f64;
        let mut ms = self.base_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        if !ms.is_finite() || ms > max_ms {
            ms = max_ms;
        }
        if self.jitter && ms > 0.0 {
            let factor: f64 = rand::rng().random_range(-0.25..=0.25);
            ms = (ms * (1.0 + factor)).min(max_ms);
        }
        Duration::from_millis(ms.max(0.0) as u64)
    }
}

/// Why the controller gave up
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::fmt::Display> {
    /// Non-retryable error, surfaced at once
    #[error("permanent failure after {attempts} attempt(s): {error}")]
    Permanent { attempts: u32, error: E },

    /// Every attempt failed with a retryable error
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E: std::fmt::Display> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempts, .. } | RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The last underlying error
    pub fn error(&self) -> &E {
        match self {
            RetryError::Permanent { error, .. } => error,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    pub fn into_error(self) -> E {
        match self {
            RetryError::Permanent { error, .. } => error,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Final result plus the retryable errors that preceded it
#[derive(Debug)]
pub struct RetryReport<T, E: std::fmt::Display> {
    pub result: Result<T, RetryError<E>>,
    /// Errors of the attempts that were retried, oldest first
    pub retried: Vec<E>,
}

impl<T, E: std::fmt::Display> RetryReport<T, E> {
    /// Total attempts made
    pub fn attempts(&self) -> u32 {
        self.retried.len() as u32 + 1
    }
}

/// Run `op` under `policy`. `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, stage: &str, mut op: F) -> RetryReport<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut retried = Vec::new();
    let mut attempt = 1;

    loop {
        let error = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}/{}", stage, attempt, max_attempts);
                }
                return RetryReport {
                    result: Ok(value),
                    retried,
                };
            }
            Err(error) => error,
        };

        if !error.is_retryable() {
            debug!("{} attempt {}/{} failed permanently: {}", stage, attempt, max_attempts, error);
            return RetryReport {
                result: Err(RetryError::Permanent { attempts: attempt, error }),
                retried,
            };
        }

        if attempt >= max_attempts {
            warn!("{} failed after {} attempts: {}", stage, attempt, error);
            return RetryReport {
                result: Err(RetryError::Exhausted { attempts: attempt, last: error }),
                retried,
            };
        }

        let mut delay = policy.delay_for(attempt);
        if let Some(requested) = error.retry_after() {
            delay = delay.max(requested.min(policy.max_backoff));
        }
        warn!(
            "{} attempt {}/{} failed: {}; retrying in {}ms",
            stage,
            attempt,
            max_attempts,
            error,
            delay.as_millis()
        );
        retried.push(error);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (retryable={})", self.retryable)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_millis(1000),
            jitter: false,
        }
    }

    #[test]
    fn test_delay_exponential_with_cap() {
        let p = policy(10);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(p.delay_for(4), Duration::from_millis(800));
        assert_eq!(p.delay_for(5), Duration::from_millis(1000));
        assert_eq!(p.delay_for(200), Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_jitter_range() {
        let p = RetryPolicy {
            jitter: true,
            max_backoff: Duration::from_secs(60),
            ..policy(5)
        };
        for _ in 0..50 {
            let d = p.delay_for(3).as_millis();
            assert!((300..=500).contains(&d), "delay out of range: {}", d);
        }
    }

    #[test]
    fn test_immediate_policy_has_no_delay() {
        let p = RetryPolicy::immediate(3);
        assert_eq!(p.delay_for(1), Duration::ZERO);
        assert_eq!(p.delay_for(3), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let calls = AtomicU32::new(0);
        let report = retry(&policy(3), "test", |_| async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 { Err(TestError { retryable: true }) } else { Ok(n) }
        })
        .await;

        assert_eq!(report.attempts(), 3);
        assert_eq!(report.retried.len(), 2);
        assert_eq!(report.result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let report: RetryReport<(), TestError> = retry(&policy(3), "test", |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError { retryable: true })
        })
        .await;

        assert!(matches!(report.result, Err(RetryError::Exhausted { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff between the three attempts
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let report: RetryReport<(), TestError> = retry(&policy(3), "test", |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError { retryable: false })
        })
        .await;

        let err = report.result.unwrap_err();
        assert!(matches!(err, RetryError::Permanent { attempts: 1, .. }));
        assert!(!err.error().retryable);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_number_passed_to_op() {
        let mut seen = Vec::new();
        let _: RetryReport<(), TestError> = retry(&RetryPolicy::immediate(3), "test", |attempt| {
            seen.push(attempt);
            async { Err(TestError { retryable: true }) }
        })
        .await;
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_wait_is_honored() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let report = retry(&policy(2), "llm", |_| async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LlmError::RateLimited {
                    retry_after: Duration::from_millis(700),
                })
            } else {
                Ok("ok")
            }
        })
        .await;

        assert_eq!(report.result.unwrap(), "ok");
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }

    #[test]
    fn test_tool_failure_classification() {
        assert!(ToolFailure::timeout("slow").is_retryable());
        assert!(ToolFailure::external("503").is_retryable());
        assert!(!ToolFailure::invalid_arguments("bad").is_retryable());
        assert!(!ToolFailure::internal("bug").is_retryable());
    }
}
