//! Bounded retry with backoff for page rendering

use crate::config::RetryConfig;
use crate::crawler::renderer::NavigationError;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Delay before the retry that follows failed attempt `n` (zero-based)
pub type Backoff = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// How often an operation is attempted and how long to wait in between
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

/// Result of running an operation under a [`RetryPolicy`]
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The operation succeeded on attempt `attempts`
    Ok { value: T, attempts: u32 },
    /// Every attempt failed; errors are in attempt order
    Exhausted { errors: Vec<NavigationError> },
}

impl<T> RetryOutcome<T> {
    /// The error of the final attempt, if the operation gave up
    pub fn last_error(&self) -> Option<&NavigationError> {
        match self {
            Self::Ok { .. } => None,
            Self::Exhausted { errors } => errors.last(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy from an attempt bound and a backoff function
    pub fn new<F>(max_attempts: u32, backoff: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Arc::new(backoff),
        }
    }

    /// `base * 2^attempt` plus up to `max_jitter` of random jitter
    pub fn exponential(max_attempts: u32, base: Duration, max_jitter: Duration) -> Self {
        let jitter_ms = max_jitter.as_millis() as u64;
        Self::new(max_attempts, move |attempt| {
            let factor = 2u32.saturating_pow(attempt);
            let jitter = if jitter_ms == 0 {
                0
            } else {
                rand::rng().random_range(0..=jitter_ms)
            };
            base.saturating_mul(factor) + Duration::from_millis(jitter)
        })
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::exponential(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.max_jitter_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        (self.backoff)(attempt)
    }

    /// Runs `operation` until it succeeds or the attempt bound is reached
    ///
    /// `operation` receives the zero-based attempt number. No delay follows
    /// the final attempt.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, NavigationError>>,
    {
        let mut errors = Vec::new();

        for attempt in 0..self.max_attempts {
            match operation(attempt).await {
                Ok(value) => {
                    return RetryOutcome::Ok {
                        value,
                        attempts: attempt + 1,
                    }
                }
                Err(e) if attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::info!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    errors.push(e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "Giving up");
                    errors.push(e);
                }
            }
        }

        RetryOutcome::Exhausted { errors }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_delay(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, |_| Duration::ZERO)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let outcome = no_delay(3).run(|_| async { Ok::<_, NavigationError>(7) }).await;
        assert!(matches!(outcome, RetryOutcome::Ok { value: 7, attempts: 1 }));
    }

    #[tokio::test]
    async fn test_success_after_failures() {
        let calls = AtomicU32::new(0);
        let outcome = no_delay(5)
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(NavigationError::Connection("refused".to_string()))
                    } else {
                        Ok("<html></html>")
                    }
                }
            })
            .await;

        assert!(matches!(outcome, RetryOutcome::Ok { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_keeps_every_error() {
        let outcome: RetryOutcome<()> = no_delay(3)
            .run(|attempt| async move {
                Err(NavigationError::Engine(format!("crash {}", attempt)))
            })
            .await;

        match &outcome {
            RetryOutcome::Exhausted { errors } => assert_eq!(errors.len(), 3),
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert!(matches!(
            outcome.last_error(),
            Some(NavigationError::Engine(msg)) if msg == "crash 2"
        ));
    }

    #[test]
    fn test_exponential_backoff_bounds() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_millis(50));

        for attempt in 0..4 {
            let delay = policy.delay_for(attempt);
            let floor = Duration::from_millis(100 * 2u64.pow(attempt));
            assert!(delay >= floor, "attempt {attempt}: {delay:?}");
            assert!(delay <= floor + Duration::from_millis(50));
        }
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(no_delay(0).max_attempts(), 1);
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 2,
            backoff_base_ms: 10,
            max_jitter_ms: 0,
        });
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.delay_for(1), Duration::from_millis(20));
    }
}
