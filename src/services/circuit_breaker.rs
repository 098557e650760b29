//! Circuit breaker for calls to an unreliable remote dependency.
//!
//! Strict finite-state machine: CLOSED -> OPEN after `failure_threshold`
//! consecutive failures; OPEN rejects calls until `reset_timeout` elapses,
//! then the next call transitions to HALF_OPEN before it executes; any
//! failure in HALF_OPEN reopens immediately, while
//! `half_open_success_threshold` consecutive successes close the circuit
//! and zero all counters. Recovery never skips HALF_OPEN.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::models::BreakerConfig;

/// State of the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Every call is attempted.
    Closed,
    /// Calls are rejected without being attempted.
    Open,
    /// Trial calls probe whether the dependency recovered.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Error from a breaker-protected operation.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not attempted.
    Open { retry_after: Duration },
    /// The operation ran and failed; the original error is preserved.
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { retry_after } => {
                write!(f, "circuit open, retry in {:.1}s", retry_after.as_secs_f64())
            }
            Self::Inner(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { .. } => None,
            Self::Inner(e) => Some(e),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<Instant>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
        }
    }
}

/// A circuit breaker guarding one remote dependency.
///
/// Shared across call sites via `Arc`; all state mutation is serialized
/// behind a single mutex inside `execute`.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    /// Current state, for observability.
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Run `op` under the breaker's admission policy.
    ///
    /// The lock is held only while deciding admission and recording the
    /// outcome, never across the operation itself, so concurrent callers
    /// proceed in parallel once admitted.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        {
            let mut state = self.inner.lock().await;
            match state.state {
                CircuitState::Closed | CircuitState::HalfOpen => {}
                CircuitState::Open => {
                    let elapsed = state
                        .last_failure_at
                        .map(|at| at.elapsed())
                        .unwrap_or(Duration::MAX);
                    if elapsed > self.config.reset_timeout() {
                        // Transition happens before the trial call runs.
                        state.state = CircuitState::HalfOpen;
                        state.consecutive_successes = 0;
                        debug!("circuit half-open, allowing trial call");
                    } else {
                        let retry_after = self
                            .config
                            .reset_timeout()
                            .saturating_sub(elapsed);
                        return Err(BreakerError::Open { retry_after });
                    }
                }
            }
        }

        match op().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.record_failure(&err).await;
                Err(BreakerError::Inner(err))
            }
        }
    }

    async fn record_success(&self) {
        let mut state = self.inner.lock().await;
        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                state.consecutive_successes += 1;
                if state.consecutive_successes >= self.config.half_open_success_threshold {
                    debug!(
                        successes = state.consecutive_successes,
                        "circuit closed after successful trial calls"
                    );
                    *state = BreakerState::new();
                }
            }
            // A call admitted in HALF_OPEN may finish after a concurrent
            // trial already reopened the circuit; its success is stale.
            CircuitState::Open => {}
        }
    }

    async fn record_failure<E: std::fmt::Display>(&self, err: &E) {
        let mut state = self.inner.lock().await;
        state.last_failure_at = Some(Instant::now());
        state.consecutive_successes = 0;
        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    warn!(
                        failures = state.consecutive_failures,
                        error = %err,
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.consecutive_failures = 0;
                warn!(error = %err, "trial call failed, circuit reopened");
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Breaker whose reset timeout elapses immediately, so the call after
    /// opening is admitted as a trial.
    fn instant_reset_breaker(failure_threshold: u32, half_open_successes: u32) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold,
            reset_timeout_secs: 0,
            half_open_success_threshold: half_open_successes,
        })
    }

    async fn fail(breaker: &CircuitBreaker, calls: &Arc<AtomicU32>) {
        let calls = Arc::clone(calls);
        let _ = breaker
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(crate::domain::errors::CoordinatorError::Timeout)
            })
            .await;
    }

    async fn succeed(breaker: &CircuitBreaker, calls: &Arc<AtomicU32>) {
        let calls = Arc::clone(calls);
        let result = breaker
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, crate::domain::errors::CoordinatorError>(())
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 3,
            reset_timeout_secs: 30,
            half_open_success_threshold: 2,
        });
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            fail(&breaker, &calls).await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        // Fourth call is rejected without invoking the operation.
        let calls_clone = Arc::clone(&calls);
        let result = breaker
            .execute(|| async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok::<_, crate::domain::errors::CoordinatorError>(())
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_closed_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 3,
            reset_timeout_secs: 30,
            half_open_success_threshold: 2,
        });
        let calls = Arc::new(AtomicU32::new(0));

        fail(&breaker, &calls).await;
        fail(&breaker, &calls).await;
        succeed(&breaker, &calls).await;
        fail(&breaker, &calls).await;
        fail(&breaker, &calls).await;
        // Only two consecutive failures since the success: still closed.
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_after_reset_timeout_then_closes() {
        let breaker = instant_reset_breaker(2, 2);
        let calls = Arc::new(AtomicU32::new(0));

        fail(&breaker, &calls).await;
        fail(&breaker, &calls).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        // reset_timeout is zero, so the next call is admitted as a trial.
        tokio::time::sleep(Duration::from_millis(5)).await;
        succeed(&breaker, &calls).await;
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        succeed(&breaker, &calls).await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_immediately() {
        let breaker = instant_reset_breaker(2, 2);
        let calls = Arc::new(AtomicU32::new(0));

        fail(&breaker, &calls).await;
        fail(&breaker, &calls).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(5)).await;
        fail(&breaker, &calls).await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_rejects_before_reset_timeout() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            reset_timeout_secs: 30,
            half_open_success_threshold: 1,
        });
        let calls = Arc::new(AtomicU32::new(0));

        fail(&breaker, &calls).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        for _ in 0..5 {
            let calls_clone = Arc::clone(&calls);
            let result = breaker
                .execute(|| async move {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, crate::domain::errors::CoordinatorError>(())
                })
                .await;
            assert!(matches!(result, Err(BreakerError::Open { .. })));
        }
        // Only the original failing call ever ran.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_breaker_preserves_original_error() {
        let breaker = CircuitBreaker::new(BreakerConfig::default());
        let result: Result<(), _> = breaker
            .execute(|| async {
                Err(crate::domain::errors::CoordinatorError::Remote {
                    status: 503,
                    message: "unavailable".into(),
                })
            })
            .await;
        match result {
            Err(BreakerError::Inner(crate::domain::errors::CoordinatorError::Remote {
                status,
                ..
            })) => assert_eq!(status, 503),
            other => panic!("expected inner remote error, got {other:?}"),
        }
    }
}
