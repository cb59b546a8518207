use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Guards the cart service's calls into the stocks service. After
// `failure_threshold` consecutive failures the circuit opens and calls fail
// fast for `open_for`; the next call after that is a trial. `close_after`
// trial successes close it again, any trial failure reopens it.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub open_for: Duration,
    pub close_after: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_for: Duration::from_secs(10),
            close_after: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error("circuit open")]
    Open,
    #[error(transparent)]
    Inner(E),
}

struct Tally {
    state: CircuitState,
    failures: u32,
    trial_successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    config: BreakerConfig,
    tally: Arc<Mutex<Tally>>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: BreakerConfig) -> Self {
        Self {
            name,
            config,
            tally: Arc::new(Mutex::new(Tally {
                state: CircuitState::Closed,
                failures: 0,
                trial_successes: 0,
                opened_at: None,
            })),
        }
    }

    /// Run `operation` unless the circuit is open. Only errors for which
    /// `counts` returns true are charged against the circuit.
    pub async fn call<F, T, E>(
        &self,
        counts: impl Fn(&E) -> bool,
        operation: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.admit().await?;

        match operation.await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                if counts(&err) {
                    self.on_failure().await;
                } else {
                    self.on_success().await;
                }
                Err(BreakerError::Inner(err))
            }
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.tally.lock().await.state
    }

    async fn admit<E>(&self) -> Result<(), BreakerError<E>> {
        let mut tally = self.tally.lock().await;
        if tally.state != CircuitState::Open {
            return Ok(());
        }

        let elapsed = tally.opened_at.map(|at| at.elapsed()).unwrap_or_default();
        if elapsed < self.config.open_for {
            return Err(BreakerError::Open);
        }

        tracing::info!(circuit = self.name, "Circuit half-open, allowing trial call");
        tally.state = CircuitState::HalfOpen;
        tally.trial_successes = 0;
        Ok(())
    }

    async fn on_success(&self) {
        let mut tally = self.tally.lock().await;
        match tally.state {
            CircuitState::HalfOpen => {
                tally.trial_successes += 1;
                if tally.trial_successes >= self.config.close_after {
                    tracing::info!(circuit = self.name, "Circuit closed");
                    tally.state = CircuitState::Closed;
                    tally.failures = 0;
                    tally.opened_at = None;
                }
            }
            CircuitState::Closed => tally.failures = 0,
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut tally = self.tally.lock().await;
        tally.failures += 1;

        let trip = match tally.state {
            CircuitState::Closed => tally.failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };

        if trip {
            tracing::warn!(circuit = self.name, failures = tally.failures, "Circuit opened");
            tally.state = CircuitState::Open;
            tally.opened_at = Some(Instant::now());
            tally.trial_successes = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(open_for: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig { failure_threshold: 2, open_for, close_after: 1 },
        )
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_fails_fast() {
        let cb = breaker(Duration::from_secs(60));

        for _ in 0..2 {
            let result = cb.call(|_| true, async { Err::<(), _>("boom") }).await;
            assert!(matches!(result, Err(BreakerError::Inner("boom"))));
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        let result = cb.call(|_: &&str| true, async { Ok::<_, &str>(1) }).await;
        assert!(matches!(result, Err(BreakerError::Open)));
    }

    #[tokio::test]
    async fn test_uncounted_errors_do_not_trip() {
        let cb = breaker(Duration::from_secs(60));

        for _ in 0..5 {
            let _ = cb.call(|_| false, async { Err::<(), _>("not found") }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_trial_success_closes_circuit() {
        let cb = breaker(Duration::from_millis(30));

        for _ in 0..2 {
            let _ = cb.call(|_| true, async { Err::<(), _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = cb.call(|_: &&str| true, async { Ok::<_, &str>(7) }).await;
        assert!(matches!(result, Ok(7)));
        assert_eq!(cb.state().await, CircuitState::Closed);
    }
}
