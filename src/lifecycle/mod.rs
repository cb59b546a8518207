mod listeners;

use async_trait::async_trait;
use futures_util::future::join_all;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::timeout;

pub use listeners::{GrpcListener, HttpListener};

// ============================================================================
// Server Lifecycle - N listeners, one coordinated shutdown
// ============================================================================
//
// Idle -> Starting -> Running -> ShuttingDown -> Stopped
//
// Every listener is served on its own local task. The first listener error
// or the external signal (whichever comes first) ends `Running`. Shutdown is
// then requested from every listener concurrently, each bounded by its own
// deadline, and the serving tasks are joined under the overall grace
// period. Tasks still alive after that are aborted, so `Stopped` is always
// reached.
//
// Listeners run on the current thread (`spawn_local`) because the actix
// server and its handle are not `Send`; run this inside an actix/tokio
// `LocalSet` runtime such as `#[actix_web::main]`.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// One independently serving network endpoint.
#[async_trait(?Send)]
pub trait Listener {
    fn name(&self) -> &str;

    /// Deadline for `shutdown` before it is abandoned.
    fn shutdown_timeout(&self) -> Duration;

    /// Serve until stopped. Returning `Err` triggers shutdown of the rest.
    async fn serve(&self) -> anyhow::Result<()>;

    /// Stop accepting connections and drain in-flight requests.
    async fn shutdown(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Signal,
    ListenerFailed { listener: String, error: String },
}

#[derive(Debug)]
pub struct LifecycleReport {
    pub trigger: ShutdownTrigger,
    /// Errors reported by listeners after the trigger.
    pub listener_errors: Vec<(String, String)>,
    /// Listeners whose shutdown failed or exceeded its deadline.
    pub shutdown_failures: Vec<(String, String)>,
    /// Serving tasks still running at the end of the grace period.
    pub aborted: usize,
}

impl LifecycleReport {
    pub fn is_clean(&self) -> bool {
        self.trigger == ShutdownTrigger::Signal
            && self.listener_errors.is_empty()
            && self.shutdown_failures.is_empty()
            && self.aborted == 0
    }
}

pub struct ServerLifecycle {
    listeners: Vec<Rc<dyn Listener>>,
    grace: Duration,
    state: watch::Sender<LifecycleState>,
}

impl ServerLifecycle {
    pub fn new(grace: Duration) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self { listeners: Vec::new(), grace, state }
    }

    pub fn with_listener(mut self, listener: impl Listener + 'static) -> Self {
        self.listeners.push(Rc::new(listener));
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Run until SIGINT/SIGTERM or the first listener failure.
    pub async fn run(self) -> LifecycleReport {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until<S>(self, signal: S) -> LifecycleReport
    where
        S: Future<Output = ()>,
    {
        self.transition(LifecycleState::Starting);

        let (err_tx, mut err_rx) = mpsc::channel::<(String, anyhow::Error)>(self.listeners.len().max(1));
        let mut tasks = JoinSet::new();

        for listener in &self.listeners {
            let listener = Rc::clone(listener);
            let err_tx = err_tx.clone();

            tasks.spawn_local(async move {
                let name = listener.name().to_string();
                tracing::info!(listener = %name, "Listener starting");

                match listener.serve().await {
                    Ok(()) => tracing::info!(listener = %name, "Listener stopped"),
                    Err(e) => {
                        tracing::error!(listener = %name, error = %e, "Listener failed");
                        // Capacity equals the listener count, one send per task.
                        let _ = err_tx.try_send((name, e));
                    }
                }
            });
        }
        drop(err_tx);

        self.transition(LifecycleState::Running);

        let trigger = tokio::select! {
            _ = signal => {
                tracing::info!("Termination signal received");
                ShutdownTrigger::Signal
            }
            Some((listener, error)) = err_rx.recv() => {
                ShutdownTrigger::ListenerFailed { listener, error: format!("{error:#}") }
            }
        };

        self.transition(LifecycleState::ShuttingDown);

        let shutdown_failures = self.shutdown_all().await;

        let mut aborted = 0;
        if timeout(self.grace, async { while tasks.join_next().await.is_some() {} })
            .await
            .is_err()
        {
            aborted = tasks.len();
            tracing::warn!(aborted, grace_secs = self.grace.as_secs(), "Grace period elapsed, aborting listeners");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        let mut listener_errors = Vec::new();
        while let Ok((name, e)) = err_rx.try_recv() {
            listener_errors.push((name, format!("{e:#}")));
        }

        self.transition(LifecycleState::Stopped);

        LifecycleReport { trigger, listener_errors, shutdown_failures, aborted }
    }

    async fn shutdown_all(&self) -> Vec<(String, String)> {
        let attempts = self.listeners.iter().map(|listener| async move {
            let name = listener.name().to_string();
            let deadline = listener.shutdown_timeout();

            match timeout(deadline, listener.shutdown()).await {
                Ok(Ok(())) => {
                    tracing::info!(listener = %name, "Listener shut down");
                    None
                }
                Ok(Err(e)) => {
                    tracing::error!(listener = %name, error = %e, "Listener shutdown failed");
                    Some((name, format!("{e:#}")))
                }
                Err(_) => {
                    tracing::error!(listener = %name, timeout_secs = deadline.as_secs(), "Listener shutdown timed out");
                    Some((name, format!("shutdown timed out after {deadline:?}")))
                }
            }
        });

        join_all(attempts).await.into_iter().flatten().collect()
    }

    fn transition(&self, next: LifecycleState) {
        tracing::debug!(state = ?next, "Lifecycle transition");
        self.state.send_replace(next);
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::sync::Notify;

    /// Serves until shut down; optionally fails on start or hangs on stop.
    struct FakeListener {
        name: &'static str,
        fail_after: Option<Duration>,
        hang_on_shutdown: bool,
        stop: Rc<Notify>,
        shutdown_calls: Rc<Cell<u32>>,
    }

    impl FakeListener {
        fn healthy(name: &'static str) -> (Self, Rc<Cell<u32>>) {
            let calls = Rc::new(Cell::new(0));
            let listener = Self {
                name,
                fail_after: None,
                hang_on_shutdown: false,
                stop: Rc::new(Notify::new()),
                shutdown_calls: calls.clone(),
            };
            (listener, calls)
        }
    }

    #[async_trait(?Send)]
    impl Listener for FakeListener {
        fn name(&self) -> &str {
            self.name
        }

        fn shutdown_timeout(&self) -> Duration {
            Duration::from_millis(50)
        }

        async fn serve(&self) -> anyhow::Result<()> {
            match self.fail_after {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    anyhow::bail!("address already in use")
                }
                None => {
                    self.stop.notified().await;
                    Ok(())
                }
            }
        }

        async fn shutdown(&self) -> anyhow::Result<()> {
            self.shutdown_calls.set(self.shutdown_calls.get() + 1);
            if self.hang_on_shutdown {
                std::future::pending::<()>().await;
            }
            self.stop.notify_one();
            Ok(())
        }
    }

    #[actix_web::test]
    async fn test_signal_shuts_down_every_listener() {
        let (grpc, grpc_calls) = FakeListener::healthy("grpc");
        let (http, http_calls) = FakeListener::healthy("http");

        let lifecycle = ServerLifecycle::new(Duration::from_secs(1))
            .with_listener(grpc)
            .with_listener(http);
        let states = lifecycle.subscribe();

        let report = lifecycle
            .run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await;

        assert!(report.is_clean());
        assert_eq!(grpc_calls.get(), 1);
        assert_eq!(http_calls.get(), 1);
        assert_eq!(*states.borrow(), LifecycleState::Stopped);
    }

    #[actix_web::test]
    async fn test_listener_failure_triggers_shutdown_of_others() {
        let (healthy, healthy_calls) = FakeListener::healthy("gateway");
        let (mut failing, _) = FakeListener::healthy("grpc");
        failing.fail_after = Some(Duration::from_millis(10));

        let report = ServerLifecycle::new(Duration::from_secs(1))
            .with_listener(healthy)
            .with_listener(failing)
            .run_until(std::future::pending())
            .await;

        assert!(matches!(
            report.trigger,
            ShutdownTrigger::ListenerFailed { ref listener, .. } if listener == "grpc"
        ));
        assert_eq!(healthy_calls.get(), 1);
        assert_eq!(report.aborted, 0);
    }

    #[actix_web::test]
    async fn test_hanging_shutdown_is_bounded() {
        let (mut stuck, _) = FakeListener::healthy("metrics");
        stuck.hang_on_shutdown = true;
        let (other, other_calls) = FakeListener::healthy("http");

        let started = std::time::Instant::now();
        let report = ServerLifecycle::new(Duration::from_millis(100))
            .with_listener(stuck)
            .with_listener(other)
            .run_until(std::future::ready(()))
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(other_calls.get(), 1);
        assert_eq!(report.shutdown_failures.len(), 1);
        assert_eq!(report.shutdown_failures[0].0, "metrics");
        assert_eq!(report.aborted, 1);
        assert!(!report.is_clean());
    }

    #[actix_web::test]
    async fn test_no_listeners_stops_immediately() {
        let lifecycle = ServerLifecycle::new(Duration::from_millis(10));
        assert_eq!(lifecycle.state(), LifecycleState::Idle);

        let report = lifecycle.run_until(std::future::ready(())).await;
        assert!(report.is_clean());
    }
}
