use actix_web::dev::{Server, ServerHandle};
use anyhow::Context;
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tonic::transport::server::Router;

use super::Listener;

// ============================================================================
// gRPC
// ============================================================================

/// Serves a tonic router; shutdown drains in-flight calls.
pub struct GrpcListener {
    addr: SocketAddr,
    shutdown_timeout: Duration,
    router: Mutex<Option<Router>>,
    stop: Notify,
    stopped: watch::Sender<bool>,
}

impl GrpcListener {
    pub fn new(addr: SocketAddr, shutdown_timeout: Duration, router: Router) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            addr,
            shutdown_timeout,
            router: Mutex::new(Some(router)),
            stop: Notify::new(),
            stopped,
        }
    }
}

#[async_trait(?Send)]
impl Listener for GrpcListener {
    fn name(&self) -> &str {
        "grpc"
    }

    fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    async fn serve(&self) -> anyhow::Result<()> {
        let router = self
            .router
            .lock()
            .map_err(|_| anyhow::anyhow!("grpc router lock poisoned"))?
            .take()
            .context("grpc listener already served")?;

        tracing::info!(addr = %self.addr, "🚀 gRPC server listening");

        let result = router
            .serve_with_shutdown(self.addr, self.stop.notified())
            .await
            .with_context(|| format!("grpc server on {}", self.addr));

        self.stopped.send_replace(true);
        result
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        // notify_one keeps a permit if serve has not started waiting yet.
        self.stop.notify_one();

        let mut stopped = self.stopped.subscribe();
        stopped
            .wait_for(|done| *done)
            .await
            .context("grpc listener dropped before stopping")?;
        Ok(())
    }
}

// ============================================================================
// HTTP (actix-web)
// ============================================================================

type BuildServer = Box<dyn Fn() -> std::io::Result<Server>>;

/// Serves an actix-web server produced by `build`.
///
/// `build` should bind and `run()` an `HttpServer` with `disable_signals()`;
/// signals are handled once by the lifecycle.
pub struct HttpListener {
    name: String,
    shutdown_timeout: Duration,
    build: BuildServer,
    handle: RefCell<Option<ServerHandle>>,
    stop_requested: Cell<bool>,
}

impl HttpListener {
    pub fn new(
        name: impl Into<String>,
        shutdown_timeout: Duration,
        build: impl Fn() -> std::io::Result<Server> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            shutdown_timeout,
            build: Box::new(build),
            handle: RefCell::new(None),
            stop_requested: Cell::new(false),
        }
    }
}

#[async_trait(?Send)]
impl Listener for HttpListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    async fn serve(&self) -> anyhow::Result<()> {
        if self.stop_requested.get() {
            return Ok(());
        }

        let server = (self.build)().with_context(|| format!("{} listener failed to bind", self.name))?;
        *self.handle.borrow_mut() = Some(server.handle());

        server.await.with_context(|| format!("{} listener", self.name))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        self.stop_requested.set(true);

        let handle = self.handle.borrow().clone();
        if let Some(handle) = handle {
            handle.stop(true).await;
        }
        Ok(())
    }
}
