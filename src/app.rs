use anyhow::Context;
use sqlx::PgPool;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Server;

use crate::cart::{CartEngine, RemoteStockClient, StockLookup};
use crate::config::{CartConfig, ConsumerConfig, KafkaArgs, PostgresArgs, ServerArgs, StocksConfig};
use crate::gateway::{self, GatewaySettings};
use crate::inventory::InventoryEngine;
use crate::lifecycle::{GrpcListener, LifecycleReport, ServerLifecycle, ShutdownTrigger};
use crate::messaging::{AuditConsumer, EventProducer, KafkaBus, LoggingHandler, ProducerSettings};
use crate::metrics::{metrics_listener, Metrics};
use crate::rpc::proto::cart_service_server::CartServiceServer;
use crate::rpc::proto::stocks_service_server::StocksServiceServer;
use crate::rpc::{CartRpc, StocksRpc};
use crate::storage::postgres::{self, PgStore};

// ============================================================================
// Process Wiring
// ============================================================================
//
// Each service process owns:
//   - one Postgres pool and one audit producer
//   - gRPC (with grpc.health.v1), HTTP gateway and metrics listeners
//
// Teardown order after the lifecycle stops: flush the producer, then close
// the pool.
//
// ============================================================================

pub async fn run_stocks(config: StocksConfig) -> anyhow::Result<()> {
    tracing::info!(service = %config.service_name, "🚀 Starting stocks service");

    let metrics = Arc::new(Metrics::new().context("failed to create metrics registry")?);
    let pool = open_database(&config.postgres).await?;
    let store = Arc::new(PgStore::new(pool.clone()));
    let producer = Arc::new(audit_producer(&config.kafka, &config.service_name, metrics.clone())?);

    let engine = Arc::new(InventoryEngine::new(store.clone(), store, producer.clone()));
    let rpc = Arc::new(StocksRpc::new(engine.clone(), metrics.clone()));

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter.set_serving::<StocksServiceServer<StocksRpc>>().await;

    let router = Server::builder()
        .timeout(request_timeout(&config.server))
        .add_service(health_service)
        .add_service(StocksServiceServer::from_arc(rpc));

    let report = lifecycle(&config.server)
        .with_listener(GrpcListener::new(config.server.grpc_addr(), grpc_shutdown(&config.server), router))
        .with_listener(gateway::gateway_listener(
            gateway_settings(&config.server),
            engine,
            metrics.clone(),
            gateway::stocks::routes,
        ))
        .with_listener(metrics_listener(
            config.server.metrics_addr(),
            Duration::from_secs(config.server.metrics_shutdown_secs),
            metrics,
            config.service_name.clone(),
        ))
        .run()
        .await;

    producer.close().await;
    pool.close().await;
    finish(report)
}

pub async fn run_cart(config: CartConfig) -> anyhow::Result<()> {
    tracing::info!(service = %config.service_name, "🚀 Starting cart service");

    let metrics = Arc::new(Metrics::new().context("failed to create metrics registry")?);
    let pool = open_database(&config.postgres).await?;
    let store = Arc::new(PgStore::new(pool.clone()));
    let producer = Arc::new(audit_producer(&config.kafka, &config.service_name, metrics.clone())?);

    let stock: Arc<dyn StockLookup> = match &config.stock_service_url {
        Some(url) => Arc::new(
            RemoteStockClient::connect_lazy(url, Duration::from_millis(config.stock_call_timeout_ms))
                .with_context(|| format!("invalid stock service url {url}"))?,
        ),
        None => {
            tracing::info!("Stock lookups read the shared database in-process");
            Arc::new(InventoryEngine::new(store.clone(), store.clone(), producer.clone()))
        }
    };

    let engine = Arc::new(CartEngine::new(stock, store, producer.clone()));
    let rpc = Arc::new(CartRpc::new(engine.clone(), metrics.clone()));

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter.set_serving::<CartServiceServer<CartRpc>>().await;

    let router = Server::builder()
        .timeout(request_timeout(&config.server))
        .add_service(health_service)
        .add_service(CartServiceServer::from_arc(rpc));

    let report = lifecycle(&config.server)
        .with_listener(GrpcListener::new(config.server.grpc_addr(), grpc_shutdown(&config.server), router))
        .with_listener(gateway::gateway_listener(
            gateway_settings(&config.server),
            engine,
            metrics.clone(),
            gateway::cart::routes,
        ))
        .with_listener(metrics_listener(
            config.server.metrics_addr(),
            Duration::from_secs(config.server.metrics_shutdown_secs),
            metrics,
            config.service_name.clone(),
        ))
        .run()
        .await;

    producer.close().await;
    pool.close().await;
    finish(report)
}

pub async fn run_consumer(config: ConsumerConfig) -> anyhow::Result<()> {
    tracing::info!(topic = %config.topic, group = %config.consumer_group, "🚀 Starting audit consumer");

    let metrics = Arc::new(Metrics::new().context("failed to create metrics registry")?);
    let consumer = AuditConsumer::new(&config, LoggingHandler, metrics.clone())?;
    let shutdown = Duration::from_secs(config.shutdown_secs);

    let report = ServerLifecycle::new(Duration::from_secs(config.shutdown_grace_secs))
        .with_listener(consumer)
        .with_listener(metrics_listener(
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.metrics_port)),
            shutdown,
            metrics,
            "audit-consumer",
        ))
        .run()
        .await;

    finish(report)
}

// ============================================================================
// Helpers
// ============================================================================

async fn open_database(args: &PostgresArgs) -> anyhow::Result<PgPool> {
    let pool = postgres::connect(args).await?;
    postgres::ensure_schema(&pool).await?;
    Ok(pool)
}

fn audit_producer(
    args: &KafkaArgs,
    service: &str,
    metrics: Arc<Metrics>,
) -> anyhow::Result<EventProducer<KafkaBus>> {
    let bus = KafkaBus::new(args).context("failed to create Kafka producer")?;
    let settings = ProducerSettings {
        service: service.to_string(),
        topic: args.topic.clone(),
        max_in_flight: args.max_in_flight as usize,
        flush_timeout: Duration::from_millis(args.flush_timeout_ms),
    };
    Ok(EventProducer::new(bus, settings, metrics))
}

fn lifecycle(server: &ServerArgs) -> ServerLifecycle {
    ServerLifecycle::new(server.shutdown_grace())
}

fn request_timeout(server: &ServerArgs) -> Duration {
    Duration::from_secs(server.request_timeout_secs)
}

fn grpc_shutdown(server: &ServerArgs) -> Duration {
    Duration::from_secs(server.grpc_shutdown_secs)
}

fn gateway_settings(server: &ServerArgs) -> GatewaySettings {
    GatewaySettings {
        addr: server.http_addr(),
        request_timeout: request_timeout(server),
        shutdown_timeout: Duration::from_secs(server.http_shutdown_secs),
    }
}

/// A failed listener makes the process exit non-zero.
fn finish(report: LifecycleReport) -> anyhow::Result<()> {
    if !report.is_clean() {
        tracing::warn!(
            listener_errors = ?report.listener_errors,
            shutdown_failures = ?report.shutdown_failures,
            aborted = report.aborted,
            "Shutdown was not clean"
        );
    }

    match report.trigger {
        ShutdownTrigger::Signal => {
            tracing::info!("👋 Shutdown complete");
            Ok(())
        }
        ShutdownTrigger::ListenerFailed { listener, error } => {
            anyhow::bail!("{listener} listener failed: {error}")
        }
    }
}
