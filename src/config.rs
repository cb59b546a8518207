use clap::{Args, Parser};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

// ============================================================================
// Configuration - every flag falls back to an environment variable
// ============================================================================

/// Ports and deadlines shared by both services.
#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    #[arg(long, env = "GRPC_PORT", default_value_t = 50051)]
    pub grpc_port: u16,

    #[arg(long, env = "METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Deadline for reading an HTTP request's headers
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "GRPC_SHUTDOWN_SECS", default_value_t = 10)]
    pub grpc_shutdown_secs: u64,

    #[arg(long, env = "HTTP_SHUTDOWN_SECS", default_value_t = 10)]
    pub http_shutdown_secs: u64,

    #[arg(long, env = "METRICS_SHUTDOWN_SECS", default_value_t = 10)]
    pub metrics_shutdown_secs: u64,

    /// Upper bound on the whole shutdown sequence
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 15)]
    pub shutdown_grace_secs: u64,
}

impl ServerArgs {
    pub fn http_addr(&self) -> SocketAddr {
        any_addr(self.http_port)
    }

    pub fn grpc_addr(&self) -> SocketAddr {
        any_addr(self.grpc_port)
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        any_addr(self.metrics_port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, Args)]
pub struct PostgresArgs {
    #[arg(long = "db-host", env = "DB_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(long = "db-port", env = "DB_PORT", default_value_t = 5432)]
    pub port: u16,

    #[arg(long = "db-user", env = "DB_USER", default_value = "postgres")]
    pub user: String,

    #[arg(long = "db-password", env = "DB_PASSWORD", default_value = "postgres", hide_env_values = true)]
    pub password: String,

    #[arg(long = "db-name", env = "DB_NAME", default_value = "postgres")]
    pub database: String,

    #[arg(long = "db-max-connections", env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    #[arg(long = "db-statement-timeout-ms", env = "DB_STATEMENT_TIMEOUT_MS", default_value_t = 5000)]
    pub statement_timeout_ms: u64,

    #[arg(long = "db-connect-timeout-secs", env = "DB_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Args)]
pub struct KafkaArgs {
    #[arg(long = "kafka-brokers", env = "KAFKA_BROKERS", default_value = "kafka1:29091,kafka2:29092")]
    pub brokers: String,

    #[arg(long = "audit-topic", env = "AUDIT_TOPIC", default_value = "metrics")]
    pub topic: String,

    /// Undelivered audit events allowed before new ones are dropped
    #[arg(
        long = "audit-max-in-flight",
        env = "AUDIT_MAX_IN_FLIGHT",
        default_value_t = 1024,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_in_flight: u32,

    #[arg(long = "audit-flush-timeout-ms", env = "AUDIT_FLUSH_TIMEOUT_MS", default_value_t = 5000)]
    pub flush_timeout_ms: u64,

    #[arg(long = "kafka-message-timeout-ms", env = "KAFKA_MESSAGE_TIMEOUT_MS", default_value_t = 5000)]
    pub message_timeout_ms: u64,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "stocks-service", about = "Stock inventory service (gRPC + HTTP)")]
pub struct StocksConfig {
    #[arg(long, env = "SERVICE_NAME", default_value = "stock")]
    pub service_name: String,

    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub postgres: PostgresArgs,

    #[command(flatten)]
    pub kafka: KafkaArgs,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "cart-service", about = "Shopping cart service (gRPC + HTTP)")]
pub struct CartConfig {
    #[arg(long, env = "SERVICE_NAME", default_value = "cart")]
    pub service_name: String,

    /// gRPC endpoint of the stocks service; stock is read in-process when unset
    #[arg(long, env = "STOCK_SERVICE_URL")]
    pub stock_service_url: Option<String>,

    /// Per-call deadline for remote stock lookups
    #[arg(long, env = "STOCK_CALL_TIMEOUT_MS", default_value_t = 2000)]
    pub stock_call_timeout_ms: u64,

    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub postgres: PostgresArgs,

    #[command(flatten)]
    pub kafka: KafkaArgs,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "audit-consumer", about = "Reads and logs audit events")]
pub struct ConsumerConfig {
    #[arg(long, env = "BROKERS", default_value = "kafka1:29091,kafka2:29092")]
    pub brokers: String,

    #[arg(long, env = "TOPIC", default_value = "metrics")]
    pub topic: String,

    #[arg(long, env = "CONSUMER_GROUP", default_value = "audit-consumer")]
    pub consumer_group: String,

    #[arg(long, env = "METRICS_PORT", default_value_t = 9091)]
    pub metrics_port: u16,

    #[arg(long, env = "SHUTDOWN_SECS", default_value_t = 10)]
    pub shutdown_secs: u64,

    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 15)]
    pub shutdown_grace_secs: u64,
}

fn any_addr(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}
