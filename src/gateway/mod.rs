pub mod cart;
pub mod stocks;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::middleware::{from_fn, Next};
use actix_web::{error, web, App, HttpResponse, HttpServer, ResponseError};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::{ErrorKind, ServiceError};
use crate::lifecycle::HttpListener;
use crate::metrics::Metrics;

// ============================================================================
// HTTP Gateway - JSON over POST for both services
// ============================================================================
//
// Every route calls straight into an engine; errors map by kind:
//   NotFound -> 404, InvalidArgument -> 400, Internal -> 500
// Error bodies are {"error": "..."}.
//
// ============================================================================

const TRANSPORT: &str = "http";

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub addr: SocketAddr,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

#[derive(Serialize)]
pub(crate) struct Message {
    message: &'static str,
}

pub(crate) fn ok_message(message: &'static str) -> HttpResponse {
    HttpResponse::Ok().json(Message { message })
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.kind() == ErrorKind::Internal {
            tracing::error!(error = %self, "HTTP request failed");
        }
        HttpResponse::build(self.status_code()).json(error_body(self.to_string()))
    }
}

/// Malformed bodies get the same JSON error shape as engine errors.
pub(crate) fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let body = error_body(err.to_string());
        error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    })
}

/// Records latency and failures per matched route.
pub(crate) async fn track_requests(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let started = Instant::now();
    let path = req.match_pattern().unwrap_or_else(|| "unmatched".to_string());
    let metrics = req.app_data::<web::Data<Metrics>>().cloned();

    let res = next.call(req).await?;

    if let Some(metrics) = metrics {
        let failed = res.status().is_client_error() || res.status().is_server_error();
        metrics.record_request(TRANSPORT, &path, started.elapsed(), failed);
    }
    Ok(res)
}

/// Listener serving `routes` with `engine` and `metrics` as app data.
pub fn gateway_listener<E>(
    settings: GatewaySettings,
    engine: Arc<E>,
    metrics: Arc<Metrics>,
    routes: fn(&mut web::ServiceConfig),
) -> HttpListener
where
    E: Send + Sync + 'static,
{
    HttpListener::new("gateway", settings.shutdown_timeout, move || {
        tracing::info!(addr = %settings.addr, "🌐 HTTP gateway listening");

        let engine = engine.clone();
        let metrics = metrics.clone();
        Ok(HttpServer::new(move || {
            App::new()
                .app_data(web::Data::from(engine.clone()))
                .app_data(web::Data::from(metrics.clone()))
                .app_data(json_config())
                .wrap(from_fn(track_requests))
                .configure(routes)
        })
        .disable_signals()
        .client_request_timeout(settings.request_timeout)
        .shutdown_timeout(settings.shutdown_timeout.as_secs())
        .bind(settings.addr)?
        .run())
    })
}
