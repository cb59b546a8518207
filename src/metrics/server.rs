use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::Metrics;
use crate::lifecycle::HttpListener;

#[derive(Clone)]
struct ServiceName(String);

/// Listener exposing `/metrics` (Prometheus text format) and `/health`.
pub fn metrics_listener(
    addr: SocketAddr,
    shutdown_timeout: Duration,
    metrics: Arc<Metrics>,
    service: impl Into<String>,
) -> HttpListener {
    let service = ServiceName(service.into());
    HttpListener::new("metrics", shutdown_timeout, move || {
        tracing::info!("📊 Starting metrics server on http://{}/metrics", addr);

        let metrics = metrics.clone();
        let service = service.clone();
        Ok(HttpServer::new(move || {
            App::new()
                .app_data(web::Data::from(metrics.clone()))
                .app_data(web::Data::new(service.clone()))
                .configure(routes)
        })
        .workers(1)
        .disable_signals()
        .shutdown_timeout(shutdown_timeout.as_secs())
        .bind(addr)?
        .run())
    })
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

async fn metrics_handler(metrics: web::Data<Metrics>) -> impl Responder {
    match metrics.render() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn health_handler(service: web::Data<ServiceName>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": &service.0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn test_metrics_and_health_routes() {
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.record_emitted("sku_created");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(metrics.clone()))
                .app_data(web::Data::new(ServiceName("stock".into())))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("audit_events_emitted_total{event_type=\"sku_created\"} 1"));

        let req = test::TestRequest::get().uri("/health").to_request();
        let health: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["service"], "stock");
    }
}
