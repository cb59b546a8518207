use async_trait::async_trait;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

use super::StockLookup;
use crate::domain::{OwnerId, ServiceError, Sku, SkuId, StockItem};
use crate::rpc::proto::stocks_service_client::StocksServiceClient;
use crate::rpc::proto::{GetStockItemRequest, StockItemResponse};
use crate::utils::{retry_on_transient, Backoff, BreakerConfig, BreakerError, CircuitBreaker, IsTransient};

// ============================================================================
// Remote Stock Lookup - the cart service asking the stocks service
// ============================================================================
//
// Each attempt carries its own deadline. Unavailable, DeadlineExceeded and
// ResourceExhausted are retried with backoff; the whole retried call runs
// inside a circuit breaker so a dead stocks service fails fast.
//
// ============================================================================

impl IsTransient for Status {
    fn is_transient(&self) -> bool {
        is_transient_code(self.code())
    }
}

fn is_transient_code(code: Code) -> bool {
    matches!(code, Code::Unavailable | Code::DeadlineExceeded | Code::ResourceExhausted)
}

pub struct RemoteStockClient {
    client: StocksServiceClient,
    call_timeout: Duration,
    backoff: Backoff,
    breaker: CircuitBreaker,
}

impl RemoteStockClient {
    /// Connects lazily; the first lookup establishes the channel.
    pub fn connect_lazy(url: &str, call_timeout: Duration) -> anyhow::Result<Self> {
        let channel: Channel = Endpoint::from_shared(url.to_string())?
            .connect_timeout(Duration::from_secs(10))
            .timeout(call_timeout)
            .connect_lazy();

        tracing::info!(url, "Stock lookups go to the stocks service");

        Ok(Self {
            client: StocksServiceClient::new(channel),
            call_timeout,
            backoff: Backoff::request(),
            breaker: CircuitBreaker::new("stocks-service", BreakerConfig::default()),
        })
    }

    async fn fetch(&self, sku: SkuId) -> Result<StockItemResponse, Status> {
        retry_on_transient(&self.backoff, "get_stock_item_by_sku", |_| {
            let mut client = self.client.clone();
            let mut request = tonic::Request::new(GetStockItemRequest { sku_id: sku.0 });
            request.set_timeout(self.call_timeout);

            async move { client.get_stock_item_by_sku(request).await.map(tonic::Response::into_inner) }
        })
        .await
    }
}

fn into_stock_item(response: StockItemResponse) -> StockItem {
    StockItem {
        owner: OwnerId(response.user_id),
        sku: Sku {
            id: SkuId(response.sku_id),
            name: response.name,
            kind: response.r#type,
        },
        count: response.count,
        price: response.price,
        location: response.location,
    }
}

fn map_failure(err: BreakerError<Status>) -> ServiceError {
    match err {
        BreakerError::Open => ServiceError::Upstream("stocks service circuit open".to_string()),
        BreakerError::Inner(status) if status.code() == Code::NotFound => ServiceError::StockItemNotFound,
        BreakerError::Inner(status) => {
            ServiceError::Upstream(format!("{:?}: {}", status.code(), status.message()))
        }
    }
}

#[async_trait]
impl StockLookup for RemoteStockClient {
    async fn stock_by_sku(&self, sku: SkuId) -> Result<StockItem, ServiceError> {
        // Only infrastructure failures count against the circuit.
        let counts = |status: &Status| status.is_transient() || status.code() == Code::Internal;

        self.breaker
            .call(counts, self.fetch(sku))
            .await
            .map(into_stock_item)
            .map_err(map_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_codes() {
        assert!(Status::unavailable("down").is_transient());
        assert!(Status::deadline_exceeded("slow").is_transient());
        assert!(Status::resource_exhausted("busy").is_transient());
        assert!(!Status::not_found("gone").is_transient());
        assert!(!Status::internal("bug").is_transient());
    }

    #[test]
    fn test_failure_mapping() {
        assert!(matches!(
            map_failure(BreakerError::Inner(Status::not_found("stock item not found"))),
            ServiceError::StockItemNotFound
        ));
        assert!(matches!(
            map_failure(BreakerError::Inner(Status::unavailable("down"))),
            ServiceError::Upstream(_)
        ));
        assert!(matches!(map_failure(BreakerError::Open), ServiceError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_surfaces_as_upstream() {
        let client = RemoteStockClient {
            backoff: Backoff {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                multiplier: 1.0,
            },
            ..RemoteStockClient::connect_lazy("http://127.0.0.1:1", Duration::from_millis(200)).unwrap()
        };

        let err = client.stock_by_sku(SkuId(1001)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
    }

    #[actix_web::test]
    async fn test_lookup_against_served_stocks_service() {
        use crate::domain::NewStock;
        use crate::inventory::tests::RecordingEmitter;
        use crate::inventory::InventoryEngine;
        use crate::lifecycle::{GrpcListener, ServerLifecycle};
        use crate::metrics::Metrics;
        use crate::rpc::proto::stocks_service_server::StocksServiceServer;
        use crate::rpc::StocksRpc;
        use crate::storage::memory::InMemoryStore;
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::new());
        store.insert_sku(1001, "t-shirt");
        let engine = Arc::new(InventoryEngine::new(
            store.clone(),
            store,
            Arc::new(RecordingEmitter::default()),
        ));
        engine
            .add_stock(NewStock {
                owner: OwnerId(7),
                sku: SkuId(1001),
                count: 10,
                price: 12,
                location: "A".into(),
            })
            .await
            .unwrap();

        let rpc = Arc::new(StocksRpc::new(engine, Arc::new(Metrics::new().unwrap())));
        let router = tonic::transport::Server::builder().add_service(StocksServiceServer::from_arc(rpc));

        let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let lifecycle = ServerLifecycle::new(Duration::from_secs(5)).with_listener(GrpcListener::new(
            addr,
            Duration::from_secs(5),
            router,
        ));

        let mut found = None;
        let mut missing = None;
        let report = lifecycle
            .run_until(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let client = RemoteStockClient::connect_lazy(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
                found = Some(client.stock_by_sku(SkuId(1001)).await);
                missing = Some(client.stock_by_sku(SkuId(4242)).await);
            })
            .await;

        let item = found.unwrap().unwrap();
        assert_eq!(item.owner, OwnerId(7));
        assert_eq!(item.sku.name, "t-shirt");
        assert_eq!((item.count, item.price, item.location.as_str()), (10, 12, "A"));
        assert!(matches!(missing.unwrap(), Err(ServiceError::StockItemNotFound)));
        assert!(report.is_clean(), "{report:?}");
    }

    #[test]
    fn test_response_maps_to_stock_item() {
        let item = into_stock_item(StockItemResponse {
            sku_id: 1001,
            name: "t-shirt".into(),
            r#type: "apparel".into(),
            count: 4,
            price: 12,
            location: "A".into(),
            user_id: 9,
        });
        assert_eq!(item.owner, OwnerId(9));
        assert_eq!(item.sku.kind, "apparel");
        assert_eq!(item.count, 4);
    }
}
