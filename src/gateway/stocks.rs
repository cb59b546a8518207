use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use super::ok_message;
use crate::domain::{NewStock, OwnerId, ServiceError, Sku, SkuId, StockFilter, StockItem};
use crate::inventory::InventoryEngine;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/stocks")
            .route("/item/add", web::post().to(add_item))
            .route("/item/delete", web::post().to(delete_item))
            .route("/item/get", web::post().to(get_item))
            .route("/list/location", web::post().to(list_by_location)),
    );
}

// ============================================================================
// Request / Response Bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AddStockItemBody {
    #[serde(rename = "userID", alias = "user_id")]
    pub user_id: i64,
    #[serde(rename = "skuID", alias = "sku_id")]
    pub sku_id: u32,
    pub count: u32,
    #[serde(default)]
    pub price: u32,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteStockItemBody {
    #[serde(rename = "userID", alias = "user_id")]
    pub user_id: i64,
    #[serde(rename = "skuID", alias = "sku_id")]
    pub sku_id: u32,
}

#[derive(Debug, Deserialize)]
pub struct GetStockItemBody {
    #[serde(rename = "skuID", alias = "sku_id")]
    pub sku_id: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListStockItemsBody {
    #[serde(rename = "userID", alias = "user_id")]
    pub user_id: i64,
    pub location: String,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    #[serde(rename = "currentPage")]
    pub current_page: u32,
}

#[derive(Debug, Serialize)]
pub struct StockItemView {
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub sku: Sku,
    pub count: u32,
    pub price: u32,
    pub location: String,
}

impl From<StockItem> for StockItemView {
    fn from(item: StockItem) -> Self {
        Self {
            user_id: item.owner.0,
            sku: item.sku,
            count: item.count,
            price: item.price,
            location: item.location,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockListView {
    pub items: Vec<StockItemView>,
    #[serde(rename = "totalCount")]
    pub total_count: u64,
    #[serde(rename = "pageCount")]
    pub page_count: u64,
}

// ============================================================================
// Handlers
// ============================================================================

async fn add_item(
    engine: web::Data<InventoryEngine>,
    body: web::Json<AddStockItemBody>,
) -> Result<HttpResponse, ServiceError> {
    let body = body.into_inner();
    engine
        .add_stock(NewStock {
            owner: OwnerId(body.user_id),
            sku: SkuId(body.sku_id),
            count: body.count,
            price: body.price,
            location: body.location,
        })
        .await?;

    Ok(ok_message("stock item added successfully"))
}

async fn delete_item(
    engine: web::Data<InventoryEngine>,
    body: web::Json<DeleteStockItemBody>,
) -> Result<HttpResponse, ServiceError> {
    engine.delete_stock(OwnerId(body.user_id), SkuId(body.sku_id)).await?;
    Ok(ok_message("stock item deleted successfully"))
}

async fn get_item(
    engine: web::Data<InventoryEngine>,
    body: web::Json<GetStockItemBody>,
) -> Result<HttpResponse, ServiceError> {
    let item = engine.get_stock_by_sku(SkuId(body.sku_id)).await?;
    Ok(HttpResponse::Ok().json(StockItemView::from(item)))
}

async fn list_by_location(
    engine: web::Data<InventoryEngine>,
    body: web::Json<ListStockItemsBody>,
) -> Result<HttpResponse, ServiceError> {
    let body = body.into_inner();
    let filter = StockFilter::new(OwnerId(body.user_id), body.location, body.page_size, body.current_page)?;
    let page = engine.list_stock(filter).await?;

    Ok(HttpResponse::Ok().json(StockListView {
        items: page.items.into_iter().map(StockItemView::from).collect(),
        total_count: page.total_count,
        page_count: page.page_count,
    }))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{json_config, track_requests};
    use crate::inventory::tests::RecordingEmitter;
    use crate::metrics::Metrics;
    use crate::storage::memory::InMemoryStore;
    use actix_web::http::StatusCode;
    use actix_web::middleware::from_fn;
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct Fixture {
        engine: Arc<InventoryEngine>,
        metrics: Arc<Metrics>,
        events: Arc<RecordingEmitter>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store.insert_sku(1001, "t-shirt");
        let events = Arc::new(RecordingEmitter::default());
        Fixture {
            engine: Arc::new(InventoryEngine::new(store.clone(), store, events.clone())),
            metrics: Arc::new(Metrics::new().unwrap()),
            events,
        }
    }

    macro_rules! app {
        ($fx:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::from($fx.engine.clone()))
                    .app_data(web::Data::from($fx.metrics.clone()))
                    .app_data(json_config())
                    .wrap(from_fn(track_requests))
                    .configure(routes),
            )
            .await
        };
    }

    fn post(uri: &str, body: Value) -> test::TestRequest {
        test::TestRequest::post().uri(uri).set_json(body)
    }

    #[actix_web::test]
    async fn test_add_then_get_item() {
        let fx = fixture();
        let app = app!(fx);

        let res = test::call_service(
            &app,
            post("/stocks/item/add", json!({"userID": 1, "skuID": 1001, "count": 10, "price": 12, "location": "A"})).to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["message"], "stock item added successfully");

        let res = test::call_service(&app, post("/stocks/item/get", json!({"skuID": 1001})).to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["userID"], 1);
        assert_eq!(body["sku"]["name"], "t-shirt");
        assert_eq!(body["count"], 10);
        assert_eq!(body["location"], "A");

        assert_eq!(fx.events.events.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_unknown_sku_is_404_with_error_body() {
        let fx = fixture();
        let app = app!(fx);

        let res = test::call_service(
            &app,
            post("/stocks/item/add", json!({"userID": 1, "skuID": 42, "count": 1})).to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "sku not found: 42");
        assert!(fx.events.events.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_malformed_body_is_400_json() {
        let fx = fixture();
        let app = app!(fx);

        let res = test::call_service(&app, post("/stocks/item/delete", json!({"userID": "one"})).to_request()).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn test_list_paginates_and_rejects_page_zero() {
        let fx = fixture();
        let app = app!(fx);

        for _ in 0..3 {
            let res = test::call_service(
                &app,
                post("/stocks/item/add", json!({"user_id": 1, "sku_id": 1001, "count": 1, "location": "A"})).to_request(),
            )
            .await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = test::call_service(
            &app,
            post("/stocks/list/location", json!({"userID": 1, "location": "A", "pageSize": 10, "currentPage": 1})).to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["totalCount"], 1);
        assert_eq!(body["pageCount"], 1);
        assert_eq!(body["items"][0]["count"], 3);

        let res = test::call_service(
            &app,
            post("/stocks/list/location", json!({"userID": 1, "location": "A", "pageSize": 10, "currentPage": 0})).to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_requests_are_recorded_per_route() {
        let fx = fixture();
        let app = app!(fx);

        test::call_service(&app, post("/stocks/item/get", json!({"skuID": 1001})).to_request()).await;

        let failed = fx.metrics.failed_requests.with_label_values(&["http", "/stocks/item/get"]);
        assert_eq!(failed.get(), 1);
    }
}
