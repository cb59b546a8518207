use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};

use super::proto::stocks_service_server::StocksService;
use super::proto::{
    CreateStockItemRequest, DeleteStockItemRequest, FilterRequest, GeneralResponse,
    GetStockItemRequest, ListStockItemsResponse, StockItemResponse,
};
use super::respond;
use crate::domain::{NewStock, OwnerId, ServiceError, SkuId, StockFilter, StockItem};
use crate::inventory::InventoryEngine;
use crate::metrics::Metrics;

const ADD_STOCK_ITEM: &str = "/stocks.StocksService/AddStockItem";
const DELETE_STOCK_ITEM: &str = "/stocks.StocksService/DeleteStockItem";
const GET_STOCK_ITEM_BY_SKU: &str = "/stocks.StocksService/GetStockItemBySKU";
const LIST_STOCK_ITEMS: &str = "/stocks.StocksService/ListStockItemsByLocation";

pub struct StocksRpc {
    engine: Arc<InventoryEngine>,
    metrics: Arc<Metrics>,
}

impl StocksRpc {
    pub fn new(engine: Arc<InventoryEngine>, metrics: Arc<Metrics>) -> Self {
        Self { engine, metrics }
    }
}

impl From<StockItem> for StockItemResponse {
    fn from(item: StockItem) -> Self {
        Self {
            sku_id: item.sku.id.0,
            name: item.sku.name,
            r#type: item.sku.kind,
            count: item.count,
            price: item.price,
            location: item.location,
            user_id: item.owner.0,
        }
    }
}

fn page_arg(value: i64, field: &str) -> Result<u32, ServiceError> {
    u32::try_from(value).map_err(|_| ServiceError::invalid(format!("{field} out of range")))
}

#[async_trait::async_trait]
impl StocksService for StocksRpc {
    async fn add_stock_item(
        &self,
        request: Request<CreateStockItemRequest>,
    ) -> Result<Response<GeneralResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = self
            .engine
            .add_stock(NewStock {
                owner: OwnerId(req.user_id),
                sku: SkuId(req.sku_id),
                count: req.count,
                price: req.price,
                location: req.location,
            })
            .await
            .map(|_| GeneralResponse::ok("stock item added successfully"));

        respond(&self.metrics, ADD_STOCK_ITEM, started, result)
    }

    async fn delete_stock_item(
        &self,
        request: Request<DeleteStockItemRequest>,
    ) -> Result<Response<GeneralResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = self
            .engine
            .delete_stock(OwnerId(req.user_id), SkuId(req.sku_id))
            .await
            .map(|_| GeneralResponse::ok("stock item removed successfully"));

        respond(&self.metrics, DELETE_STOCK_ITEM, started, result)
    }

    async fn get_stock_item_by_sku(
        &self,
        request: Request<GetStockItemRequest>,
    ) -> Result<Response<StockItemResponse>, Status> {
        let started = Instant::now();
        let sku = SkuId(request.into_inner().sku_id);

        let result = self.engine.get_stock_by_sku(sku).await.map(StockItemResponse::from);

        respond(&self.metrics, GET_STOCK_ITEM_BY_SKU, started, result)
    }

    async fn list_stock_items_by_location(
        &self,
        request: Request<FilterRequest>,
    ) -> Result<Response<ListStockItemsResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = async {
            let filter = StockFilter::new(
                OwnerId(req.user_id),
                req.location,
                page_arg(req.page_size, "pageSize")?,
                page_arg(req.current_page, "currentPage")?,
            )?;
            let page = self.engine.list_stock(filter).await?;

            Ok::<_, ServiceError>(ListStockItemsResponse {
                items: page.items.into_iter().map(StockItemResponse::from).collect(),
                total_count: page.total_count,
                page_count: page.page_count,
            })
        }
        .await;

        respond(&self.metrics, LIST_STOCK_ITEMS, started, result)
    }
}
