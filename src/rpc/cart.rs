use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};

use super::proto::cart_service_server::CartService;
use super::proto::{
    CartItemResponse, ClearCartItemRequest, CreateCartItemRequest, GeneralResponse,
    ListCartItemsRequest, ListCartItemsResponse, RemoveCartItemRequest, SkippedCartItem,
};
use super::respond;
use crate::cart::CartEngine;
use crate::domain::{CartItem, CartListing, OwnerId, ServiceError, SkuId};
use crate::metrics::Metrics;

const ADD_CART_ITEM: &str = "/cart.CartService/AddCartItem";
const DELETE_CART_ITEM: &str = "/cart.CartService/DeleteCartItem";
const CLEAR_CART_ITEMS: &str = "/cart.CartService/ClearCartItems";
const LIST_CART_ITEMS: &str = "/cart.CartService/ListCartItems";

pub struct CartRpc {
    engine: Arc<CartEngine>,
    metrics: Arc<Metrics>,
}

impl CartRpc {
    pub fn new(engine: Arc<CartEngine>, metrics: Arc<Metrics>) -> Self {
        Self { engine, metrics }
    }
}

fn owner(user_id: i64) -> Result<OwnerId, ServiceError> {
    if user_id <= 0 {
        return Err(ServiceError::invalid("user ID must be positive"));
    }
    Ok(OwnerId(user_id))
}

impl From<CartListing> for ListCartItemsResponse {
    fn from(listing: CartListing) -> Self {
        Self {
            items: listing
                .items
                .into_iter()
                .map(|line| CartItemResponse {
                    sku_id: line.sku.0,
                    name: line.name,
                    count: line.count,
                    price: line.price,
                    available: line.available,
                })
                .collect(),
            total_price: listing.total_price,
            skipped: listing
                .skipped
                .into_iter()
                .map(|s| SkippedCartItem { sku_id: s.sku.0, reason: s.reason })
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl CartService for CartRpc {
    async fn add_cart_item(
        &self,
        request: Request<CreateCartItemRequest>,
    ) -> Result<Response<GeneralResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();

        let item = CartItem { owner: OwnerId(req.user_id), sku: SkuId(req.sku_id), count: req.count };
        let result = self
            .engine
            .add_cart_item(item)
            .await
            .map(|_| GeneralResponse::ok("cart item added successfully"));

        respond(&self.metrics, ADD_CART_ITEM, started, result)
    }

    async fn delete_cart_item(
        &self,
        request: Request<RemoveCartItemRequest>,
    ) -> Result<Response<GeneralResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = match owner(req.user_id) {
            Ok(owner) => self
                .engine
                .delete_cart_item(owner, SkuId(req.sku_id))
                .await
                .map(|_| GeneralResponse::ok("cart item deleted successfully")),
            Err(e) => Err(e),
        };

        respond(&self.metrics, DELETE_CART_ITEM, started, result)
    }

    async fn clear_cart_items(
        &self,
        request: Request<ClearCartItemRequest>,
    ) -> Result<Response<GeneralResponse>, Status> {
        let started = Instant::now();

        let result = match owner(request.into_inner().user_id) {
            Ok(owner) => self
                .engine
                .clear_cart(owner)
                .await
                .map(|_| GeneralResponse::ok("cart items cleared successfully")),
            Err(e) => Err(e),
        };

        respond(&self.metrics, CLEAR_CART_ITEMS, started, result)
    }

    async fn list_cart_items(
        &self,
        request: Request<ListCartItemsRequest>,
    ) -> Result<Response<ListCartItemsResponse>, Status> {
        let started = Instant::now();

        let result = match owner(request.into_inner().user_id) {
            Ok(owner) => self.engine.list_cart(owner).await.map(ListCartItemsResponse::from),
            Err(e) => Err(e),
        };

        respond(&self.metrics, LIST_CART_ITEMS, started, result)
    }
}
