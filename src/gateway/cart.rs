use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use super::ok_message;
use crate::cart::CartEngine;
use crate::domain::{CartItem, CartLine, CartListing, OwnerId, ServiceError, SkippedLine, SkuId};

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cart")
            .route("/item/add", web::post().to(add_item))
            .route("/item/delete", web::post().to(delete_item))
            .route("/clear", web::post().to(clear))
            .route("/list", web::post().to(list)),
    );
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemBody {
    #[serde(rename = "userID", alias = "user_id")]
    pub user_id: i64,
    #[serde(rename = "skuID", alias = "sku_id")]
    pub sku_id: u32,
    pub count: u32,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCartItemBody {
    #[serde(rename = "userID", alias = "user_id")]
    pub user_id: i64,
    #[serde(rename = "skuID", alias = "sku_id")]
    pub sku_id: u32,
}

#[derive(Debug, Deserialize)]
pub struct CartOwnerBody {
    #[serde(rename = "userID", alias = "user_id")]
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CartListView {
    pub items: Vec<CartLine>,
    #[serde(rename = "totalPrice")]
    pub total_price: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedLine>,
}

impl From<CartListing> for CartListView {
    fn from(listing: CartListing) -> Self {
        Self {
            items: listing.items,
            total_price: listing.total_price,
            skipped: listing.skipped,
        }
    }
}

fn owner(user_id: i64) -> Result<OwnerId, ServiceError> {
    if user_id <= 0 {
        return Err(ServiceError::invalid("owner id must be positive"));
    }
    Ok(OwnerId(user_id))
}

async fn add_item(
    engine: web::Data<CartEngine>,
    body: web::Json<AddCartItemBody>,
) -> Result<HttpResponse, ServiceError> {
    engine
        .add_cart_item(CartItem {
            owner: OwnerId(body.user_id),
            sku: SkuId(body.sku_id),
            count: body.count,
        })
        .await?;

    Ok(ok_message("cart item added successfully"))
}

async fn delete_item(
    engine: web::Data<CartEngine>,
    body: web::Json<DeleteCartItemBody>,
) -> Result<HttpResponse, ServiceError> {
    engine.delete_cart_item(owner(body.user_id)?, SkuId(body.sku_id)).await?;
    Ok(ok_message("cart item deleted successfully"))
}

async fn clear(
    engine: web::Data<CartEngine>,
    body: web::Json<CartOwnerBody>,
) -> Result<HttpResponse, ServiceError> {
    engine.clear_cart(owner(body.user_id)?).await?;
    Ok(ok_message("cart cleared successfully"))
}

async fn list(
    engine: web::Data<CartEngine>,
    body: web::Json<CartOwnerBody>,
) -> Result<HttpResponse, ServiceError> {
    let listing = engine.list_cart(owner(body.user_id)?).await?;
    Ok(HttpResponse::Ok().json(CartListView::from(listing)))
}
