use std::convert::Infallible;
use std::future::Future;
use tonic::codegen::{http, Body, BoxFuture, StdError};
use tonic::{Request, Response, Status};

// ============================================================================
// Protobuf Messages and Tonic Glue - stocks.StocksService, cart.CartService
// ============================================================================
//
// Written by hand in the shape tonic-build generates, so building needs no
// protoc. Field tags are the wire contract.
//
// ============================================================================

// ============================================================================
// stocks.proto
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateStockItemRequest {
    #[prost(int64, tag = "1")]
    pub user_id: i64,
    #[prost(uint32, tag = "2")]
    pub sku_id: u32,
    #[prost(uint32, tag = "3")]
    pub count: u32,
    #[prost(uint32, tag = "4")]
    pub price: u32,
    #[prost(string, tag = "5")]
    pub location: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteStockItemRequest {
    #[prost(int64, tag = "1")]
    pub user_id: i64,
    #[prost(uint32, tag = "2")]
    pub sku_id: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetStockItemRequest {
    #[prost(uint32, tag = "1")]
    pub sku_id: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StockItemResponse {
    #[prost(uint32, tag = "1")]
    pub sku_id: u32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub r#type: String,
    #[prost(uint32, tag = "4")]
    pub count: u32,
    #[prost(uint32, tag = "5")]
    pub price: u32,
    #[prost(string, tag = "6")]
    pub location: String,
    #[prost(int64, tag = "7")]
    pub user_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FilterRequest {
    #[prost(int64, tag = "1")]
    pub user_id: i64,
    #[prost(string, tag = "2")]
    pub location: String,
    #[prost(int64, tag = "3")]
    pub page_size: i64,
    #[prost(int64, tag = "4")]
    pub current_page: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListStockItemsResponse {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<StockItemResponse>,
    #[prost(uint64, tag = "2")]
    pub total_count: u64,
    #[prost(uint64, tag = "3")]
    pub page_count: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GeneralResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: String,
}

impl GeneralResponse {
    pub fn ok(message: &str) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

// ============================================================================
// cart.proto
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateCartItemRequest {
    #[prost(int64, tag = "1")]
    pub user_id: i64,
    #[prost(uint32, tag = "2")]
    pub sku_id: u32,
    #[prost(uint32, tag = "3")]
    pub count: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoveCartItemRequest {
    #[prost(int64, tag = "1")]
    pub user_id: i64,
    #[prost(uint32, tag = "2")]
    pub sku_id: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClearCartItemRequest {
    #[prost(int64, tag = "1")]
    pub user_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListCartItemsRequest {
    #[prost(int64, tag = "1")]
    pub user_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CartItemResponse {
    #[prost(uint32, tag = "1")]
    pub sku_id: u32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(uint32, tag = "3")]
    pub count: u32,
    #[prost(uint32, tag = "4")]
    pub price: u32,
    #[prost(uint32, tag = "5")]
    pub available: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SkippedCartItem {
    #[prost(uint32, tag = "1")]
    pub sku_id: u32,
    #[prost(string, tag = "2")]
    pub reason: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListCartItemsResponse {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<CartItemResponse>,
    #[prost(uint64, tag = "2")]
    pub total_price: u64,
    #[prost(message, repeated, tag = "3")]
    pub skipped: Vec<SkippedCartItem>,
}

// ============================================================================
// Shared server plumbing
// ============================================================================

/// Adapts a one-shot handler closure to tonic's `UnaryService`.
struct Unary<F>(Option<F>);

impl<Req, Res, F, Fut> tonic::server::UnaryService<Req> for Unary<F>
where
    Res: Send + 'static,
    F: FnOnce(Request<Req>) -> Fut,
    Fut: Future<Output = Result<Response<Res>, Status>> + Send + 'static,
{
    type Response = Res;
    type Future = BoxFuture<Response<Res>, Status>;

    fn call(&mut self, request: Request<Req>) -> Self::Future {
        match self.0.take() {
            Some(handler) => Box::pin(handler(request)),
            None => Box::pin(std::future::ready(Err(Status::internal("handler already consumed")))),
        }
    }
}

/// Decode `Req`, run `handler`, encode `Res`.
async fn unary<B, Req, Res, F, Fut>(req: http::Request<B>, handler: F) -> Result<http::Response<tonic::body::Body>, Infallible>
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
    Req: prost::Message + Default + Send + 'static,
    Res: prost::Message + Send + 'static,
    F: FnOnce(Request<Req>) -> Fut,
    Fut: Future<Output = Result<Response<Res>, Status>> + Send + 'static,
{
    let codec = tonic_prost::ProstCodec::<Res, Req>::default();
    let mut grpc = tonic::server::Grpc::new(codec);
    Ok(grpc.unary(Unary(Some(handler)), req).await)
}

fn unimplemented_method() -> BoxFuture<http::Response<tonic::body::Body>, Infallible> {
    Box::pin(async {
        let mut response = http::Response::new(tonic::body::Body::default());
        let headers = response.headers_mut();
        headers.insert(Status::GRPC_STATUS, (tonic::Code::Unimplemented as i32).into());
        headers.insert(http::header::CONTENT_TYPE, tonic::metadata::GRPC_CONTENT_TYPE);
        Ok(response)
    })
}

// ============================================================================
// stocks.StocksService
// ============================================================================

pub mod stocks_service_server {
    use super::*;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    pub const SERVICE_NAME: &str = "stocks.StocksService";

    #[async_trait::async_trait]
    pub trait StocksService: Send + Sync + 'static {
        async fn add_stock_item(
            &self,
            request: Request<CreateStockItemRequest>,
        ) -> Result<Response<GeneralResponse>, Status>;

        async fn delete_stock_item(
            &self,
            request: Request<DeleteStockItemRequest>,
        ) -> Result<Response<GeneralResponse>, Status>;

        async fn get_stock_item_by_sku(
            &self,
            request: Request<GetStockItemRequest>,
        ) -> Result<Response<StockItemResponse>, Status>;

        async fn list_stock_items_by_location(
            &self,
            request: Request<FilterRequest>,
        ) -> Result<Response<ListStockItemsResponse>, Status>;
    }

    #[derive(Debug)]
    pub struct StocksServiceServer<T> {
        inner: Arc<T>,
    }

    impl<T> StocksServiceServer<T> {
        pub fn from_arc(inner: Arc<T>) -> Self {
            Self { inner }
        }
    }

    impl<T> Clone for StocksServiceServer<T> {
        fn clone(&self) -> Self {
            Self { inner: self.inner.clone() }
        }
    }

    impl<T, B> tonic::codegen::Service<http::Request<B>> for StocksServiceServer<T>
    where
        T: StocksService,
        B: Body + Send + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::Body>;
        type Error = Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/stocks.StocksService/AddStockItem" => Box::pin(unary(req, move |r| async move {
                    inner.add_stock_item(r).await
                })),
                "/stocks.StocksService/DeleteStockItem" => Box::pin(unary(req, move |r| async move {
                    inner.delete_stock_item(r).await
                })),
                "/stocks.StocksService/GetStockItemBySKU" => Box::pin(unary(req, move |r| async move {
                    inner.get_stock_item_by_sku(r).await
                })),
                "/stocks.StocksService/ListStockItemsByLocation" => {
                    Box::pin(unary(req, move |r| async move {
                        inner.list_stock_items_by_location(r).await
                    }))
                }
                _ => unimplemented_method(),
            }
        }
    }

    impl<T> tonic::server::NamedService for StocksServiceServer<T> {
        const NAME: &'static str = SERVICE_NAME;
    }
}

pub mod stocks_service_client {
    use super::*;
    use tonic::codegen::GrpcMethod;
    use tonic::transport::Channel;

    /// Client for the one call the cart service makes.
    #[derive(Debug, Clone)]
    pub struct StocksServiceClient {
        inner: tonic::client::Grpc<Channel>,
    }

    impl StocksServiceClient {
        pub fn new(channel: Channel) -> Self {
            Self { inner: tonic::client::Grpc::new(channel) }
        }

        pub async fn get_stock_item_by_sku(
            &mut self,
            request: impl tonic::IntoRequest<GetStockItemRequest>,
        ) -> Result<Response<StockItemResponse>, Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| Status::unavailable(format!("stocks service not ready: {e}")))?;

            let codec = tonic_prost::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/stocks.StocksService/GetStockItemBySKU");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("stocks.StocksService", "GetStockItemBySKU"));

            self.inner.unary(req, path, codec).await
        }
    }
}

// ============================================================================
// cart.CartService
// ============================================================================

pub mod cart_service_server {
    use super::*;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    pub const SERVICE_NAME: &str = "cart.CartService";

    #[async_trait::async_trait]
    pub trait CartService: Send + Sync + 'static {
        async fn add_cart_item(
            &self,
            request: Request<CreateCartItemRequest>,
        ) -> Result<Response<GeneralResponse>, Status>;

        async fn delete_cart_item(
            &self,
            request: Request<RemoveCartItemRequest>,
        ) -> Result<Response<GeneralResponse>, Status>;

        async fn clear_cart_items(
            &self,
            request: Request<ClearCartItemRequest>,
        ) -> Result<Response<GeneralResponse>, Status>;

        async fn list_cart_items(
            &self,
            request: Request<ListCartItemsRequest>,
        ) -> Result<Response<ListCartItemsResponse>, Status>;
    }

    #[derive(Debug)]
    pub struct CartServiceServer<T> {
        inner: Arc<T>,
    }

    impl<T> CartServiceServer<T> {
        pub fn from_arc(inner: Arc<T>) -> Self {
            Self { inner }
        }
    }

    impl<T> Clone for CartServiceServer<T> {
        fn clone(&self) -> Self {
            Self { inner: self.inner.clone() }
        }
    }

    impl<T, B> tonic::codegen::Service<http::Request<B>> for CartServiceServer<T>
    where
        T: CartService,
        B: Body + Send + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::Body>;
        type Error = Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/cart.CartService/AddCartItem" => Box::pin(unary(req, move |r| async move {
                    inner.add_cart_item(r).await
                })),
                "/cart.CartService/DeleteCartItem" => Box::pin(unary(req, move |r| async move {
                    inner.delete_cart_item(r).await
                })),
                "/cart.CartService/ClearCartItems" => Box::pin(unary(req, move |r| async move {
                    inner.clear_cart_items(r).await
                })),
                "/cart.CartService/ListCartItems" => Box::pin(unary(req, move |r| async move {
                    inner.list_cart_items(r).await
                })),
                _ => unimplemented_method(),
            }
        }
    }

    impl<T> tonic::server::NamedService for CartServiceServer<T> {
        const NAME: &'static str = SERVICE_NAME;
    }
}
