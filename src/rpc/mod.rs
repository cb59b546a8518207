pub mod cart;
pub mod proto;
pub mod status;
pub mod stocks;

use std::time::Instant;
use tonic::{Response, Status};

use crate::domain::ServiceError;
use crate::metrics::Metrics;

pub use cart::CartRpc;
pub use stocks::StocksRpc;

pub(crate) const TRANSPORT: &str = "grpc";

/// Record the call and convert the engine result into a gRPC reply.
pub(crate) fn respond<T>(
    metrics: &Metrics,
    path: &str,
    started: Instant,
    result: Result<T, ServiceError>,
) -> Result<Response<T>, Status> {
    metrics.record_request(TRANSPORT, path, started.elapsed(), result.is_err());
    result.map(Response::new).map_err(|e| status::to_status(path, &e))
}
