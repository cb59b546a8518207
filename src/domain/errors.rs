use crate::storage::StorageError;
use super::value_objects::SkuId;

// ============================================================================
// Service Errors
// ============================================================================
//
// Engines return these; transports map `kind()` onto their own status codes.
//
// ============================================================================

/// Transport-independent classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("sku not found: {0}")]
    SkuNotFound(SkuId),

    #[error("stock item not found")]
    StockItemNotFound,

    #[error("cart item not found")]
    CartItemNotFound,

    #[error("insufficient stock count: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("stock lookup failed: {0}")]
    StockLookup(String),

    #[error("upstream service error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::SkuNotFound(_)
            | ServiceError::StockItemNotFound
            | ServiceError::CartItemNotFound => ErrorKind::NotFound,
            ServiceError::InsufficientStock { .. } | ServiceError::InvalidArgument(_) => {
                ErrorKind::InvalidArgument
            }
            ServiceError::StockLookup(_)
            | ServiceError::Upstream(_)
            | ServiceError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Translate a storage error, turning "no rows" into the given sentinel.
    pub fn from_storage(err: StorageError, not_found: ServiceError) -> Self {
        match err {
            StorageError::NotFound => not_found,
            StorageError::CountOverflow => {
                ServiceError::invalid(format!("stock count would exceed {}", u32::MAX))
            }
            other => ServiceError::Storage(other),
        }
    }
}
