pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::domain::{CartItem, NewStock, OwnerId, Sku, SkuId, StockFilter, StockItem};

// ============================================================================
// Storage Capabilities
// ============================================================================
//
// The engines only see these traits. Each is a narrow capability set so an
// engine can be wired with exactly what it reads and writes.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No row matched (lookup miss or zero rows affected).
    #[error("no matching row")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored value out of range in column {column}")]
    InvalidValue { column: &'static str },

    /// The merged stock count would not fit the row's count range.
    #[error("stock count overflow")]
    CountOverflow,
}

/// Result of the additive stock upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUpsert {
    /// The row after the write.
    pub item: StockItem,
    /// True when the row did not exist before.
    pub created: bool,
}

#[async_trait]
pub trait SkuCatalog: Send + Sync {
    async fn get_sku(&self, sku: SkuId) -> Result<Sku, StorageError>;
}

#[async_trait]
pub trait StockRepository: Send + Sync {
    /// Insert the row, or merge into the existing one in a single atomic
    /// step: counts add up, a zero price or empty location keeps the stored
    /// value.
    async fn upsert_stock(&self, stock: &NewStock) -> Result<StockUpsert, StorageError>;

    async fn delete_stock(&self, owner: OwnerId, sku: SkuId) -> Result<(), StorageError>;

    /// Lowest owner id wins when several owners stock the SKU.
    async fn get_stock_by_sku(&self, sku: SkuId) -> Result<StockItem, StorageError>;

    async fn count_stock(&self, owner: OwnerId, location: &str) -> Result<u64, StorageError>;

    async fn list_stock(&self, filter: &StockFilter) -> Result<Vec<StockItem>, StorageError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Create or overwrite; the stored count becomes `item.count`.
    async fn upsert_cart_item(&self, item: &CartItem) -> Result<(), StorageError>;

    async fn delete_cart_item(&self, owner: OwnerId, sku: SkuId) -> Result<(), StorageError>;

    /// Returns the number of rows removed; `NotFound` when the cart was empty.
    async fn clear_cart(&self, owner: OwnerId) -> Result<u64, StorageError>;

    async fn list_cart(&self, owner: OwnerId) -> Result<Vec<CartItem>, StorageError>;
}
