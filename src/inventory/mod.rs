use async_trait::async_trait;
use std::sync::Arc;

use crate::cart::StockLookup;
use crate::domain::{
    AuditPayload, NewStock, OwnerId, ServiceError, SkuId, StockFilter, StockItem, StockPage,
};
use crate::messaging::EventEmitter;
use crate::storage::{SkuCatalog, StockRepository};

// ============================================================================
// Inventory Engine
// ============================================================================
//
// Owns the create-or-merge rule for stock rows:
//   - the SKU must exist in the catalog
//   - the merge itself is one atomic upsert in storage
//   - `sku_created` on insert, `stock_changed` on merge, carrying the row
//     as stored after the write
//
// ============================================================================

pub struct InventoryEngine {
    catalog: Arc<dyn SkuCatalog>,
    stock: Arc<dyn StockRepository>,
    events: Arc<dyn EventEmitter>,
}

impl InventoryEngine {
    pub fn new(
        catalog: Arc<dyn SkuCatalog>,
        stock: Arc<dyn StockRepository>,
        events: Arc<dyn EventEmitter>,
    ) -> Self {
        Self { catalog, stock, events }
    }

    pub async fn add_stock(&self, request: NewStock) -> Result<StockItem, ServiceError> {
        request.validate()?;
        tracing::debug!(owner_id = %request.owner, sku_id = %request.sku, count = request.count, "Adding stock");

        self.catalog
            .get_sku(request.sku)
            .await
            .map_err(|e| ServiceError::from_storage(e, ServiceError::SkuNotFound(request.sku)))?;

        let upsert = self.stock.upsert_stock(&request).await.map_err(|e| {
            tracing::error!(owner_id = %request.owner, sku_id = %request.sku, error = %e, "Stock upsert failed");
            ServiceError::from_storage(e, ServiceError::SkuNotFound(request.sku))
        })?;

        let payload = if upsert.created {
            tracing::info!(owner_id = %request.owner, sku_id = %request.sku, count = upsert.item.count, "Stock row created");
            AuditPayload::sku_created(&upsert.item)
        } else {
            tracing::info!(owner_id = %request.owner, sku_id = %request.sku, count = upsert.item.count, "Stock row merged");
            AuditPayload::stock_changed(&upsert.item)
        };
        self.events.emit(payload);

        Ok(upsert.item)
    }

    pub async fn delete_stock(&self, owner: OwnerId, sku: SkuId) -> Result<(), ServiceError> {
        tracing::debug!(owner_id = %owner, sku_id = %sku, "Deleting stock");

        self.stock
            .delete_stock(owner, sku)
            .await
            .map_err(|e| ServiceError::from_storage(e, ServiceError::StockItemNotFound))?;

        tracing::info!(owner_id = %owner, sku_id = %sku, "Stock row deleted");
        Ok(())
    }

    pub async fn get_stock_by_sku(&self, sku: SkuId) -> Result<StockItem, ServiceError> {
        self.stock
            .get_stock_by_sku(sku)
            .await
            .map_err(|e| ServiceError::from_storage(e, ServiceError::StockItemNotFound))
    }

    pub async fn list_stock(&self, filter: StockFilter) -> Result<StockPage, ServiceError> {
        tracing::debug!(owner_id = %filter.owner, location = %filter.location, page = filter.page, "Listing stock");

        let total = self.stock.count_stock(filter.owner, &filter.location).await?;
        let items = self.stock.list_stock(&filter).await?;

        Ok(StockPage::new(items, total, filter.page_size))
    }
}

#[async_trait]
impl StockLookup for InventoryEngine {
    async fn stock_by_sku(&self, sku: SkuId) -> Result<StockItem, ServiceError> {
        self.get_stock_by_sku(sku).await
    }
}
