pub mod remote;

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{
    AuditPayload, CartItem, CartLine, CartListing, OwnerId, ServiceError, SkippedLine, SkuId,
    StockItem, REASON_NOT_ENOUGH_STOCK,
};
use crate::messaging::EventEmitter;
use crate::storage::CartRepository;

pub use remote::RemoteStockClient;

// ============================================================================
// Cart Engine
// ============================================================================
//
// Validates reservations against a point-in-time stock snapshot. A rejected
// reservation is audited before the error is returned and writes nothing.
// Cart rows are overwritten on add, never summed.
//
// ============================================================================

/// Read access to the current stock snapshot for a SKU.
#[async_trait]
pub trait StockLookup: Send + Sync {
    async fn stock_by_sku(&self, sku: SkuId) -> Result<StockItem, ServiceError>;
}

pub struct CartEngine {
    stock: Arc<dyn StockLookup>,
    carts: Arc<dyn CartRepository>,
    events: Arc<dyn EventEmitter>,
}

impl CartEngine {
    pub fn new(
        stock: Arc<dyn StockLookup>,
        carts: Arc<dyn CartRepository>,
        events: Arc<dyn EventEmitter>,
    ) -> Self {
        Self { stock, carts, events }
    }

    pub async fn add_cart_item(&self, item: CartItem) -> Result<(), ServiceError> {
        item.validate()?;
        tracing::debug!(owner_id = %item.owner, sku_id = %item.sku, count = item.count, "Adding cart item");

        let stock = self.stock.stock_by_sku(item.sku).await.map_err(|e| {
            tracing::error!(sku_id = %item.sku, error = %e, "Stock lookup failed");
            ServiceError::StockLookup(e.to_string())
        })?;

        if item.count > stock.count {
            tracing::info!(
                owner_id = %item.owner,
                sku_id = %item.sku,
                requested = item.count,
                available = stock.count,
                "Not enough stock for cart item"
            );
            self.events.emit(AuditPayload::cart_item_failed(
                item.owner,
                item.sku,
                item.count,
                stock.price,
                REASON_NOT_ENOUGH_STOCK,
            ));
            return Err(ServiceError::InsufficientStock {
                requested: item.count,
                available: stock.count,
            });
        }

        self.events
            .emit(AuditPayload::cart_item_added(item.owner, item.sku, item.count, stock.price));

        self.carts.upsert_cart_item(&item).await.map_err(|e| {
            tracing::error!(owner_id = %item.owner, sku_id = %item.sku, error = %e, "Cart upsert failed");
            ServiceError::from(e)
        })?;

        tracing::info!(owner_id = %item.owner, sku_id = %item.sku, count = item.count, "Cart item stored");
        Ok(())
    }

    pub async fn delete_cart_item(&self, owner: OwnerId, sku: SkuId) -> Result<(), ServiceError> {
        self.carts
            .delete_cart_item(owner, sku)
            .await
            .map_err(|e| ServiceError::from_storage(e, ServiceError::CartItemNotFound))?;

        tracing::info!(owner_id = %owner, sku_id = %sku, "Cart item deleted");
        Ok(())
    }

    pub async fn clear_cart(&self, owner: OwnerId) -> Result<(), ServiceError> {
        let removed = self
            .carts
            .clear_cart(owner)
            .await
            .map_err(|e| ServiceError::from_storage(e, ServiceError::CartItemNotFound))?;

        tracing::info!(owner_id = %owner, removed, "Cart cleared");
        Ok(())
    }

    /// Resolve every cart row against live stock. Rows that fail to resolve
    /// are reported in `skipped` and left out of the total.
    pub async fn list_cart(&self, owner: OwnerId) -> Result<CartListing, ServiceError> {
        let rows = self.carts.list_cart(owner).await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut skipped = Vec::new();

        for row in rows {
            match self.stock.stock_by_sku(row.sku).await {
                Ok(stock) => items.push(CartLine {
                    sku: row.sku,
                    name: stock.sku.name,
                    price: stock.price,
                    count: row.count,
                    available: stock.count,
                }),
                Err(e) => {
                    tracing::warn!(owner_id = %owner, sku_id = %row.sku, error = %e, "Skipping unresolvable cart item");
                    skipped.push(SkippedLine { sku: row.sku, reason: e.to_string() });
                }
            }
        }

        Ok(CartListing::new(items, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuditEventType, NewStock};
    use crate::inventory::tests::RecordingEmitter;
    use crate::inventory::InventoryEngine;
    use crate::storage::memory::InMemoryStore;

    struct Fixture {
        engine: CartEngine,
        inventory: Arc<InventoryEngine>,
        store: Arc<InMemoryStore>,
        events: Arc<RecordingEmitter>,
    }

    /// SKU 1001 stocked with 10 at price 12 by owner 100.
    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store.insert_sku(1001, "t-shirt");
        store.insert_sku(1002, "cap");

        let inventory = Arc::new(InventoryEngine::new(
            store.clone(),
            store.clone(),
            Arc::new(RecordingEmitter::default()),
        ));
        inventory
            .add_stock(NewStock {
                owner: OwnerId(100),
                sku: SkuId(1001),
                count: 10,
                price: 12,
                location: "A".into(),
            })
            .await
            .unwrap();

        let events = Arc::new(RecordingEmitter::default());
        let engine = CartEngine::new(inventory.clone(), store.clone(), events.clone());
        Fixture { engine, inventory, store, events }
    }

    fn item(sku: u32, count: u32) -> CartItem {
        CartItem { owner: OwnerId(1), sku: SkuId(sku), count }
    }

    #[tokio::test]
    async fn test_over_request_is_audited_and_not_written() {
        let f = fixture().await;

        let err = f.engine.add_cart_item(item(1001, 11)).await.unwrap_err();

        assert!(matches!(err, ServiceError::InsufficientStock { requested: 11, available: 10 }));
        assert!(f.store.cart_count(OwnerId(1), SkuId(1001)).is_none());
        assert_eq!(f.events.types(), vec![AuditEventType::CartItemFailed]);
        match &f.events.events.lock().unwrap()[0] {
            AuditPayload::CartItemFailed(p) => {
                assert_eq!(p.reason, "not enough stock");
                assert_eq!(p.cart_id, "1");
            }
            other => panic!("unexpected payload {other:?}"),
        };
    }

    #[tokio::test]
    async fn test_add_overwrites_instead_of_summing() {
        let f = fixture().await;

        f.engine.add_cart_item(item(1001, 3)).await.unwrap();
        f.engine.add_cart_item(item(1001, 2)).await.unwrap();

        assert_eq!(f.store.cart_count(OwnerId(1), SkuId(1001)), Some(2));
        assert_eq!(
            f.events.types(),
            vec![AuditEventType::CartItemAdded, AuditEventType::CartItemAdded]
        );
    }

    #[tokio::test]
    async fn test_request_equal_to_stock_is_accepted() {
        let f = fixture().await;
        f.engine.add_cart_item(item(1001, 10)).await.unwrap();
        assert_eq!(f.store.cart_count(OwnerId(1), SkuId(1001)), Some(10));
    }

    #[tokio::test]
    async fn test_missing_stock_is_a_lookup_failure() {
        let f = fixture().await;

        let err = f.engine.add_cart_item(item(1002, 1)).await.unwrap_err();

        assert!(matches!(err, ServiceError::StockLookup(_)));
        assert_eq!(err.kind(), crate::domain::ErrorKind::Internal);
        assert!(f.events.types().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_clear_report_missing_rows() {
        let f = fixture().await;

        assert!(matches!(
            f.engine.delete_cart_item(OwnerId(1), SkuId(1001)).await,
            Err(ServiceError::CartItemNotFound)
        ));
        assert!(matches!(f.engine.clear_cart(OwnerId(1)).await, Err(ServiceError::CartItemNotFound)));

        f.engine.add_cart_item(item(1001, 1)).await.unwrap();
        f.engine.clear_cart(OwnerId(1)).await.unwrap();
        assert!(f.store.cart_count(OwnerId(1), SkuId(1001)).is_none());
    }

    #[tokio::test]
    async fn test_listing_skips_unresolvable_items() {
        let f = fixture().await;
        f.inventory
            .add_stock(NewStock {
                owner: OwnerId(100),
                sku: SkuId(1002),
                count: 5,
                price: 7,
                location: "A".into(),
            })
            .await
            .unwrap();

        f.engine.add_cart_item(item(1001, 2)).await.unwrap();
        f.engine.add_cart_item(item(1002, 3)).await.unwrap();
        f.inventory.delete_stock(OwnerId(100), SkuId(1002)).await.unwrap();

        let listing = f.engine.list_cart(OwnerId(1)).await.unwrap();

        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.items[0].name, "t-shirt");
        assert_eq!(listing.items[0].count, 2);
        assert_eq!(listing.items[0].available, 10);
        assert_eq!(listing.total_price, 24);
        assert_eq!(listing.skipped.len(), 1);
        assert_eq!(listing.skipped[0].sku, SkuId(1002));
    }

    #[tokio::test]
    async fn test_empty_cart_lists_nothing() {
        let f = fixture().await;
        let listing = f.engine.list_cart(OwnerId(42)).await.unwrap();
        assert!(listing.items.is_empty());
        assert_eq!(listing.total_price, 0);
        assert!(!listing.is_partial());
    }
}
