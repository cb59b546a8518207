use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{CartRepository, SkuCatalog, StockRepository, StockUpsert, StorageError};
use crate::domain::{CartItem, NewStock, OwnerId, Sku, SkuId, StockFilter, StockItem};

/// In-memory store honouring the same contracts as `PgStore`, including the
/// atomic additive stock merge. Test-only.
#[derive(Default)]
pub struct InMemoryStore {
    skus: Mutex<BTreeMap<SkuId, Sku>>,
    stock: Mutex<BTreeMap<(OwnerId, SkuId), StockItem>>,
    carts: Mutex<BTreeMap<(OwnerId, SkuId), u32>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_sku(&self, id: u32, name: &str) {
        self.skus.lock().unwrap().insert(
            SkuId(id),
            Sku { id: SkuId(id), name: name.to_string(), kind: "apparel".to_string() },
        );
    }

    pub fn stock_row(&self, owner: OwnerId, sku: SkuId) -> Option<StockItem> {
        self.stock.lock().unwrap().get(&(owner, sku)).cloned()
    }

    pub fn cart_count(&self, owner: OwnerId, sku: SkuId) -> Option<u32> {
        self.carts.lock().unwrap().get(&(owner, sku)).copied()
    }
}

#[async_trait]
impl SkuCatalog for InMemoryStore {
    async fn get_sku(&self, sku: SkuId) -> Result<Sku, StorageError> {
        self.skus.lock().unwrap().get(&sku).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl StockRepository for InMemoryStore {
    async fn upsert_stock(&self, new: &NewStock) -> Result<StockUpsert, StorageError> {
        let sku = self.get_sku(new.sku).await?;
        let mut stock = self.stock.lock().unwrap();

        let (item, created) = match stock.get(&(new.owner, new.sku)) {
            Some(existing) => {
                let count = existing.count.checked_add(new.count).ok_or(StorageError::CountOverflow)?;
                let merged = StockItem {
                    owner: new.owner,
                    sku,
                    count,
                    price: if new.price == 0 { existing.price } else { new.price },
                    location: if new.location.is_empty() {
                        existing.location.clone()
                    } else {
                        new.location.clone()
                    },
                };
                (merged, false)
            }
            None => {
                let inserted = StockItem {
                    owner: new.owner,
                    sku,
                    count: new.count,
                    price: new.price,
                    location: new.location.clone(),
                };
                (inserted, true)
            }
        };

        stock.insert((new.owner, new.sku), item.clone());
        Ok(StockUpsert { item, created })
    }

    async fn delete_stock(&self, owner: OwnerId, sku: SkuId) -> Result<(), StorageError> {
        self.stock
            .lock()
            .unwrap()
            .remove(&(owner, sku))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn get_stock_by_sku(&self, sku: SkuId) -> Result<StockItem, StorageError> {
        // BTreeMap order is (owner, sku), so the first hit has the lowest owner.
        self.stock
            .lock()
            .unwrap()
            .values()
            .find(|item| item.sku.id == sku)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn count_stock(&self, owner: OwnerId, location: &str) -> Result<u64, StorageError> {
        let stock = self.stock.lock().unwrap();
        Ok(stock
            .values()
            .filter(|item| item.owner == owner && item.location == location)
            .count() as u64)
    }

    async fn list_stock(&self, filter: &StockFilter) -> Result<Vec<StockItem>, StorageError> {
        let stock = self.stock.lock().unwrap();
        Ok(stock
            .values()
            .filter(|item| item.owner == filter.owner && item.location == filter.location)
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn upsert_cart_item(&self, item: &CartItem) -> Result<(), StorageError> {
        self.carts.lock().unwrap().insert((item.owner, item.sku), item.count);
        Ok(())
    }

    async fn delete_cart_item(&self, owner: OwnerId, sku: SkuId) -> Result<(), StorageError> {
        self.carts
            .lock()
            .unwrap()
            .remove(&(owner, sku))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn clear_cart(&self, owner: OwnerId) -> Result<u64, StorageError> {
        let mut carts = self.carts.lock().unwrap();
        let before = carts.len();
        carts.retain(|(o, _), _| *o != owner);

        match (before - carts.len()) as u64 {
            0 => Err(StorageError::NotFound),
            removed => Ok(removed),
        }
    }

    async fn list_cart(&self, owner: OwnerId) -> Result<Vec<CartItem>, StorageError> {
        let carts = self.carts.lock().unwrap();
        Ok(carts
            .iter()
            .filter(|((o, _), _)| *o == owner)
            .map(|(&(owner, sku), &count)| CartItem { owner, sku, count })
            .collect())
    }
}
