use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ServiceError;

// ============================================================================
// Identifiers
// ============================================================================

/// Owner of a stock row or a cart (seller or shopper, depending on service).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub i64);

/// Catalog identity of an item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkuId(pub u32);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SkuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Catalog and Stock
// ============================================================================

/// Immutable catalog entry. Created out-of-band, only read here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub id: SkuId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Per-owner stock row, keyed by `(owner, sku.id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub owner: OwnerId,
    pub sku: Sku,
    pub count: u32,
    pub price: u32,
    pub location: String,
}

/// A stock addition as requested by a caller.
///
/// `price == 0` and an empty `location` mean "leave the stored value alone"
/// when the row already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStock {
    pub owner: OwnerId,
    pub sku: SkuId,
    pub count: u32,
    pub price: u32,
    pub location: String,
}

impl NewStock {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.owner.0 <= 0 {
            return Err(ServiceError::invalid("owner id must be positive"));
        }
        if self.sku.0 == 0 {
            return Err(ServiceError::invalid("sku id must be positive"));
        }
        if self.count == 0 {
            return Err(ServiceError::invalid("count must be positive"));
        }
        Ok(())
    }
}

/// Owner + location filter with 1-indexed pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockFilter {
    pub owner: OwnerId,
    pub location: String,
    pub page_size: u32,
    pub page: u32,
}

impl StockFilter {
    pub fn new(
        owner: OwnerId,
        location: impl Into<String>,
        page_size: u32,
        page: u32,
    ) -> Result<Self, ServiceError> {
        let location = location.into();
        if owner.0 <= 0 {
            return Err(ServiceError::invalid("owner id must be positive"));
        }
        if location.is_empty() {
            return Err(ServiceError::invalid("location is required"));
        }
        if page_size < 1 {
            return Err(ServiceError::invalid("page size must be at least 1"));
        }
        if page < 1 {
            return Err(ServiceError::invalid("page must be at least 1"));
        }

        Ok(Self { owner, location, page_size, page })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockPage {
    pub items: Vec<StockItem>,
    pub total_count: u64,
    pub page_count: u64,
}

impl StockPage {
    pub fn new(items: Vec<StockItem>, total_count: u64, page_size: u32) -> Self {
        let page_count = total_count.div_ceil(u64::from(page_size.max(1)));
        Self { items, total_count, page_count }
    }
}

// ============================================================================
// Cart
// ============================================================================

/// Requested quantity of a SKU in an owner's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub owner: OwnerId,
    pub sku: SkuId,
    pub count: u32,
}

impl CartItem {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.owner.0 <= 0 {
            return Err(ServiceError::invalid("owner id must be positive"));
        }
        if self.sku.0 == 0 {
            return Err(ServiceError::invalid("sku id must be positive"));
        }
        if self.count == 0 {
            return Err(ServiceError::invalid("count must be positive"));
        }
        Ok(())
    }
}

/// A cart row resolved against the live stock snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub sku: SkuId,
    pub name: String,
    pub price: u32,
    /// Quantity requested in the cart.
    pub count: u32,
    /// Quantity currently in stock.
    pub available: u32,
}

impl CartLine {
    pub fn line_total(&self) -> u64 {
        u64::from(self.price) * u64::from(self.count)
    }
}

/// A cart row that could not be resolved and was left out of the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub sku: SkuId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartListing {
    pub items: Vec<CartLine>,
    pub total_price: u64,
    pub skipped: Vec<SkippedLine>,
}

impl CartListing {
    pub fn new(items: Vec<CartLine>, skipped: Vec<SkippedLine>) -> Self {
        let total_price = items.iter().map(CartLine::line_total).sum();
        Self { items, total_price, skipped }
    }

    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
