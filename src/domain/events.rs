use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{OwnerId, SkuId, StockItem};

// ============================================================================
// Audit Events - published to the bus, never read back by the services
// ============================================================================
//
// Wire shape:
//   {"type": "...", "service": "...", "timestamp": "...", "payload": {...}}
//
// The payload shape is selected by `type`.
//
// ============================================================================

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILED: &str = "failed";
pub const REASON_NOT_ENOUGH_STOCK: &str = "not enough stock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    SkuCreated,
    StockChanged,
    CartItemAdded,
    CartItemFailed,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::SkuCreated => "sku_created",
            AuditEventType::StockChanged => "stock_changed",
            AuditEventType::CartItemAdded => "cart_item_added",
            AuditEventType::CartItemFailed => "cart_item_failed",
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Stock row state after a create or merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPayload {
    pub sku: SkuId,
    pub count: u32,
    pub price: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemAddedPayload {
    pub cart_id: String,
    pub sku: SkuId,
    pub count: u32,
    pub price: u32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemFailedPayload {
    pub cart_id: String,
    pub sku: SkuId,
    pub count: u32,
    pub price: u32,
    pub status: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AuditPayload {
    SkuCreated(StockPayload),
    StockChanged(StockPayload),
    CartItemAdded(CartItemAddedPayload),
    CartItemFailed(CartItemFailedPayload),
}

impl AuditPayload {
    pub fn sku_created(item: &StockItem) -> Self {
        AuditPayload::SkuCreated(StockPayload {
            sku: item.sku.id,
            count: item.count,
            price: item.price,
        })
    }

    pub fn stock_changed(item: &StockItem) -> Self {
        AuditPayload::StockChanged(StockPayload {
            sku: item.sku.id,
            count: item.count,
            price: item.price,
        })
    }

    // The owner id doubles as the cart id.
    pub fn cart_item_added(owner: OwnerId, sku: SkuId, count: u32, price: u32) -> Self {
        AuditPayload::CartItemAdded(CartItemAddedPayload {
            cart_id: owner.to_string(),
            sku,
            count,
            price,
            status: STATUS_SUCCESS.to_string(),
        })
    }

    pub fn cart_item_failed(
        owner: OwnerId,
        sku: SkuId,
        count: u32,
        price: u32,
        reason: impl Into<String>,
    ) -> Self {
        AuditPayload::CartItemFailed(CartItemFailedPayload {
            cart_id: owner.to_string(),
            sku,
            count,
            price,
            status: STATUS_FAILED.to_string(),
            reason: reason.into(),
        })
    }

    pub fn event_type(&self) -> AuditEventType {
        match self {
            AuditPayload::SkuCreated(_) => AuditEventType::SkuCreated,
            AuditPayload::StockChanged(_) => AuditEventType::StockChanged,
            AuditPayload::CartItemAdded(_) => AuditEventType::CartItemAdded,
            AuditPayload::CartItemFailed(_) => AuditEventType::CartItemFailed,
        }
    }

    pub fn sku(&self) -> SkuId {
        match self {
            AuditPayload::SkuCreated(p) | AuditPayload::StockChanged(p) => p.sku,
            AuditPayload::CartItemAdded(p) => p.sku,
            AuditPayload::CartItemFailed(p) => p.sku,
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAuditEvent")]
pub struct AuditEvent {
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub payload: AuditPayload,
}

impl AuditEvent {
    pub fn new(service: impl Into<String>, payload: AuditPayload) -> Self {
        Self {
            event_type: payload.event_type(),
            service: service.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Bus message key; keeps events for one SKU on one partition.
    pub fn partition_key(&self) -> String {
        self.payload.sku().to_string()
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Deserialize)]
struct RawAuditEvent {
    #[serde(rename = "type")]
    event_type: AuditEventType,
    service: String,
    timestamp: DateTime<Utc>,
    payload: serde_json::Value,
}

impl TryFrom<RawAuditEvent> for AuditEvent {
    type Error = serde_json::Error;

    fn try_from(raw: RawAuditEvent) -> Result<Self, Self::Error> {
        let payload = match raw.event_type {
            AuditEventType::SkuCreated => AuditPayload::SkuCreated(serde_json::from_value(raw.payload)?),
            AuditEventType::StockChanged => {
                AuditPayload::StockChanged(serde_json::from_value(raw.payload)?)
            }
            AuditEventType::CartItemAdded => {
                AuditPayload::CartItemAdded(serde_json::from_value(raw.payload)?)
            }
            AuditEventType::CartItemFailed => {
                AuditPayload::CartItemFailed(serde_json::from_value(raw.payload)?)
            }
        };

        Ok(Self {
            event_type: raw.event_type,
            service: raw.service,
            timestamp: raw.timestamp,
            payload,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
