//! Domain types shared by the offline queue, catalog cache, and sync engine.
//!
//! Every timestamp field is epoch milliseconds (see [`crate::clock`]). Structs use
//! `#[serde(rename_all = "camelCase")]` so the wire shape matches the server API and the
//! embedding application's existing JSON conventions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single record in the durable outbound queue.
///
/// `local_id` is generated once at enqueue time and never reused; `idempotency_key` is what
/// the server dedupes on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTransaction {
    pub local_id: String,
    pub idempotency_key: String,
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub payload: serde_json::Value,
    pub created_at: i64,
    pub attempts: u32,
    pub next_attempt_at: i64,
    pub last_error: Option<String>,
}

impl QueuedTransaction {
    /// Builds a fresh record ready for its first attempt.
    #[must_use]
    pub fn new(
        local_id: String,
        idempotency_key: String,
        url: String,
        method: String,
        headers: HashMap<String, String>,
        payload: serde_json::Value,
        now: i64,
    ) -> Self {
        Self {
            local_id,
            idempotency_key,
            url,
            method,
            headers,
            payload,
            created_at: now,
            attempts: 0,
            next_attempt_at: now,
            last_error: None,
        }
    }

    /// Whether this record has crossed the escalation threshold.
    #[must_use]
    pub fn is_escalated(&self, threshold: u32) -> bool {
        self.attempts >= threshold
    }
}

/// Payment method recorded against a sale. Kept as an open string rather than an enum: the
/// set of accepted payment methods is a server/store configuration concern, not a core invariant.
pub type PaymentMethod = String;

/// Lifecycle state of a cached sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Completed,
    Returned,
    PendingSync,
}

/// One line item within a [`CachedSale`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub quantity_returned: u32,
    pub unit_price: f64,
    pub line_total: f64,
}

impl SaleItem {
    /// Whether every unit of this line has been returned.
    #[must_use]
    pub fn is_fully_returned(&self) -> bool {
        self.quantity_returned >= self.quantity
    }
}

/// A locally cached record of a completed (or pending) sale, used both as a receipt-lookup
/// cache and as the basis for return/swap validation while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSale {
    pub id: String,
    pub receipt_number: Option<String>,
    pub idempotency_key: String,
    pub store_id: String,
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub total: f64,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub items: Vec<SaleItem>,
    pub occurred_at: i64,
    pub is_offline: bool,
    pub synced_at: Option<i64>,
    pub server_id: Option<String>,
}

impl CachedSale {
    /// Recomputes `status` from the current per-item `quantity_returned` values.
    ///
    /// A sale is `Returned` iff every item is fully returned; otherwise it keeps its prior
    /// status (a partially-returned sale remains `Completed`/`PendingSync`).
    pub fn recompute_status(&mut self) {
        if !self.items.is_empty() && self.items.iter().all(SaleItem::is_fully_returned) {
            self.status = SaleStatus::Returned;
        }
    }
}

/// How a returned unit is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestockAction {
    Restock,
    Discard,
}

/// How a refund is issued for a returned unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundType {
    None,
    Full,
    Partial,
}

/// Whether an offline return record represents a plain return or a return-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnType {
    Return,
    Swap,
}

/// Per-item decision recorded for one returned line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnItemDecision {
    pub product_id: String,
    pub quantity: u32,
    pub restock_action: RestockAction,
    pub refund_type: RefundType,
    pub refund_amount: f64,
}

/// A replacement item taken in exchange during a swap. There is exactly one shape for this;
/// it is not duplicated under multiple field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapItem {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: f64,
}

/// A return or swap authored while offline, pending sync to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineReturnRecord {
    pub id: String,
    pub sale_id: String,
    pub store_id: String,
    #[serde(rename = "type")]
    pub return_type: ReturnType,
    pub items: Vec<ReturnItemDecision>,
    pub swap_items: Vec<SwapItem>,
    pub idempotency_key: String,
    pub created_at: i64,
    pub potential_loss: f64,
    pub synced_at: Option<i64>,
}

impl OfflineReturnRecord {
    /// Whether this record has been synced and is eligible for cleanup.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.synced_at.is_some()
    }
}

/// A product in the local catalog cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub barcode: Option<String>,
    pub price: f64,
    pub category: Option<String>,
}

/// Inventory level for one product at one store, keyed by `(store_id, product_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub store_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub updated_at: i64,
}

/// A customer record used for loyalty lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub loyalty_points: i64,
    pub updated_at: i64,
}

/// Store-level configuration cached for offline use (currency, tax rate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub tax_rate: f64,
    pub updated_at: i64,
}

/// Per-store catalog freshness bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    pub last_sync_at: i64,
    pub product_count: u64,
}

impl SyncMeta {
    /// A store with no recorded sync is always stale.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            last_sync_at: 0,
            product_count: 0,
        }
    }
}
