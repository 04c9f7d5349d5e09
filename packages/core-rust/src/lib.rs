//! Till Core -- domain types, pluggable clock, and validation for the offline-first
//! point-of-sale synchronization core.
//!
//! This crate provides the foundation layer shared by the till agent:
//!
//! - **Clock** ([`clock`]): `ClockSource` trait + `SystemClock`/`FixedClock` for deterministic
//!   backoff and freshness testing
//! - **Types** ([`types`]): `QueuedTransaction`, `CachedSale`, `OfflineReturnRecord`, catalog
//!   entities, and `SyncMeta`
//! - **Validation** ([`validation`]): pure request validation ahead of enqueue
//! - **Idempotency** ([`idempotency`]): generation of local ids and idempotency keys
//! - **Errors** ([`errors`]): shared error taxonomy

pub mod clock;
pub mod errors;
pub mod idempotency;
pub mod types;
pub mod validation;

pub use clock::{ClockSource, FixedClock, SystemClock};
pub use errors::CoreError;
pub use idempotency::{generate_idempotency_key, generate_local_id};
pub use types::{
    CachedSale, Customer, InventoryRecord, OfflineReturnRecord, PaymentMethod, Product,
    RefundType, ReturnItemDecision, ReturnType, RestockAction, SaleItem, SaleStatus, Store,
    SwapItem, SyncMeta, QueuedTransaction,
};
pub use validation::{validate_enqueue_request, EnqueueRequest, RequestItem, ValidationResult};
