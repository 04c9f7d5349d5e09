//! Durable persistence for the till agent.
//!
//! [`DurableStore`] is the single seam every other component writes through. Two
//! implementations exist: [`RedbStore`](redb_store::RedbStore), an embedded transactional
//! database (the production path), and [`MemoryStore`](memory_store::MemoryStore), a
//! `DashMap`-backed fallback used when the configured data directory cannot be opened (the
//! "storage denied" / private-mode analog).

pub mod memory_store;
#[cfg(feature = "redb")]
pub mod redb_store;

use async_trait::async_trait;
use till_core::{
    CachedSale, Customer, InventoryRecord, OfflineReturnRecord, Product, Store, SyncMeta,
    QueuedTransaction,
};

pub use memory_store::MemoryStore;
#[cfg(feature = "redb")]
pub use redb_store::RedbStore;

/// The durable persistence seam. Every mutating call is a single transaction against the
/// backing store; no implementation holds a cursor open across an `.await` of anything else.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn put_queued_transaction(&self, tx: QueuedTransaction) -> anyhow::Result<()>;
    async fn get_queued_transaction(
        &self,
        local_id: &str,
    ) -> anyhow::Result<Option<QueuedTransaction>>;
    async fn list_queued_transactions(&self) -> anyhow::Result<Vec<QueuedTransaction>>;
    async fn delete_queued_transaction(&self, local_id: &str) -> anyhow::Result<()>;
    async fn count_queued_transactions(&self) -> anyhow::Result<usize>;

    async fn put_product(&self, product: Product) -> anyhow::Result<()>;
    async fn get_product(&self, id: &str) -> anyhow::Result<Option<Product>>;
    async fn list_products(&self) -> anyhow::Result<Vec<Product>>;

    async fn put_inventory(&self, record: InventoryRecord) -> anyhow::Result<()>;
    async fn get_inventory(
        &self,
        store_id: &str,
        product_id: &str,
    ) -> anyhow::Result<Option<InventoryRecord>>;
    async fn list_inventory_for_store(&self, store_id: &str)
        -> anyhow::Result<Vec<InventoryRecord>>;

    async fn put_customer(&self, customer: Customer) -> anyhow::Result<()>;
    async fn get_customer(&self, id: &str) -> anyhow::Result<Option<Customer>>;

    async fn put_store(&self, store: Store) -> anyhow::Result<()>;
    async fn get_store(&self, id: &str) -> anyhow::Result<Option<Store>>;

    async fn put_sale(&self, sale: CachedSale) -> anyhow::Result<()>;
    async fn get_sale(&self, id: &str) -> anyhow::Result<Option<CachedSale>>;
    async fn list_sales_for_store(&self, store_id: &str) -> anyhow::Result<Vec<CachedSale>>;
    async fn delete_sale(&self, id: &str) -> anyhow::Result<()>;

    async fn put_return(&self, record: OfflineReturnRecord) -> anyhow::Result<()>;
    async fn list_returns_for_sale(
        &self,
        sale_id: &str,
    ) -> anyhow::Result<Vec<OfflineReturnRecord>>;

    async fn get_sync_meta(&self, store_id: &str) -> anyhow::Result<Option<SyncMeta>>;
    async fn put_sync_meta(&self, store_id: &str, meta: SyncMeta) -> anyhow::Result<()>;
}
