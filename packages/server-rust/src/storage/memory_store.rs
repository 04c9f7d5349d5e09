//! In-memory [`DurableStore`] implementation backed by [`DashMap`].
//!
//! Used both as the deliberate in-memory backend (tests, no `data_dir` configured) and as the
//! queue's fallback when the durable store can't be opened. This implementation has no notion
//! of "denied" -- every operation here always persists for the life of the process. It's
//! `TillAgent::new` that decides, on the denial path, to pair this store with a no-op
//! `CatalogCache` instead of a real one; the queue keeps using this store either way.

use dashmap::DashMap;
use till_core::{
    CachedSale, Customer, InventoryRecord, OfflineReturnRecord, Product, Store, SyncMeta,
    QueuedTransaction,
};

use super::DurableStore;
use async_trait::async_trait;

/// `DashMap`-backed store; every table is an independent concurrent map keyed by its natural
/// primary key (composite keys are joined with `\0`, which never appears in generated ids).
#[derive(Default)]
pub struct MemoryStore {
    queue: DashMap<String, QueuedTransaction>,
    products: DashMap<String, Product>,
    inventory: DashMap<String, InventoryRecord>,
    customers: DashMap<String, Customer>,
    stores: DashMap<String, Store>,
    sales: DashMap<String, CachedSale>,
    returns: DashMap<String, Vec<OfflineReturnRecord>>,
    sync_meta: DashMap<String, SyncMeta>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn inventory_key(store_id: &str, product_id: &str) -> String {
        format!("{store_id}\0{product_id}")
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn put_queued_transaction(&self, tx: QueuedTransaction) -> anyhow::Result<()> {
        self.queue.insert(tx.local_id.clone(), tx);
        Ok(())
    }

    async fn get_queued_transaction(
        &self,
        local_id: &str,
    ) -> anyhow::Result<Option<QueuedTransaction>> {
        Ok(self.queue.get(local_id).map(|r| r.value().clone()))
    }

    async fn list_queued_transactions(&self) -> anyhow::Result<Vec<QueuedTransaction>> {
        Ok(self.queue.iter().map(|r| r.value().clone()).collect())
    }

    async fn delete_queued_transaction(&self, local_id: &str) -> anyhow::Result<()> {
        self.queue.remove(local_id);
        Ok(())
    }

    async fn count_queued_transactions(&self) -> anyhow::Result<usize> {
        Ok(self.queue.len())
    }

    async fn put_product(&self, product: Product) -> anyhow::Result<()> {
        self.products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn get_product(&self, id: &str) -> anyhow::Result<Option<Product>> {
        Ok(self.products.get(id).map(|r| r.value().clone()))
    }

    async fn list_products(&self) -> anyhow::Result<Vec<Product>> {
        Ok(self.products.iter().map(|r| r.value().clone()).collect())
    }

    async fn put_inventory(&self, record: InventoryRecord) -> anyhow::Result<()> {
        let key = Self::inventory_key(&record.store_id, &record.product_id);
        self.inventory.insert(key, record);
        Ok(())
    }

    async fn get_inventory(
        &self,
        store_id: &str,
        product_id: &str,
    ) -> anyhow::Result<Option<InventoryRecord>> {
        let key = Self::inventory_key(store_id, product_id);
        Ok(self.inventory.get(&key).map(|r| r.value().clone()))
    }

    async fn list_inventory_for_store(
        &self,
        store_id: &str,
    ) -> anyhow::Result<Vec<InventoryRecord>> {
        Ok(self
            .inventory
            .iter()
            .filter(|r| r.value().store_id == store_id)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn put_customer(&self, customer: Customer) -> anyhow::Result<()> {
        self.customers.insert(customer.id.clone(), customer);
        Ok(())
    }

    async fn get_customer(&self, id: &str) -> anyhow::Result<Option<Customer>> {
        Ok(self.customers.get(id).map(|r| r.value().clone()))
    }

    async fn put_store(&self, store: Store) -> anyhow::Result<()> {
        self.stores.insert(store.id.clone(), store);
        Ok(())
    }

    async fn get_store(&self, id: &str) -> anyhow::Result<Option<Store>> {
        Ok(self.stores.get(id).map(|r| r.value().clone()))
    }

    async fn put_sale(&self, sale: CachedSale) -> anyhow::Result<()> {
        self.sales.insert(sale.id.clone(), sale);
        Ok(())
    }

    async fn get_sale(&self, id: &str) -> anyhow::Result<Option<CachedSale>> {
        Ok(self.sales.get(id).map(|r| r.value().clone()))
    }

    async fn list_sales_for_store(&self, store_id: &str) -> anyhow::Result<Vec<CachedSale>> {
        Ok(self
            .sales
            .iter()
            .filter(|r| r.value().store_id == store_id)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn delete_sale(&self, id: &str) -> anyhow::Result<()> {
        self.sales.remove(id);
        Ok(())
    }

    async fn put_return(&self, record: OfflineReturnRecord) -> anyhow::Result<()> {
        self.returns
            .entry(record.sale_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn list_returns_for_sale(
        &self,
        sale_id: &str,
    ) -> anyhow::Result<Vec<OfflineReturnRecord>> {
        Ok(self
            .returns
            .get(sale_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn get_sync_meta(&self, store_id: &str) -> anyhow::Result<Option<SyncMeta>> {
        Ok(self.sync_meta.get(store_id).map(|r| *r.value()))
    }

    async fn put_sync_meta(&self, store_id: &str, meta: SyncMeta) -> anyhow::Result<()> {
        self.sync_meta.insert(store_id.to_string(), meta);
        Ok(())
    }
}
