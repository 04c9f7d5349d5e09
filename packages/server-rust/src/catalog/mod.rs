//! The local catalog & sale cache.
//!
//! Holds products, inventory, customers, stores, and prior sales, plus the rolling-window
//! eviction and freshness bookkeeping that make offline returns and searches possible.

use std::sync::Arc;

use till_core::{
    CachedSale, Customer, InventoryRecord, OfflineReturnRecord, Product, Store, SyncMeta,
};

use crate::storage::DurableStore;

/// Per-store cap on cached sales; the oldest (by `occurred_at`) are evicted beyond this.
pub const ROLLING_SALE_WINDOW: usize = 10_000;

/// A catalog snapshot older than this is considered stale.
pub const FRESHNESS_THRESHOLD_MILLIS: i64 = 60 * 60 * 1_000;

/// The local catalog & sale cache. `store` is `None` when the agent's durable store could not
/// be opened and only the in-memory queue fallback is available -- in that degraded mode every
/// read returns nothing and every write is a no-op rather than silently caching into a store
/// that will vanish on restart anyway.
pub struct CatalogCache {
    store: Option<Arc<dyn DurableStore>>,
}

impl CatalogCache {
    #[must_use]
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A catalog cache with no backing store: every operation is a no-op. Selected instead of
    /// [`CatalogCache::new`] when the durable store could not be opened.
    #[must_use]
    pub fn noop() -> Self {
        Self { store: None }
    }

    pub async fn upsert_product(&self, product: Product) -> anyhow::Result<()> {
        let Some(store) = &self.store else { return Ok(()) };
        store.put_product(product).await
    }

    pub async fn get_product(&self, id: &str) -> anyhow::Result<Option<Product>> {
        let Some(store) = &self.store else { return Ok(None) };
        store.get_product(id).await
    }

    pub async fn upsert_customer(&self, customer: Customer) -> anyhow::Result<()> {
        let Some(store) = &self.store else { return Ok(()) };
        store.put_customer(customer).await
    }

    pub async fn get_customer(&self, id: &str) -> anyhow::Result<Option<Customer>> {
        let Some(store) = &self.store else { return Ok(None) };
        store.get_customer(id).await
    }

    pub async fn upsert_store(&self, store_record: Store) -> anyhow::Result<()> {
        let Some(store) = &self.store else { return Ok(()) };
        store.put_store(store_record).await
    }

    pub async fn get_store(&self, id: &str) -> anyhow::Result<Option<Store>> {
        let Some(store) = &self.store else { return Ok(None) };
        store.get_store(id).await
    }

    pub async fn get_inventory(
        &self,
        store_id: &str,
        product_id: &str,
    ) -> anyhow::Result<Option<InventoryRecord>> {
        let Some(store) = &self.store else { return Ok(None) };
        store.get_inventory(store_id, product_id).await
    }

    /// Cursor-driven local product search: case-insensitive on `name`, case-sensitive on
    /// `barcode`, stopping as soon as `limit` matches are found. Avoids a full scan on large
    /// catalogs when the limit is reached early.
    pub async fn search_products_locally(
        &self,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Product>> {
        let Some(store) = &self.store else { return Ok(Vec::new()) };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query_lower = query.to_lowercase();
        let all = store.list_products().await?;
        let mut results = Vec::with_capacity(limit.min(all.len()));

        for product in all {
            if results.len() >= limit {
                break;
            }
            let name_match = product.name.to_lowercase().contains(&query_lower);
            let barcode_match = product
                .barcode
                .as_deref()
                .is_some_and(|barcode| barcode.contains(query));
            if name_match || barcode_match {
                results.push(product);
            }
        }

        Ok(results)
    }

    /// Records a completed (or pending) sale and prunes the store's rolling window.
    pub async fn record_sale(&self, sale: CachedSale) -> anyhow::Result<()> {
        let Some(store) = &self.store else { return Ok(()) };
        let store_id = sale.store_id.clone();
        store.put_sale(sale).await?;
        self.prune_sales_for_store(&store_id).await
    }

    /// Imports a batch of sales (e.g. from a server snapshot) and prunes afterward.
    pub async fn import_sales(&self, sales: Vec<CachedSale>) -> anyhow::Result<()> {
        let Some(store) = &self.store else { return Ok(()) };
        let mut touched_stores = std::collections::HashSet::new();
        for sale in sales {
            touched_stores.insert(sale.store_id.clone());
            store.put_sale(sale).await?;
        }
        for store_id in touched_stores {
            self.prune_sales_for_store(&store_id).await?;
        }
        Ok(())
    }

    /// Evicts the oldest cached sales for `store_id` beyond [`ROLLING_SALE_WINDOW`].
    async fn prune_sales_for_store(&self, store_id: &str) -> anyhow::Result<()> {
        let Some(store) = &self.store else { return Ok(()) };
        let mut sales = store.list_sales_for_store(store_id).await?;
        if sales.len() <= ROLLING_SALE_WINDOW {
            return Ok(());
        }

        sales.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        for sale in sales.into_iter().skip(ROLLING_SALE_WINDOW) {
            store.delete_sale(&sale.id).await?;
        }
        Ok(())
    }

    pub async fn get_sale(&self, id: &str) -> anyhow::Result<Option<CachedSale>> {
        let Some(store) = &self.store else { return Ok(None) };
        store.get_sale(id).await
    }

    pub async fn list_sales_for_store(&self, store_id: &str) -> anyhow::Result<Vec<CachedSale>> {
        let Some(store) = &self.store else { return Ok(Vec::new()) };
        store.list_sales_for_store(store_id).await
    }

    pub async fn record_return(&self, record: OfflineReturnRecord) -> anyhow::Result<()> {
        let Some(store) = &self.store else { return Ok(()) };
        store.put_return(record).await
    }

    pub async fn list_returns_for_sale(
        &self,
        sale_id: &str,
    ) -> anyhow::Result<Vec<OfflineReturnRecord>> {
        let Some(store) = &self.store else { return Ok(Vec::new()) };
        store.list_returns_for_sale(sale_id).await
    }

    /// Stale if `now - lastSyncAt > 1h`, or if no sync meta is recorded at all. A no-op cache
    /// has no meta, so it reports stale unconditionally.
    pub async fn is_stale(&self, store_id: &str, now: i64) -> anyhow::Result<bool> {
        let Some(store) = &self.store else { return Ok(true) };
        let meta = store
            .get_sync_meta(store_id)
            .await?
            .unwrap_or_else(SyncMeta::absent);
        Ok(now - meta.last_sync_at > FRESHNESS_THRESHOLD_MILLIS)
    }

    pub async fn mark_synced(&self, store_id: &str, now: i64, product_count: u64) -> anyhow::Result<()> {
        let Some(store) = &self.store else { return Ok(()) };
        store
            .put_sync_meta(
                store_id,
                SyncMeta {
                    last_sync_at: now,
                    product_count,
                },
            )
            .await
    }

    /// Applies an optimistic local inventory adjustment; never lets quantity go negative.
    /// Authoritative stock is restored on the next catalog sync. A no-op cache always reports
    /// the adjustment as if applied against a zero baseline, since nothing is persisted.
    pub async fn update_local_inventory(
        &self,
        store_id: &str,
        product_id: &str,
        delta: i64,
        now: i64,
    ) -> anyhow::Result<InventoryRecord> {
        let Some(store) = &self.store else {
            return Ok(InventoryRecord {
                store_id: store_id.to_string(),
                product_id: product_id.to_string(),
                quantity: clamp_quantity(0, delta),
                updated_at: now,
            });
        };
        let current = store
            .get_inventory(store_id, product_id)
            .await?
            .map(|r| r.quantity)
            .unwrap_or(0);

        let record = InventoryRecord {
            store_id: store_id.to_string(),
            product_id: product_id.to_string(),
            quantity: clamp_quantity(current, delta),
            updated_at: now,
        };
        store.put_inventory(record.clone()).await?;
        Ok(record)
    }
}

/// Applies `delta` to `current`, never letting the result go below zero.
fn clamp_quantity(current: i64, delta: i64) -> i64 {
    current.saturating_add(delta).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn cache() -> CatalogCache {
        CatalogCache::new(Arc::new(MemoryStore::new()))
    }

    fn product(id: &str, name: &str, barcode: &str) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            barcode: Some(barcode.to_string()),
            price: 1.0,
            category: None,
        }
    }

    fn sale(id: &str, store_id: &str, occurred_at: i64) -> CachedSale {
        CachedSale {
            id: id.to_string(),
            receipt_number: None,
            idempotency_key: format!("idem-{id}"),
            store_id: store_id.to_string(),
            subtotal: 0.0,
            discount: 0.0,
            tax: 0.0,
            total: 0.0,
            payment_method: "cash".to_string(),
            status: till_core::SaleStatus::Completed,
            items: vec![],
            occurred_at,
            is_offline: false,
            synced_at: None,
            server_id: None,
        }
    }

    // S5: local search.
    #[tokio::test]
    async fn search_matches_name_case_insensitively() {
        let cache = cache();
        cache
            .upsert_product(product("p1", "Coca-Cola 500ml", "1234567890"))
            .await
            .unwrap();

        let results = cache.search_products_locally("coca", 20).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "p1");
    }

    #[tokio::test]
    async fn search_matches_barcode_case_sensitively() {
        let cache = cache();
        cache
            .upsert_product(product("p1", "Coca-Cola 500ml", "1234567890"))
            .await
            .unwrap();

        let results = cache.search_products_locally("7890", 20).await.unwrap();
        assert_eq!(results.len(), 1);

        let none = cache.search_products_locally("ABCDEF", 20).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn search_returns_empty_for_no_match() {
        let cache = cache();
        cache
            .upsert_product(product("p1", "Coca-Cola 500ml", "1234567890"))
            .await
            .unwrap();

        let results = cache.search_products_locally("pepsi", 20).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let cache = cache();
        for i in 0..10 {
            cache
                .upsert_product(product(&format!("p{i}"), "Widget", &format!("BC{i}")))
                .await
                .unwrap();
        }

        let results = cache.search_products_locally("widget", 3).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn search_with_zero_limit_returns_nothing() {
        let cache = cache();
        cache
            .upsert_product(product("p1", "Widget", "BC1"))
            .await
            .unwrap();
        assert!(cache
            .search_products_locally("widget", 0)
            .await
            .unwrap()
            .is_empty());
    }

    // S6: rolling window eviction.
    #[tokio::test]
    async fn rolling_window_evicts_oldest_beyond_cap() {
        let cache = cache();
        for i in 0..(ROLLING_SALE_WINDOW + 5) {
            cache
                .record_sale(sale(&format!("s{i}"), "s1", i as i64))
                .await
                .unwrap();
        }

        let remaining = cache.list_sales_for_store("s1").await.unwrap();
        assert_eq!(remaining.len(), ROLLING_SALE_WINDOW);

        // The 5 oldest (occurred_at 0..5) should be gone.
        for i in 0..5 {
            assert!(cache.get_sale(&format!("s{i}")).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn rolling_window_does_not_evict_below_cap() {
        let cache = cache();
        for i in 0..10 {
            cache
                .record_sale(sale(&format!("s{i}"), "s1", i as i64))
                .await
                .unwrap();
        }
        assert_eq!(cache.list_sales_for_store("s1").await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn rolling_window_scoped_per_store() {
        let cache = cache();
        for i in 0..(ROLLING_SALE_WINDOW + 2) {
            cache
                .record_sale(sale(&format!("a{i}"), "store-a", i as i64))
                .await
                .unwrap();
        }
        cache
            .record_sale(sale("b1", "store-b", 0))
            .await
            .unwrap();

        assert_eq!(
            cache.list_sales_for_store("store-a").await.unwrap().len(),
            ROLLING_SALE_WINDOW
        );
        assert_eq!(cache.list_sales_for_store("store-b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn freshness_is_stale_when_no_meta_recorded() {
        let cache = cache();
        assert!(cache.is_stale("st1", 10_000_000).await.unwrap());
    }

    #[tokio::test]
    async fn freshness_is_fresh_within_one_hour() {
        let cache = cache();
        cache.mark_synced("st1", 0, 100).await.unwrap();
        assert!(!cache.is_stale("st1", FRESHNESS_THRESHOLD_MILLIS).await.unwrap());
    }

    #[tokio::test]
    async fn freshness_is_stale_just_past_one_hour() {
        let cache = cache();
        cache.mark_synced("st1", 0, 100).await.unwrap();
        assert!(cache
            .is_stale("st1", FRESHNESS_THRESHOLD_MILLIS + 1)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn local_inventory_adjustment_applies_delta() {
        let cache = cache();
        cache
            .update_local_inventory("st1", "p1", 10, 0)
            .await
            .unwrap();
        let record = cache.update_local_inventory("st1", "p1", -3, 1).await.unwrap();
        assert_eq!(record.quantity, 7);
    }

    #[tokio::test]
    async fn local_inventory_adjustment_never_goes_negative() {
        let cache = cache();
        cache.update_local_inventory("st1", "p1", 2, 0).await.unwrap();
        let record = cache.update_local_inventory("st1", "p1", -10, 1).await.unwrap();
        assert_eq!(record.quantity, 0);
    }

    #[tokio::test]
    async fn noop_cache_writes_succeed_without_persisting() {
        let cache = CatalogCache::noop();
        cache
            .upsert_product(product("p1", "Widget", "BC1"))
            .await
            .unwrap();
        assert!(cache.get_product("p1").await.unwrap().is_none());
        assert!(cache.search_products_locally("widget", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn noop_cache_is_always_stale() {
        let cache = CatalogCache::noop();
        assert!(cache.is_stale("st1", 0).await.unwrap());
        cache.mark_synced("st1", 0, 100).await.unwrap();
        assert!(cache.is_stale("st1", 0).await.unwrap());
    }
}
