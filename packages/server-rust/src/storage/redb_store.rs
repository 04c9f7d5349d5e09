//! [`DurableStore`] implementation backed by `redb`, an embedded transactional key-value
//! store. This is the on-device persistence layer: one file, ACID transactions, no server
//! process.
//!
//! Table layout covers two schemas: `offline_sales` (queue schema
//! v1) and `products`/`inventory`/`customers`/`stores`/`sync_meta`/`sales`/`offline_returns`
//! (catalog schema v4). Values are stored as JSON rather than a binary codec: it keeps the
//! on-disk format debuggable with any `redb` inspection tool, and the dataset sizes here never
//! make that a real cost.
//!
//! `redb` is a synchronous API; every transaction runs inside `spawn_blocking` so callers can
//! `.await` it like any other I/O without stalling the executor.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use till_core::{
    CachedSale, Customer, InventoryRecord, OfflineReturnRecord, Product, Store, SyncMeta,
    QueuedTransaction,
};

use super::DurableStore;

const QUEUE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("offline_sales");
const PRODUCTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("products");
const INVENTORY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("inventory");
const CUSTOMERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("customers");
const STORES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("stores");
const SALES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sales");
const RETURNS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("offline_returns");
const SYNC_META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sync_meta");

fn inventory_key(store_id: &str, product_id: &str) -> String {
    format!("{store_id}\0{product_id}")
}

/// Embedded, file-backed [`DurableStore`].
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Opens (creating if absent) the database file at `path` and ensures every table exists.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        {
            txn.open_table(QUEUE_TABLE)?;
            txn.open_table(PRODUCTS_TABLE)?;
            txn.open_table(INVENTORY_TABLE)?;
            txn.open_table(CUSTOMERS_TABLE)?;
            txn.open_table(STORES_TABLE)?;
            txn.open_table(SALES_TABLE)?;
            txn.open_table(RETURNS_TABLE)?;
            txn.open_table(SYNC_META_TABLE)?;
        }
        txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    async fn write_blocking<F>(&self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&redb::WriteTransaction) -> anyhow::Result<()> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let txn = db.begin_write()?;
            f(&txn)?;
            txn.commit()?;
            Ok(())
        })
        .await?
    }

    async fn read_blocking<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&redb::ReadTransaction) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || -> anyhow::Result<T> {
            let txn = db.begin_read()?;
            f(&txn)
        })
        .await?
    }
}

#[async_trait]
impl DurableStore for RedbStore {
    async fn put_queued_transaction(&self, tx: QueuedTransaction) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(&tx)?;
        self.write_blocking(move |txn| {
            let mut table = txn.open_table(QUEUE_TABLE)?;
            table.insert(tx.local_id.as_str(), bytes.as_slice())?;
            Ok(())
        })
        .await
    }

    async fn get_queued_transaction(
        &self,
        local_id: &str,
    ) -> anyhow::Result<Option<QueuedTransaction>> {
        let local_id = local_id.to_string();
        self.read_blocking(move |txn| {
            let table = txn.open_table(QUEUE_TABLE)?;
            match table.get(local_id.as_str())? {
                Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_queued_transactions(&self) -> anyhow::Result<Vec<QueuedTransaction>> {
        self.read_blocking(|txn| {
            let table = txn.open_table(QUEUE_TABLE)?;
            let mut out = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                out.push(serde_json::from_slice(value.value())?);
            }
            Ok(out)
        })
        .await
    }

    async fn delete_queued_transaction(&self, local_id: &str) -> anyhow::Result<()> {
        let local_id = local_id.to_string();
        self.write_blocking(move |txn| {
            let mut table = txn.open_table(QUEUE_TABLE)?;
            table.remove(local_id.as_str())?;
            Ok(())
        })
        .await
    }

    async fn count_queued_transactions(&self) -> anyhow::Result<usize> {
        self.read_blocking(|txn| {
            let table = txn.open_table(QUEUE_TABLE)?;
            Ok(usize::try_from(table.len()?).unwrap_or(usize::MAX))
        })
        .await
    }

    async fn put_product(&self, product: Product) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(&product)?;
        self.write_blocking(move |txn| {
            let mut table = txn.open_table(PRODUCTS_TABLE)?;
            table.insert(product.id.as_str(), bytes.as_slice())?;
            Ok(())
        })
        .await
    }

    async fn get_product(&self, id: &str) -> anyhow::Result<Option<Product>> {
        let id = id.to_string();
        self.read_blocking(move |txn| {
            let table = txn.open_table(PRODUCTS_TABLE)?;
            match table.get(id.as_str())? {
                Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_products(&self) -> anyhow::Result<Vec<Product>> {
        self.read_blocking(|txn| {
            let table = txn.open_table(PRODUCTS_TABLE)?;
            let mut out = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                out.push(serde_json::from_slice(value.value())?);
            }
            Ok(out)
        })
        .await
    }

    async fn put_inventory(&self, record: InventoryRecord) -> anyhow::Result<()> {
        let key = inventory_key(&record.store_id, &record.product_id);
        let bytes = serde_json::to_vec(&record)?;
        self.write_blocking(move |txn| {
            let mut table = txn.open_table(INVENTORY_TABLE)?;
            table.insert(key.as_str(), bytes.as_slice())?;
            Ok(())
        })
        .await
    }

    async fn get_inventory(
        &self,
        store_id: &str,
        product_id: &str,
    ) -> anyhow::Result<Option<InventoryRecord>> {
        let key = inventory_key(store_id, product_id);
        self.read_blocking(move |txn| {
            let table = txn.open_table(INVENTORY_TABLE)?;
            match table.get(key.as_str())? {
                Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_inventory_for_store(
        &self,
        store_id: &str,
    ) -> anyhow::Result<Vec<InventoryRecord>> {
        let store_id = store_id.to_string();
        self.read_blocking(move |txn| {
            let table = txn.open_table(INVENTORY_TABLE)?;
            let mut out = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let record: InventoryRecord = serde_json::from_slice(value.value())?;
                if record.store_id == store_id {
                    out.push(record);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn put_customer(&self, customer: Customer) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(&customer)?;
        self.write_blocking(move |txn| {
            let mut table = txn.open_table(CUSTOMERS_TABLE)?;
            table.insert(customer.id.as_str(), bytes.as_slice())?;
            Ok(())
        })
        .await
    }

    async fn get_customer(&self, id: &str) -> anyhow::Result<Option<Customer>> {
        let id = id.to_string();
        self.read_blocking(move |txn| {
            let table = txn.open_table(CUSTOMERS_TABLE)?;
            match table.get(id.as_str())? {
                Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put_store(&self, store: Store) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(&store)?;
        self.write_blocking(move |txn| {
            let mut table = txn.open_table(STORES_TABLE)?;
            table.insert(store.id.as_str(), bytes.as_slice())?;
            Ok(())
        })
        .await
    }

    async fn get_store(&self, id: &str) -> anyhow::Result<Option<Store>> {
        let id = id.to_string();
        self.read_blocking(move |txn| {
            let table = txn.open_table(STORES_TABLE)?;
            match table.get(id.as_str())? {
                Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put_sale(&self, sale: CachedSale) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(&sale)?;
        self.write_blocking(move |txn| {
            let mut table = txn.open_table(SALES_TABLE)?;
            table.insert(sale.id.as_str(), bytes.as_slice())?;
            Ok(())
        })
        .await
    }

    async fn get_sale(&self, id: &str) -> anyhow::Result<Option<CachedSale>> {
        let id = id.to_string();
        self.read_blocking(move |txn| {
            let table = txn.open_table(SALES_TABLE)?;
            match table.get(id.as_str())? {
                Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_sales_for_store(&self, store_id: &str) -> anyhow::Result<Vec<CachedSale>> {
        let store_id = store_id.to_string();
        self.read_blocking(move |txn| {
            let table = txn.open_table(SALES_TABLE)?;
            let mut out = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let sale: CachedSale = serde_json::from_slice(value.value())?;
                if sale.store_id == store_id {
                    out.push(sale);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn delete_sale(&self, id: &str) -> anyhow::Result<()> {
        let id = id.to_string();
        self.write_blocking(move |txn| {
            let mut table = txn.open_table(SALES_TABLE)?;
            table.remove(id.as_str())?;
            Ok(())
        })
        .await
    }

    async fn put_return(&self, record: OfflineReturnRecord) -> anyhow::Result<()> {
        let sale_id = record.sale_id.clone();
        self.write_blocking(move |txn| {
            let mut table = txn.open_table(RETURNS_TABLE)?;
            let mut existing: Vec<OfflineReturnRecord> = match table.get(sale_id.as_str())? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => Vec::new(),
            };
            existing.push(record);
            let bytes = serde_json::to_vec(&existing)?;
            table.insert(sale_id.as_str(), bytes.as_slice())?;
            Ok(())
        })
        .await
    }

    async fn list_returns_for_sale(
        &self,
        sale_id: &str,
    ) -> anyhow::Result<Vec<OfflineReturnRecord>> {
        let sale_id = sale_id.to_string();
        self.read_blocking(move |txn| {
            let table = txn.open_table(RETURNS_TABLE)?;
            match table.get(sale_id.as_str())? {
                Some(guard) => Ok(serde_json::from_slice(guard.value())?),
                None => Ok(Vec::new()),
            }
        })
        .await
    }

    async fn get_sync_meta(&self, store_id: &str) -> anyhow::Result<Option<SyncMeta>> {
        let store_id = store_id.to_string();
        self.read_blocking(move |txn| {
            let table = txn.open_table(SYNC_META_TABLE)?;
            match table.get(store_id.as_str())? {
                Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put_sync_meta(&self, store_id: &str, meta: SyncMeta) -> anyhow::Result<()> {
        let store_id = store_id.to_string();
        let bytes = serde_json::to_vec(&meta)?;
        self.write_blocking(move |txn| {
            let mut table = txn.open_table(SYNC_META_TABLE)?;
            table.insert(store_id.as_str(), bytes.as_slice())?;
            Ok(())
        })
        .await
    }
}
