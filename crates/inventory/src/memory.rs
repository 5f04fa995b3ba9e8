use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::{InventoryError, InventoryStore, ProductId, Result, StockRecord};

type StockSlot = Arc<Mutex<u64>>;

/// In-memory inventory store with one lock per product record.
///
/// The outer map lock is only held long enough to look up (or insert) a
/// product's slot; the stock check and update happen under that product's
/// own mutex. Clones share the same underlying records.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    slots: Arc<RwLock<HashMap<ProductId, StockSlot>>>,
}

impl InMemoryInventoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the given stock levels.
    pub fn with_stock<I, P>(records: I) -> Self
    where
        I: IntoIterator<Item = (P, u64)>,
        P: Into<ProductId>,
    {
        let slots = records
            .into_iter()
            .map(|(id, stock)| (id.into(), Arc::new(Mutex::new(stock))))
            .collect();
        Self {
            slots: Arc::new(RwLock::new(slots)),
        }
    }

    /// Registers a new product with an initial stock level.
    pub async fn register(&self, product_id: impl Into<ProductId>, stock: u64) -> Result<StockRecord> {
        let product_id = product_id.into();
        let mut slots = self.slots.write().await;
        if slots.contains_key(&product_id) {
            return Err(InventoryError::AlreadyExists(product_id));
        }
        slots.insert(product_id.clone(), Arc::new(Mutex::new(stock)));
        tracing::info!(%product_id, stock, "product registered");
        Ok(StockRecord::new(product_id, stock))
    }

    /// Returns the number of products with a stock record.
    pub async fn product_count(&self) -> usize {
        self.slots.read().await.len()
    }

    async fn slot(&self, product_id: &ProductId) -> Result<StockSlot> {
        self.slots
            .read()
            .await
            .get(product_id)
            .cloned()
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))
    }
}

fn ensure_positive(product_id: &ProductId, quantity: u64) -> Result<()> {
    if quantity == 0 {
        return Err(InventoryError::InvalidQuantity {
            product_id: product_id.clone(),
            quantity,
        });
    }
    Ok(())
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn try_decrement(&self, product_id: &ProductId, quantity: u64) -> Result<StockRecord> {
        ensure_positive(product_id, quantity)?;
        let slot = self.slot(product_id).await?;
        let mut stock = slot.lock().await;

        if *stock < quantity {
            metrics::counter!("inventory_insufficient_stock_total").increment(1);
            tracing::debug!(available = *stock, "decrement refused");
            return Err(InventoryError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: *stock,
            });
        }

        *stock -= quantity;
        metrics::counter!("inventory_decrements_total").increment(1);
        tracing::debug!(remaining = *stock, "stock decremented");
        Ok(StockRecord::new(product_id.clone(), *stock))
    }

    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn increment(&self, product_id: &ProductId, quantity: u64) -> Result<StockRecord> {
        ensure_positive(product_id, quantity)?;
        let slot = self.slot(product_id).await?;
        let mut stock = slot.lock().await;

        *stock = stock
            .checked_add(quantity)
            .ok_or_else(|| InventoryError::Overflow(product_id.clone()))?;
        metrics::counter!("inventory_increments_total").increment(1);
        tracing::debug!(remaining = *stock, "stock incremented");
        Ok(StockRecord::new(product_id.clone(), *stock))
    }

    async fn get(&self, product_id: &ProductId) -> Result<StockRecord> {
        let slot = self.slot(product_id).await?;
        let stock = *slot.lock().await;
        Ok(StockRecord::new(product_id.clone(), stock))
    }

    async fn list(&self) -> Result<Vec<StockRecord>> {
        let slots: Vec<(ProductId, StockSlot)> = self
            .slots
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        let mut records = Vec::with_capacity(slots.len());
        for (product_id, slot) in slots {
            let stock = *slot.lock().await;
            records.push(StockRecord::new(product_id, stock));
        }
        records.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        Ok(records)
    }
}
