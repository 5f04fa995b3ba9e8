use std::sync::Arc;

use async_trait::async_trait;

use crate::{ProductId, Result, StockRecord};

/// Core trait for inventory store implementations.
///
/// Every operation is atomic with respect to a single product: concurrent
/// calls against the same product behave as if executed in some sequential
/// order. No operation spans more than one product.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Subtracts `quantity` from the product's stock if enough is available.
    ///
    /// Fails with `InsufficientStock` (stock unchanged) when `stock < quantity`,
    /// `ProductNotFound` when there is no record, and `InvalidQuantity` when
    /// `quantity` is zero. Returns the updated record on success.
    async fn try_decrement(&self, product_id: &ProductId, quantity: u64) -> Result<StockRecord>;

    /// Adds `quantity` back to the product's stock.
    ///
    /// This is the compensating operation for a successful decrement. The
    /// store does not deduplicate calls: each call adds `quantity` again.
    async fn increment(&self, product_id: &ProductId, quantity: u64) -> Result<StockRecord>;

    /// Returns the current stock record for a product.
    async fn get(&self, product_id: &ProductId) -> Result<StockRecord>;

    /// Returns all stock records ordered by product ID.
    async fn list(&self) -> Result<Vec<StockRecord>>;
}

#[async_trait]
impl<T: InventoryStore + ?Sized> InventoryStore for Arc<T> {
    async fn try_decrement(&self, product_id: &ProductId, quantity: u64) -> Result<StockRecord> {
        (**self).try_decrement(product_id, quantity).await
    }

    async fn increment(&self, product_id: &ProductId, quantity: u64) -> Result<StockRecord> {
        (**self).increment(product_id, quantity).await
    }

    async fn get(&self, product_id: &ProductId) -> Result<StockRecord> {
        (**self).get(product_id).await
    }

    async fn list(&self) -> Result<Vec<StockRecord>> {
        (**self).list().await
    }
}
