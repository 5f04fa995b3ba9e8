//! Test doubles for exercising sagas against misbehaving inventories.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use inventory::{InventoryError, InventoryStore, ProductId, Result, StockRecord};
use tokio_util::sync::CancellationToken;

/// A call observed by [`RecordingInventory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryCall {
    TryDecrement { product_id: ProductId, quantity: u64 },
    Increment { product_id: ProductId, quantity: u64 },
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<InventoryCall>,
    unavailable_decrements: HashSet<ProductId>,
    /// Remaining transient failures per product.
    unavailable_increments: HashMap<ProductId, usize>,
    rejected_increments: HashSet<ProductId>,
    cancel_after_decrement: HashMap<ProductId, CancellationToken>,
}

/// Wraps a store, records every mutating call and injects failures.
///
/// Injected failures are returned without touching the wrapped store.
#[derive(Debug, Clone)]
pub struct RecordingInventory<I> {
    inner: I,
    script: Arc<Mutex<Script>>,
}

impl<I: InventoryStore> RecordingInventory<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// Decrements of `product_id` fail as if the service were unreachable.
    pub fn fail_decrements_for(&self, product_id: impl Into<ProductId>) {
        self.script().unavailable_decrements.insert(product_id.into());
    }

    /// The next `times` increments of `product_id` fail transiently.
    pub fn fail_increments_for(&self, product_id: impl Into<ProductId>, times: usize) {
        self.script()
            .unavailable_increments
            .insert(product_id.into(), times);
    }

    /// Increments of `product_id` fail permanently with `ProductNotFound`.
    pub fn reject_increments_for(&self, product_id: impl Into<ProductId>) {
        self.script().rejected_increments.insert(product_id.into());
    }

    /// Clears every injected increment failure.
    pub fn heal_increments(&self) {
        let mut script = self.script();
        script.unavailable_increments.clear();
        script.rejected_increments.clear();
    }

    /// Cancels `token` right after a successful decrement of `product_id`.
    pub fn cancel_after_decrement_of(
        &self,
        product_id: impl Into<ProductId>,
        token: CancellationToken,
    ) {
        self.script()
            .cancel_after_decrement
            .insert(product_id.into(), token);
    }

    /// Every recorded call in order.
    pub fn calls(&self) -> Vec<InventoryCall> {
        self.script().calls.clone()
    }

    /// Products passed to `increment`, in call order.
    pub fn incremented_products(&self) -> Vec<ProductId> {
        self.script()
            .calls
            .iter()
            .filter_map(|call| match call {
                InventoryCall::Increment { product_id, .. } => Some(product_id.clone()),
                InventoryCall::TryDecrement { .. } => None,
            })
            .collect()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<I: InventoryStore> InventoryStore for RecordingInventory<I> {
    async fn try_decrement(&self, product_id: &ProductId, quantity: u64) -> Result<StockRecord> {
        let unavailable = {
            let mut script = self.script();
            script.calls.push(InventoryCall::TryDecrement {
                product_id: product_id.clone(),
                quantity,
            });
            script.unavailable_decrements.contains(product_id)
        };
        if unavailable {
            return Err(InventoryError::Unavailable(format!(
                "injected failure decrementing {product_id}"
            )));
        }

        let record = self.inner.try_decrement(product_id, quantity).await?;

        if let Some(token) = self.script().cancel_after_decrement.get(product_id) {
            token.cancel();
        }
        Ok(record)
    }

    async fn increment(&self, product_id: &ProductId, quantity: u64) -> Result<StockRecord> {
        {
            let mut script = self.script();
            script.calls.push(InventoryCall::Increment {
                product_id: product_id.clone(),
                quantity,
            });
            if script.rejected_increments.contains(product_id) {
                return Err(InventoryError::ProductNotFound(product_id.clone()));
            }
            if let Some(remaining) = script.unavailable_increments.get_mut(product_id)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(InventoryError::Unavailable(format!(
                    "injected failure incrementing {product_id}"
                )));
            }
        }

        self.inner.increment(product_id, quantity).await
    }

    async fn get(&self, product_id: &ProductId) -> Result<StockRecord> {
        self.inner.get(product_id).await
    }

    async fn list(&self) -> Result<Vec<StockRecord>> {
        self.inner.list().await
    }
}
