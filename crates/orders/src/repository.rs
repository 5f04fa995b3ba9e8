//! Order persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Order, OrderError, OrderId, OrderStatus, UserId};

/// Criteria for listing orders. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    /// Matches every order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the filter to one user's orders.
    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Restricts the filter to one status.
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    fn matches(&self, order: &Order) -> bool {
        if let Some(ref user_id) = self.user_id
            && order.user_id() != user_id
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status() != status
        {
            return false;
        }
        true
    }
}

/// Storage for terminal orders, keyed by order ID.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores a Confirmed or Failed order. Orders are written once.
    async fn save(&self, order: Order) -> Result<(), OrderError>;

    /// Loads an order by ID.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, OrderError>;

    /// Lists orders matching the filter, newest first.
    async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, OrderError>;
}

/// In-memory order repository. Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: Order) -> Result<(), OrderError> {
        if !order.status().is_terminal() {
            return Err(OrderError::NotTerminal(order.id()));
        }

        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id()) {
            return Err(OrderError::AlreadyExists(order.id()));
        }
        tracing::debug!(order_id = %order.id(), status = %order.status(), "order stored");
        orders.insert(order.id(), order);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, OrderError> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, OrderError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(matching)
    }
}
