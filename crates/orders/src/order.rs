//! The order record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderError, OrderId, OrderStatus, ProductId, UserId};

/// One cart line: a product and the quantity requested.
///
/// Quantities are signed so that non-positive input can be represented and
/// rejected by validation rather than by deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl LineItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// An order placed by a user.
///
/// Created `Pending` when the saga starts. Apart from the single status
/// transition the record is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    items: Vec<LineItem>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
}

impl Order {
    /// Creates a pending order with a freshly generated ID.
    pub fn pending(user_id: UserId, items: Vec<LineItem>) -> Self {
        Self::pending_with_id(OrderId::new(), user_id, items)
    }

    /// Creates a pending order with a caller-supplied ID.
    pub fn pending_with_id(id: OrderId, user_id: UserId, items: Vec<LineItem>) -> Self {
        Self {
            id,
            user_id,
            items,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            failure_reason: None,
        }
    }

    /// Marks the order as confirmed.
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Confirmed)
    }

    /// Marks the order as failed, recording why.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        self.transition(OrderStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    fn transition(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition() {
            return Err(OrderError::InvalidStatusTransition {
                order_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns why the order failed, if it did.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}
