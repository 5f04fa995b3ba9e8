//! Order error types.

use thiserror::Error;

use crate::{OrderId, OrderStatus};

/// Errors that can occur on orders and the order repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The order is not in a status that allows the transition.
    #[error("Invalid status transition for order {order_id}: {from} -> {to}")]
    InvalidStatusTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Only Confirmed or Failed orders are persisted.
    #[error("Order {0} is still pending and cannot be stored")]
    NotTerminal(OrderId),

    /// An order with this ID is already stored.
    #[error("Order already exists: {0}")]
    AlreadyExists(OrderId),

    /// No order with this ID exists.
    #[error("Order not found: {0}")]
    NotFound(OrderId),
}
