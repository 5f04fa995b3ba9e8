//! Saga error types.

use common::{OrderId, ProductId};
use inventory::InventoryError;
use orders::OrderError;
use thiserror::Error;

use crate::journal::JournalError;
use crate::state::SagaState;

/// Errors returned to the caller of a saga.
///
/// Compensation anomalies never appear here: they are journaled and logged,
/// and the caller receives the failure that triggered the rollback.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The cart has no line items.
    #[error("Cart is empty")]
    EmptyCart,

    /// A line item quantity is zero or negative.
    #[error("Invalid quantity for product {product_id}: {quantity}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// A forward decrement was refused.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u64,
        available: u64,
    },

    /// A forward decrement named an unknown product.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The inventory could not be reached during the forward phase.
    #[error("Inventory communication failure for product {product_id}: {reason}")]
    CommunicationFailure {
        product_id: ProductId,
        reason: String,
    },

    /// The request was cancelled before every item was reserved.
    #[error("Order placement was cancelled")]
    Cancelled,

    /// Any other inventory error.
    #[error("Inventory error: {0}")]
    Inventory(InventoryError),

    /// Order error.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Saga journal error.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// No saga has been journaled for the order.
    #[error("Saga not found for order {0}")]
    SagaNotFound(OrderId),

    /// Saga is in an invalid state for the requested operation.
    #[error("Invalid saga state: expected {expected}, actual {actual}")]
    InvalidState { expected: String, actual: SagaState },

    /// Compensation for the order is already running.
    #[error("Compensation already in progress for order {0}")]
    CompensationInProgress(OrderId),
}

impl SagaError {
    /// Maps a forward-phase inventory failure for `product_id`.
    pub fn from_inventory(product_id: &ProductId, err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientStock {
                product_id,
                requested,
                available,
            } => SagaError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            InventoryError::ProductNotFound(id) => SagaError::ProductNotFound(id),
            InventoryError::Unavailable(reason) => SagaError::CommunicationFailure {
                product_id: product_id.clone(),
                reason,
            },
            other => SagaError::Inventory(other),
        }
    }

    /// Returns the product the failure names, if any.
    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            SagaError::InvalidQuantity { product_id, .. }
            | SagaError::InsufficientStock { product_id, .. }
            | SagaError::CommunicationFailure { product_id, .. } => Some(product_id),
            SagaError::ProductNotFound(id) => Some(id),
            SagaError::Inventory(err) => err.product_id(),
            _ => None,
        }
    }

    /// Returns true if the error was raised before any side effect.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SagaError::EmptyCart | SagaError::InvalidQuantity { .. }
        )
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
