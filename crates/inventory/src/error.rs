use thiserror::Error;

use crate::ProductId;

/// Errors returned by inventory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// No stock record exists for the product.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The conditional decrement was refused; stock is unchanged.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u64,
        available: u64,
    },

    /// Adjustments must be strictly positive.
    #[error("Invalid quantity for product {product_id}: {quantity}")]
    InvalidQuantity { product_id: ProductId, quantity: u64 },

    /// A stock record already exists for the product.
    #[error("Product already registered: {0}")]
    AlreadyExists(ProductId),

    /// Incrementing would overflow the stock counter.
    #[error("Stock overflow for product {0}")]
    Overflow(ProductId),

    /// The inventory service could not be reached or answered unexpectedly.
    #[error("Inventory service unavailable: {0}")]
    Unavailable(String),
}

impl InventoryError {
    /// Returns true if the error may succeed when the call is repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, InventoryError::Unavailable(_))
    }

    /// Returns the product the error refers to, if any.
    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            InventoryError::ProductNotFound(id)
            | InventoryError::AlreadyExists(id)
            | InventoryError::Overflow(id) => Some(id),
            InventoryError::InsufficientStock { product_id, .. }
            | InventoryError::InvalidQuantity { product_id, .. } => Some(product_id),
            InventoryError::Unavailable(_) => None,
        }
    }
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
