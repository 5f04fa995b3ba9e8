//! Stock records and the JSON shapes exchanged with the inventory service.

use serde::{Deserialize, Serialize};

use crate::{InventoryError, ProductId};

/// Current stock for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub product_id: ProductId,
    pub stock: u64,
}

impl StockRecord {
    pub fn new(product_id: impl Into<ProductId>, stock: u64) -> Self {
        Self {
            product_id: product_id.into(),
            stock,
        }
    }
}

/// Body of `POST /inventory/decrement` and `POST /inventory/increment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRequest {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// Error body returned by the inventory routes.
///
/// Carries enough structure for [`crate::HttpInventoryClient`] to rebuild
/// the original [`InventoryError`] on the calling side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
}

impl From<&InventoryError> for ErrorBody {
    fn from(err: &InventoryError) -> Self {
        let (requested, available) = match err {
            InventoryError::InsufficientStock {
                requested,
                available,
                ..
            } => (Some(*requested), Some(*available)),
            _ => (None, None),
        };
        Self {
            error: err.to_string(),
            product_id: err.product_id().cloned(),
            requested,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_original_wire_names() {
        let req: InventoryRequest =
            serde_json::from_str(r#"{"productId":"1","quantity":5}"#).unwrap();
        assert_eq!(req.product_id, ProductId::new("1"));
        assert_eq!(req.quantity, 5);
    }

    #[test]
    fn error_body_for_insufficient_stock() {
        let err = InventoryError::InsufficientStock {
            product_id: ProductId::new("2"),
            requested: 25,
            available: 20,
        };
        let body = ErrorBody::from(&err);
        assert_eq!(body.product_id, Some(ProductId::new("2")));
        assert_eq!(body.requested, Some(25));
        assert_eq!(body.available, Some(20));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["productId"], "2");
    }

    #[test]
    fn error_body_omits_absent_fields() {
        let body = ErrorBody::from(&InventoryError::Unavailable("down".into()));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("productId").is_none());
        assert!(json.get("requested").is_none());
    }
}
