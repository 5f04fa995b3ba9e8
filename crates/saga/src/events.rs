//! Saga journal events.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use orders::LineItem;
use serde::{Deserialize, Serialize};

/// Facts recorded while an order placement saga runs.
///
/// Replaying a saga's events in order rebuilds its [`crate::SagaInstance`],
/// including the applied log and any compensation anomalies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// Saga execution started.
    SagaStarted(SagaStartedData),

    /// A forward decrement succeeded and was added to the applied log.
    ItemReserved(ItemReservedData),

    /// The forward phase stopped; compensation follows.
    ReservationFailed(ReservationFailedData),

    /// Compensation of the outstanding applied log began.
    CompensationStarted(CompensationStartedData),

    /// A compensating increment succeeded.
    ItemCompensated(ItemCompensatedData),

    /// A compensating increment could not be completed. Stock for the
    /// product is under-counted by `quantity` until an operator intervenes.
    CompensationAnomaly(CompensationAnomalyData),

    /// All decrements applied and the order was persisted as Confirmed.
    OrderConfirmed(OrderConfirmedData),

    /// The saga ended in failure after compensation.
    SagaFailed(SagaFailedData),
}

impl SagaEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::ItemReserved(_) => "ItemReserved",
            SagaEvent::ReservationFailed(_) => "ReservationFailed",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::ItemCompensated(_) => "ItemCompensated",
            SagaEvent::CompensationAnomaly(_) => "CompensationAnomaly",
            SagaEvent::OrderConfirmed(_) => "OrderConfirmed",
            SagaEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

/// Data for SagaStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub started_at: DateTime<Utc>,
}

/// Data for ItemReserved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReservedData {
    /// Applied log sequence number.
    pub sequence: usize,
    pub product_id: ProductId,
    pub quantity: u64,
    /// Stock reported by the inventory after the decrement.
    pub remaining_stock: u64,
}

/// Data for ReservationFailed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationFailedData {
    /// The product whose decrement failed, if the failure was item-specific.
    pub product_id: Option<ProductId>,
    pub error: String,
}

/// Data for CompensationStarted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationStartedData {
    pub reason: String,
    /// Number of applied decrements to undo.
    pub pending: usize,
}

/// Data for ItemCompensated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCompensatedData {
    pub sequence: usize,
    pub product_id: ProductId,
    pub quantity: u64,
    /// Number of increment calls it took.
    pub attempts: usize,
}

/// Data for CompensationAnomaly event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationAnomalyData {
    pub sequence: usize,
    pub product_id: ProductId,
    pub quantity: u64,
    pub attempts: usize,
    pub error: String,
    pub recorded_at: DateTime<Utc>,
}

/// Data for OrderConfirmed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmedData {
    pub confirmed_at: DateTime<Utc>,
}

/// Data for SagaFailed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    pub fn saga_started(order_id: OrderId, user_id: UserId, items: Vec<LineItem>) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            order_id,
            user_id,
            items,
            started_at: Utc::now(),
        })
    }

    pub fn item_reserved(
        sequence: usize,
        product_id: ProductId,
        quantity: u64,
        remaining_stock: u64,
    ) -> Self {
        SagaEvent::ItemReserved(ItemReservedData {
            sequence,
            product_id,
            quantity,
            remaining_stock,
        })
    }

    pub fn reservation_failed(product_id: Option<ProductId>, error: impl Into<String>) -> Self {
        SagaEvent::ReservationFailed(ReservationFailedData {
            product_id,
            error: error.into(),
        })
    }

    pub fn compensation_started(reason: impl Into<String>, pending: usize) -> Self {
        SagaEvent::CompensationStarted(CompensationStartedData {
            reason: reason.into(),
            pending,
        })
    }

    pub fn item_compensated(
        sequence: usize,
        product_id: ProductId,
        quantity: u64,
        attempts: usize,
    ) -> Self {
        SagaEvent::ItemCompensated(ItemCompensatedData {
            sequence,
            product_id,
            quantity,
            attempts,
        })
    }

    pub fn compensation_anomaly(
        sequence: usize,
        product_id: ProductId,
        quantity: u64,
        attempts: usize,
        error: impl Into<String>,
    ) -> Self {
        SagaEvent::CompensationAnomaly(CompensationAnomalyData {
            sequence,
            product_id,
            quantity,
            attempts,
            error: error.into(),
            recorded_at: Utc::now(),
        })
    }

    pub fn order_confirmed() -> Self {
        SagaEvent::OrderConfirmed(OrderConfirmedData {
            confirmed_at: Utc::now(),
        })
    }

    pub fn saga_failed(reason: impl Into<String>) -> Self {
        SagaEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let order_id = OrderId::new();
        let pid = ProductId::new("1");

        assert_eq!(
            SagaEvent::saga_started(order_id, UserId::guest(), vec![]).event_type(),
            "SagaStarted"
        );
        assert_eq!(
            SagaEvent::item_reserved(0, pid.clone(), 5, 5).event_type(),
            "ItemReserved"
        );
        assert_eq!(
            SagaEvent::reservation_failed(Some(pid.clone()), "out of stock").event_type(),
            "ReservationFailed"
        );
        assert_eq!(
            SagaEvent::compensation_started("out of stock", 1).event_type(),
            "CompensationStarted"
        );
        assert_eq!(
            SagaEvent::item_compensated(0, pid.clone(), 5, 1).event_type(),
            "ItemCompensated"
        );
        assert_eq!(
            SagaEvent::compensation_anomaly(0, pid, 5, 4, "timeout").event_type(),
            "CompensationAnomaly"
        );
        assert_eq!(SagaEvent::order_confirmed().event_type(), "OrderConfirmed");
        assert_eq!(SagaEvent::saga_failed("x").event_type(), "SagaFailed");
    }

    #[test]
    fn test_tagged_json_shape() {
        let event = SagaEvent::item_reserved(1, ProductId::new("2"), 3, 17);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "ItemReserved");
        assert_eq!(json["data"]["sequence"], 1);
        assert_eq!(json["data"]["product_id"], "2");
        assert_eq!(json["data"]["remaining_stock"], 17);
    }

    #[test]
    fn test_anomaly_survives_serialization() {
        let event = SagaEvent::compensation_anomaly(2, ProductId::new("7"), 4, 4, "timeout");
        let json = serde_json::to_string(&event).unwrap();
        let back: SagaEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
