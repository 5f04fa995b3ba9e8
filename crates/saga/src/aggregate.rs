//! Saga instance rebuilt from journal events.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use orders::LineItem;
use serde::Serialize;

use crate::applied_log::{AppliedLog, AppliedStep};
use crate::events::{CompensationAnomalyData, SagaEvent};
use crate::state::SagaState;

/// The state of one order placement saga.
///
/// The coordinator applies each event as it journals it, so the instance it
/// holds in memory and one replayed from the journal are identical.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaInstance {
    order_id: Option<OrderId>,
    user_id: Option<UserId>,
    items: Vec<LineItem>,
    state: SagaState,
    applied_log: AppliedLog,
    /// Every compensation anomaly ever recorded, including ones a later
    /// retry resolved.
    anomalies: Vec<CompensationAnomalyData>,
    failure_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl SagaInstance {
    /// Replays events in order. Returns `None` for an empty history.
    pub fn from_events(events: impl IntoIterator<Item = SagaEvent>) -> Option<Self> {
        let mut events = events.into_iter().peekable();
        events.peek()?;
        let mut saga = Self::default();
        for event in events {
            saga.apply(event);
        }
        Some(saga)
    }

    pub fn apply(&mut self, event: SagaEvent) {
        match event {
            SagaEvent::SagaStarted(data) => {
                self.order_id = Some(data.order_id);
                self.user_id = Some(data.user_id);
                self.items = data.items;
                self.started_at = Some(data.started_at);
                self.state = SagaState::Reserving(0);
            }
            SagaEvent::ItemReserved(data) => {
                self.applied_log.push(data.product_id, data.quantity);
                self.state = SagaState::Reserving(self.applied_log.len());
            }
            SagaEvent::ReservationFailed(data) => {
                self.failure_reason = Some(data.error);
            }
            SagaEvent::CompensationStarted(data) => {
                if self.failure_reason.is_none() {
                    self.failure_reason = Some(data.reason);
                }
                self.state = SagaState::Compensating(data.pending);
            }
            SagaEvent::ItemCompensated(data) => {
                self.applied_log.mark_compensated(data.sequence);
                self.step_compensation();
            }
            SagaEvent::CompensationAnomaly(data) => {
                self.anomalies.push(data);
                self.step_compensation();
            }
            SagaEvent::OrderConfirmed(_) => {
                self.state = SagaState::Confirmed;
            }
            SagaEvent::SagaFailed(data) => {
                self.state = SagaState::Failed;
                self.failure_reason = Some(data.reason);
            }
        }
    }

    fn step_compensation(&mut self) {
        if let SagaState::Compensating(remaining) = self.state {
            self.state = SagaState::Compensating(remaining.saturating_sub(1));
        }
    }
}

// Query methods
impl SagaInstance {
    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Returns the cart the saga was started with.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn applied_log(&self) -> &AppliedLog {
        &self.applied_log
    }

    pub fn anomalies(&self) -> &[CompensationAnomalyData] {
        &self.anomalies
    }

    /// Returns the reason for failure, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Applied decrements that still need a compensating increment,
    /// newest first.
    pub fn outstanding_compensations(&self) -> Vec<AppliedStep> {
        self.applied_log.outstanding().cloned().collect()
    }

    /// Returns true if a failed saga left stock under-counted.
    pub fn has_unresolved_anomalies(&self) -> bool {
        self.state == SagaState::Failed && !self.applied_log.is_fully_compensated()
    }
}
