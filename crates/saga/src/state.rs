//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of one order placement saga.
///
/// `Reserving(i)` means item `i` of the cart is the next to be decremented.
/// `Compensating(n)` means `n` applied decrements are still to be undone.
///
/// State transitions:
/// ```text
/// NotStarted ──► Reserving(0) ──► Reserving(1) ──► … ──► Confirmed
///                     │                │
///                     └────────────────┴──► Compensating(n) ──► … ──► Compensating(0) ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    #[default]
    NotStarted,

    /// Forward phase; the value is the index of the next cart item.
    Reserving(usize),

    /// Rollback phase; the value is the number of decrements left to undo.
    Compensating(usize),

    /// All decrements applied and the order persisted (terminal state).
    Confirmed,

    /// The saga gave up after compensating (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if the saga may issue another forward decrement.
    pub fn can_reserve(&self) -> bool {
        matches!(self, SagaState::Reserving(_))
    }

    /// Returns true if compensation may begin from this state.
    ///
    /// A failed saga may be compensated again to retry outstanding steps.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaState::Reserving(_) | SagaState::Failed)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Confirmed | SagaState::Failed)
    }

    /// Returns the state name without its counter.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::Reserving(_) => "Reserving",
            SagaState::Compensating(_) => "Compensating",
            SagaState::Confirmed => "Confirmed",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SagaState::Reserving(i) | SagaState::Compensating(i) => {
                write!(f, "{}({i})", self.as_str())
            }
            _ => write!(f, "{}", self.as_str()),
        }
    }
}
