//! Order placement saga with inventory compensation.
//!
//! [`SagaCoordinator::create_order`] decrements stock for each cart line in
//! order, keeping an explicit [`AppliedLog`]. On the first failure every
//! applied decrement is undone with a compensating increment, newest first,
//! before the original failure is returned. Compensating increments are
//! retried with exponential backoff; one that still fails is recorded as a
//! compensation anomaly in the [`SagaJournal`] and can be retried later with
//! [`SagaCoordinator::retry_compensation`].

pub mod aggregate;
pub mod applied_log;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod journal;
pub mod retry;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use aggregate::SagaInstance;
pub use applied_log::{AppliedLog, AppliedStep};
pub use coordinator::SagaCoordinator;
pub use error::SagaError;
pub use events::{CompensationAnomalyData, SagaEvent};
pub use journal::{FileSagaJournal, InMemorySagaJournal, JournalEntry, JournalError, SagaJournal};
pub use retry::RetryPolicy;
pub use state::SagaState;
