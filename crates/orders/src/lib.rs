//! Order records for the fulfillment workflow.
//!
//! An [`Order`] starts `Pending` while the saga reserves stock and moves
//! exactly once to `Confirmed` or `Failed`. Only terminal orders are handed
//! to an [`OrderRepository`].

pub mod error;
pub mod order;
pub mod repository;
pub mod status;

pub use common::{OrderId, ProductId, UserId};
pub use error::OrderError;
pub use order::{LineItem, Order};
pub use repository::{InMemoryOrderRepository, OrderFilter, OrderRepository};
pub use status::OrderStatus;
