//! Inventory store for the order fulfillment workflow.
//!
//! Stock counts are only ever changed through two single-item operations:
//! a conditional decrement that refuses to drive stock negative, and a
//! compensating increment. Both are atomic per product; operations on
//! different products proceed concurrently.
//!
//! Two implementations of [`InventoryStore`] are provided:
//! - [`InMemoryInventoryStore`], the authoritative in-process store
//! - [`HttpInventoryClient`], which talks to a remote inventory service

pub mod client;
pub mod error;
pub mod memory;
pub mod record;
pub mod store;

pub use client::HttpInventoryClient;
pub use common::ProductId;
pub use error::{InventoryError, Result};
pub use memory::InMemoryInventoryStore;
pub use record::{ErrorBody, InventoryRequest, StockRecord};
pub use store::InventoryStore;
