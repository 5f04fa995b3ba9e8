//! Identifiers shared by the inventory, order and saga crates.

pub mod types;

pub use types::{OrderId, ProductId, UserId};
