//! Inventory service endpoints.
//!
//! Mounted only when this process owns the inventory. Another order service
//! can point `INVENTORY_SERVICE_URL` here and reach the same store through
//! [`inventory::HttpInventoryClient`].

use axum::Json;
use axum::extract::{Path, State};
use inventory::{InMemoryInventoryStore, InventoryRequest, InventoryStore, ProductId, StockRecord};

use crate::error::ApiError;

/// POST /inventory/decrement — conditional decrement.
#[tracing::instrument(skip(store))]
pub async fn decrement(
    State(store): State<InMemoryInventoryStore>,
    Json(req): Json<InventoryRequest>,
) -> Result<Json<StockRecord>, ApiError> {
    let record = store.try_decrement(&req.product_id, req.quantity).await?;
    Ok(Json(record))
}

/// POST /inventory/increment — compensating increment.
#[tracing::instrument(skip(store))]
pub async fn increment(
    State(store): State<InMemoryInventoryStore>,
    Json(req): Json<InventoryRequest>,
) -> Result<Json<StockRecord>, ApiError> {
    let record = store.increment(&req.product_id, req.quantity).await?;
    Ok(Json(record))
}

/// GET /inventory — every stock record.
pub async fn list(
    State(store): State<InMemoryInventoryStore>,
) -> Result<Json<Vec<StockRecord>>, ApiError> {
    Ok(Json(store.list().await?))
}

/// GET /inventory/{productId} — one stock record.
#[tracing::instrument(skip(store))]
pub async fn get(
    State(store): State<InMemoryInventoryStore>,
    Path(product_id): Path<String>,
) -> Result<Json<StockRecord>, ApiError> {
    let record = store.get(&ProductId::new(product_id)).await?;
    Ok(Json(record))
}
