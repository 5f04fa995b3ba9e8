//! Order placement and saga inspection endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use orders::{LineItem, Order, OrderFilter, OrderId, OrderRepository, OrderStatus, UserId};
use saga::{AppliedStep, CompensationAnomalyData, SagaInstance};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the caller's identity, set by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaStatusResponse {
    pub order_id: OrderId,
    pub state: String,
    pub failure_reason: Option<String>,
    pub applied_log: Vec<AppliedStep>,
    pub outstanding_compensations: Vec<AppliedStep>,
    pub anomalies: Vec<CompensationAnomalyData>,
}

impl SagaStatusResponse {
    fn new(order_id: OrderId, saga: &SagaInstance) -> Self {
        Self {
            order_id,
            state: saga.state().to_string(),
            failure_reason: saga.failure_reason().map(str::to_string),
            applied_log: saga.applied_log().steps().to_vec(),
            outstanding_compensations: saga.outstanding_compensations(),
            anomalies: saga.anomalies().to_vec(),
        }
    }
}

fn user_from_headers(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(UserId::new)
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid order ID '{id}': {e}")))
}

// -- Handlers --

/// POST /orders — place an order for a cart of line items.
///
/// The saga runs on its own task; if this request is dropped the saga stops
/// reserving and compensates whatever it already applied.
#[tracing::instrument(skip(state, headers, items), fields(items = items.len()))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(items): Json<Vec<LineItem>>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let user_id = user_from_headers(&headers).unwrap_or_else(UserId::guest);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let order = state
        .coordinator
        .spawn_create_order(user_id, items, cancel)
        .await
        .map_err(|e| ApiError::Internal(format!("saga task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders — the caller's orders, newest first.
///
/// Without an `X-User-ID` header every order is listed.
#[tracing::instrument(skip(state, headers))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let mut filter = OrderFilter::all();
    if let Some(user_id) = user_from_headers(&headers) {
        filter = filter.for_user(user_id);
    }
    if let Some(ref status) = query.status {
        filter = filter.with_status(OrderStatus::from_str(status).map_err(ApiError::BadRequest)?);
    }

    let orders = state.coordinator.orders().list(filter).await?;
    Ok(Json(orders))
}

/// GET /orders/{id} — load a single order.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .coordinator
        .orders()
        .get(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    Ok(Json(order))
}

/// GET /orders/{id}/saga — saga state rebuilt from the journal.
#[tracing::instrument(skip(state))]
pub async fn saga_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let saga = state
        .coordinator
        .get_saga(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Saga for order {id} not found")))?;
    Ok(Json(SagaStatusResponse::new(order_id, &saga)))
}

/// POST /orders/{id}/saga/compensate — retry outstanding compensations.
///
/// Like order placement, the retry keeps running if the request is dropped.
#[tracing::instrument(skip(state))]
pub async fn compensate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let saga = state
        .coordinator
        .spawn_retry_compensation(order_id)
        .await
        .map_err(|e| ApiError::Internal(format!("compensation task failed: {e}")))??;
    Ok(Json(SagaStatusResponse::new(order_id, &saga)))
}
