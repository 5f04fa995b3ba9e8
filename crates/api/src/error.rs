//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::{ErrorBody, InventoryError};
use orders::{OrderError, ProductId};
use saga::{JournalError, SagaError};
use serde::Serialize;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Saga execution error.
    Saga(SagaError),
    /// Inventory route error.
    Inventory(InventoryError),
    /// Order repository error.
    Order(OrderError),
    /// Internal server error.
    Internal(String),
}

/// JSON body for every non-inventory error.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, product_id) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Saga(err) => {
                let status = saga_status(&err);
                (status, err.to_string(), err.product_id().cloned())
            }
            ApiError::Inventory(err) => {
                // Inventory routes answer with the body the HTTP client decodes
                return (inventory_status(&err), Json(ErrorBody::from(&err))).into_response();
            }
            ApiError::Order(err) => {
                let status = match &err {
                    OrderError::NotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string(), None)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = ErrorResponse {
            error: message,
            product_id,
        };
        (status, Json(body)).into_response()
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::EmptyCart | SagaError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
        SagaError::InsufficientStock { .. } => StatusCode::CONFLICT,
        SagaError::ProductNotFound(_) | SagaError::SagaNotFound(_) => StatusCode::NOT_FOUND,
        SagaError::CommunicationFailure { .. } => StatusCode::BAD_GATEWAY,
        SagaError::Inventory(inner) => match inner {
            InventoryError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            other => inventory_status(other),
        },
        SagaError::InvalidState { .. } | SagaError::CompensationInProgress(_) => {
            StatusCode::CONFLICT
        }
        SagaError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        SagaError::Order(_) | SagaError::Journal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn inventory_status(err: &InventoryError) -> StatusCode {
    match err {
        InventoryError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        InventoryError::InsufficientStock { .. } | InventoryError::AlreadyExists(_) => {
            StatusCode::CONFLICT
        }
        InventoryError::InvalidQuantity { .. } | InventoryError::Overflow(_) => {
            StatusCode::BAD_REQUEST
        }
        InventoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to create inventory client: {0}")]
    Inventory(#[from] InventoryError),

    #[error("failed to open saga journal: {0}")]
    Journal(#[from] JournalError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
