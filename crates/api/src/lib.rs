//! HTTP order service with observability.
//!
//! Exposes order placement backed by the saga coordinator, saga inspection
//! and compensation retry, and (when the inventory runs in-process) the
//! inventory routes. Structured logging uses tracing; metrics are exported
//! in Prometheus format.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use inventory::InMemoryInventoryStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use routes::metrics::MetricsState;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(MetricsState {
            handle: metrics_handle,
            app: Arc::clone(&state),
        });

    let mut app = Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create).get(routes::orders::list))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/saga", get(routes::orders::saga_status))
        .route(
            "/orders/{id}/saga/compensate",
            post(routes::orders::compensate),
        )
        .with_state(Arc::clone(&state))
        .merge(metrics_router);

    if let Some(ref store) = state.local_inventory {
        app = app.merge(inventory_router(store.clone()));
    }

    app.layer(TraceLayer::new_for_http())
}

/// Routes of the standalone inventory service.
pub fn inventory_router(store: InMemoryInventoryStore) -> Router {
    Router::new()
        .route("/inventory", get(routes::inventory::list))
        .route("/inventory/decrement", post(routes::inventory::decrement))
        .route("/inventory/increment", post(routes::inventory::increment))
        .route("/inventory/{product_id}", get(routes::inventory::get))
        .with_state(store)
}
