//! Prometheus metrics endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::SagaJournal;

use crate::state::AppState;

/// State for the metrics route.
#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
    pub app: Arc<AppState>,
}

/// GET /metrics — Prometheus text exposition.
///
/// The journaled anomaly gauge is refreshed from the journal on every scrape.
pub async fn get(State(state): State<MetricsState>) -> impl IntoResponse {
    match state.app.coordinator.journal().anomalies().await {
        Ok(anomalies) => {
            metrics::gauge!("saga_journaled_anomalies").set(anomalies.len() as f64);
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to read anomalies from journal");
        }
    }

    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.handle.render(),
    )
}
