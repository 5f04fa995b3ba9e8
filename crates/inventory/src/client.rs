//! HTTP client for a remote inventory service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{ErrorBody, InventoryError, InventoryRequest, InventoryStore, ProductId, Result, StockRecord};

/// [`InventoryStore`] backed by the inventory HTTP routes of another process.
///
/// Transport errors, timeouts, undecodable bodies and unexpected status
/// codes all surface as [`InventoryError::Unavailable`].
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInventoryClient {
    /// Creates a client for the service at `base_url` (e.g. `http://localhost:8082`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InventoryError::Unavailable(format!("failed to build client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// Returns the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn adjust(&self, path: &str, product_id: &ProductId, quantity: u64) -> Result<StockRecord> {
        let url = format!("{}{path}", self.base_url);
        let body = InventoryRequest {
            product_id: product_id.clone(),
            quantity,
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InventoryError::Unavailable(format!("POST {url}: {e}")))?;

        decode_record(resp, product_id, quantity).await
    }
}

async fn decode_record(
    resp: reqwest::Response,
    product_id: &ProductId,
    quantity: u64,
) -> Result<StockRecord> {
    match resp.status() {
        StatusCode::OK => resp
            .json::<StockRecord>()
            .await
            .map_err(|e| InventoryError::Unavailable(format!("invalid stock record: {e}"))),
        StatusCode::NOT_FOUND => Err(InventoryError::ProductNotFound(product_id.clone())),
        StatusCode::CONFLICT => {
            let body = resp.json::<ErrorBody>().await.ok();
            Err(InventoryError::InsufficientStock {
                product_id: product_id.clone(),
                requested: body.as_ref().and_then(|b| b.requested).unwrap_or(quantity),
                available: body.as_ref().and_then(|b| b.available).unwrap_or(0),
            })
        }
        StatusCode::BAD_REQUEST => Err(InventoryError::InvalidQuantity {
            product_id: product_id.clone(),
            quantity,
        }),
        status => Err(InventoryError::Unavailable(format!(
            "inventory service returned {status}"
        ))),
    }
}

#[async_trait]
impl InventoryStore for HttpInventoryClient {
    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn try_decrement(&self, product_id: &ProductId, quantity: u64) -> Result<StockRecord> {
        self.adjust("/inventory/decrement", product_id, quantity).await
    }

    #[tracing::instrument(skip(self), fields(product_id = %product_id))]
    async fn increment(&self, product_id: &ProductId, quantity: u64) -> Result<StockRecord> {
        self.adjust("/inventory/increment", product_id, quantity).await
    }

    async fn get(&self, product_id: &ProductId) -> Result<StockRecord> {
        let url = format!("{}/inventory/{}", self.base_url, product_id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| InventoryError::Unavailable(format!("GET {url}: {e}")))?;

        match resp.status() {
            StatusCode::OK => resp
                .json::<StockRecord>()
                .await
                .map_err(|e| InventoryError::Unavailable(format!("invalid stock record: {e}"))),
            StatusCode::NOT_FOUND => Err(InventoryError::ProductNotFound(product_id.clone())),
            status => Err(InventoryError::Unavailable(format!(
                "inventory service returned {status}"
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<StockRecord>> {
        let url = format!("{}/inventory", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| InventoryError::Unavailable(format!("GET {url}: {e}")))?;

        if !resp.status().is_success() {
            return Err(InventoryError::Unavailable(format!(
                "inventory service returned {}",
                resp.status()
            )));
        }

        resp.json::<Vec<StockRecord>>()
            .await
            .map_err(|e| InventoryError::Unavailable(format!("invalid stock list: {e}")))
    }
}
