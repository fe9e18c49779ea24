//! Read-only gateway to the orchestrator's live compute-unit inventory.
//!
//! The gateway is deliberately fallible: when the orchestrator cannot be
//! reached or answers with something we cannot parse, the query returns
//! [`InventoryError::Unavailable`] instead of an empty set. An empty set on
//! failure would make every live record look like a ghost, so the distinction
//! is load-bearing for the reclamation core.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by inventory queries.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The orchestrator could not be reached, timed out, or returned a
    /// malformed response. The caller must not treat this as "no units".
    #[error("orchestrator inventory unavailable: {reason}")]
    Unavailable { reason: String },
}

impl InventoryError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        InventoryError::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Read-only, side-effect-free query against the orchestrator.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Snapshot of the unit ids that currently, actually exist.
    async fn list_existing_unit_ids(&self) -> Result<HashSet<String>, InventoryError>;
}

/// Inventory gateway backed by the orchestrator's HTTP API.
///
/// Queries `GET {base_url}/v1/units`, which returns a JSON array of unit id
/// strings. Every failure mode (connect error, non-2xx status, timeout,
/// decode failure) maps to [`InventoryError::Unavailable`].
pub struct HttpInventoryGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInventoryGateway {
    /// Create a gateway with a bounded per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InventoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InventoryError::unavailable(format!("failed to build client: {e}")))?;

        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl InventoryGateway for HttpInventoryGateway {
    async fn list_existing_unit_ids(&self) -> Result<HashSet<String>, InventoryError> {
        let url = format!("{}/v1/units", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| InventoryError::unavailable(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(InventoryError::unavailable(format!(
                "{url} returned status {}",
                response.status()
            )));
        }

        let unit_ids: Vec<String> = response.json().await.map_err(|e| {
            InventoryError::unavailable(format!("malformed inventory response from {url}: {e}"))
        })?;

        Ok(unit_ids.into_iter().collect())
    }
}

/// Fixed in-memory inventory for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    unit_ids: HashSet<String>,
}

impl StaticInventory {
    pub fn new(unit_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            unit_ids: unit_ids.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl InventoryGateway for StaticInventory {
    async fn list_existing_unit_ids(&self) -> Result<HashSet<String>, InventoryError> {
        Ok(self.unit_ids.clone())
    }
}
