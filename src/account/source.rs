use async_trait::async_trait;
use reqwest::header::ACCEPT;
use std::time::Duration;

use super::AccountSnapshot;
use crate::config::Config;
use crate::error::{CostError, Result};

const FETCH_TIMEOUT_SECS: u64 = 15;

/// Source of account snapshots.
///
/// `fetch` never fails: every transport, status or payload problem collapses
/// into `None`, which callers treat as "every field unknown".
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Option<AccountSnapshot>;
}

/// Reads the snapshot from the account info endpoint with a bearer key.
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSnapshotSource {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.endpoint.clone(), config.api_key.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_inner(&self) -> Result<AccountSnapshot> {
        let api_key = self.api_key.as_deref().ok_or(CostError::MissingApiKey)?;

        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| CostError::Request {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CostError::Status(response.status()));
        }

        let body = response.text().await.map_err(|source| CostError::Request {
            endpoint: self.endpoint.clone(),
            source,
        })?;

        AccountSnapshot::from_json(&body)
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Option<AccountSnapshot> {
        match self.fetch_inner().await {
            Ok(snapshot) => Some(snapshot),
            Err(CostError::MissingApiKey) => {
                tracing::debug!("No API key configured, account snapshot unavailable");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Account snapshot unavailable");
                None
            }
        }
    }
}
