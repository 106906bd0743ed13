//! Shared JSON client for collaborator services
//!
//! Every collaborator speaks JSON over HTTP. Transport failures become
//! `UpstreamUnavailable`; the reply status is handed back to the caller,
//! which decides what a non-2xx answer means for its own contract.

use crate::error::OrchestrationError;
use crate::Result;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Ordinary request timeout for collaborators without a dedicated one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A decoded reply. Bodies that are not JSON are kept as a JSON string.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamReply {
    /// Return the body for 2xx replies, otherwise an `UpstreamUnavailable`.
    pub fn into_success(self, what: &str) -> Result<Value> {
        if self.status.is_success() {
            Ok(self.body)
        } else {
            Err(OrchestrationError::UpstreamUnavailable(format!(
                "{} returned {}: {}",
                what, self.status, self.body
            )))
        }
    }
}

#[derive(Clone)]
pub struct JsonClient {
    client: Client,
    base_url: String,
}

impl JsonClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                OrchestrationError::Internal(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<UpstreamReply> {
        let request = self.client.get(self.url(path)).query(query);
        Self::send(request, path).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<UpstreamReply> {
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        Self::send(request, path).await
    }

    async fn send(request: reqwest::RequestBuilder, path: &str) -> Result<UpstreamReply> {
        let response = request.send().await.map_err(|e| {
            OrchestrationError::UpstreamUnavailable(format!("Request to {} failed: {}", path, e))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            OrchestrationError::UpstreamUnavailable(format!(
                "Failed to read response from {}: {}",
                path, e
            ))
        })?;

        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(UpstreamReply { status, body })
    }
}
