//! Client for a retriever service running in another process

use super::{DocumentIndex, IndexStats};
use crate::error::{ErrorKind, OrchestrationError};
use crate::http::{JsonClient, UpstreamReply, DEFAULT_TIMEOUT};
use crate::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

pub struct RemoteRetriever {
    http: JsonClient,
}

impl RemoteRetriever {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(base_url, DEFAULT_TIMEOUT)?,
        })
    }
}

/// Map a retriever error reply back onto the local taxonomy.
///
/// Replies without a `code` come from older retrievers whose only 400 on
/// `/query` is the empty-index case. `detail` holds the unprefixed message.
fn reply_error(reply: UpstreamReply, path: &str) -> OrchestrationError {
    let message = reply
        .body
        .get("detail")
        .or_else(|| reply.body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| reply.body.to_string());

    let kind = reply
        .body
        .get("code")
        .and_then(Value::as_str)
        .and_then(ErrorKind::from_code);

    match (kind, reply.status) {
        (Some(ErrorKind::EmptyIndex), _) => OrchestrationError::EmptyIndex,
        (None, StatusCode::BAD_REQUEST) if path == "/query" => OrchestrationError::EmptyIndex,
        (Some(ErrorKind::Validation), _) | (None, StatusCode::BAD_REQUEST) => {
            OrchestrationError::Validation(message)
        }
        _ => OrchestrationError::UpstreamUnavailable(format!(
            "retriever {} returned {}: {}",
            path, reply.status, message
        )),
    }
}

fn invalid(path: &str, body: &Value) -> OrchestrationError {
    OrchestrationError::UpstreamUnavailable(format!(
        "retriever {} sent an unexpected body: {}",
        path, body
    ))
}

#[async_trait::async_trait]
impl DocumentIndex for RemoteRetriever {
    async fn add_documents(&self, docs: Vec<String>) -> Result<usize> {
        let path = "/add_documents";
        let count = docs.len();
        let reply = self.http.post(path, Some(&json!({ "docs": docs }))).await?;
        if !reply.status.is_success() {
            return Err(reply_error(reply, path));
        }
        Ok(count)
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        let path = "/query";
        let reply = self
            .http
            .post(path, Some(&json!({ "query": query, "top_k": top_k })))
            .await?;
        if !reply.status.is_success() {
            return Err(reply_error(reply, path));
        }

        serde_json::from_value::<Vec<String>>(reply.body["results"].clone())
            .map_err(|_| invalid(path, &reply.body))
    }

    async fn stats(&self) -> Result<IndexStats> {
        let path = "/stats";
        let reply = self.http.get(path, &[]).await?;
        if !reply.status.is_success() {
            return Err(reply_error(reply, path));
        }

        serde_json::from_value::<IndexStats>(reply.body.clone())
            .map_err(|_| invalid(path, &reply.body))
    }
}
