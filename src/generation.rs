//! Answer generation client
//!
//! Talks to the text-generation service (`POST /generate/`). The service
//! builds its own prompt from the query and the supplied documents.

use crate::error::OrchestrationError;
use crate::http::JsonClient;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Generation can take minutes on a local model.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, user_query: &str, retrieved_docs: &[String]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    user_query: &'a str,
    retrieved_docs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Reusable generation client (connection-pooled)
pub struct HttpGenerator {
    http: JsonClient,
}

impl HttpGenerator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(base_url, timeout)?,
        })
    }
}

#[async_trait::async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, user_query: &str, retrieved_docs: &[String]) -> Result<String> {
        let request = GenerateRequest {
            user_query,
            retrieved_docs,
        };

        info!(docs = retrieved_docs.len(), "Calling generation service");

        let body = self
            .http
            .post("/generate/", Some(&request))
            .await?
            .into_success("/generate/")
            .map_err(|e| {
                error!("Generation service error response: {}", e);
                e
            })?;

        let parsed: GenerateResponse = serde_json::from_value(body).map_err(|e| {
            OrchestrationError::UpstreamUnavailable(format!("Generation parse error: {}", e))
        })?;

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let docs = vec!["AAPL info:\n{}".to_string()];
        let request = GenerateRequest {
            user_query: "What is the AAPL price?",
            retrieved_docs: &docs,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["user_query"], "What is the AAPL price?");
        assert_eq!(json["retrieved_docs"][0], "AAPL info:\n{}");
    }

    #[tokio::test]
    async fn test_generation_against_local_server() {
        use axum::http::StatusCode;
        use axum::routing::post;
        use axum::{Json, Router};
        use serde_json::{json, Value};

        let router = Router::new().route(
            "/generate/",
            post(|Json(req): Json<Value>| async move {
                let docs = req["retrieved_docs"].as_array().cloned().unwrap_or_default();
                if docs.iter().all(|d| d.as_str().map_or(true, |s| s.trim().is_empty())) {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"detail": "No documents provided for context."})),
                    );
                }
                (StatusCode::OK, Json(json!({"response": "AAPL trades at 189."})))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, router).await });

        let generator = HttpGenerator::new(&base, Duration::from_secs(5)).unwrap();

        let answer = generator
            .generate("AAPL price?", &["AAPL info:\n{}".to_string()])
            .await
            .unwrap();
        assert_eq!(answer, "AAPL trades at 189.");

        let err = generator.generate("hello", &[String::new()]).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::UpstreamUnavailable(_)));
        assert!(err.to_string().contains("400"));
    }
}
