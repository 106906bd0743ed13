//! REST API for the orchestrator and retriever services
//!
//! Both services share the same layering: shared state behind `Arc`,
//! permissive CORS, request tracing, graceful shutdown on Ctrl-C.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::Orchestrator;
use crate::models::AggregateResponse;
use crate::store::{DocumentIndex, IndexStats};
use crate::Result;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptionRequest {
    pub transcription: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddDocumentsRequest {
    pub docs: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddDocumentsResponse {
    pub message: String,
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<String>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Orchestrator Service
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

async fn receive_transcription(
    State(state): State<ApiState>,
    Json(req): Json<TranscriptionRequest>,
) -> Json<AggregateResponse> {
    info!("Received transcription: {}", req.transcription);
    Json(state.orchestrator.handle(&req.transcription).await)
}

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/receive_transcription", post(receive_transcription))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// =============================
/// Retriever Service
/// =============================

#[derive(Clone)]
pub struct RetrieverState {
    pub index: Arc<dyn DocumentIndex>,
}

async fn add_documents(
    State(state): State<RetrieverState>,
    Json(req): Json<AddDocumentsRequest>,
) -> Result<Json<AddDocumentsResponse>> {
    let added = state.index.add_documents(req.docs).await?;
    Ok(Json(AddDocumentsResponse {
        message: format!("Added {} documents.", added),
    }))
}

async fn query_documents(
    State(state): State<RetrieverState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let results = state.index.search(&req.query, req.top_k).await?;
    Ok(Json(QueryResponse { results }))
}

async fn stats(State(state): State<RetrieverState>) -> Result<Json<IndexStats>> {
    Ok(Json(state.index.stats().await?))
}

pub fn create_retriever_router(index: Arc<dyn DocumentIndex>) -> Router {
    let state = RetrieverState { index };

    Router::new()
        .route("/health", get(health))
        .route("/add_documents", post(add_documents))
        .route("/query", post(query_documents))
        .route("/stats", get(stats))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    router: Router,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::{orchestrator, temp_store, RecordingGenerator, RecordingSpeaker};
    use crate::store::UnavailableIndex;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_retriever_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_retriever_router(temp_store(&dir).await);

        let (status, body) = call(router.clone(), "POST", "/query", Some(json!({"query": "AAPL"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "empty_index");

        let (status, body) = call(router.clone(), "POST", "/add_documents", Some(json!({"docs": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation");

        let (status, body) = call(
            router.clone(),
            "POST",
            "/add_documents",
            Some(json!({"docs": ["AAPL current price 189", "MSFT earnings beat", "TSLA history"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Added 3 documents.");

        // top_k defaults to 3
        let (status, body) = call(router.clone(), "POST", "/query", Some(json!({"query": "MSFT earnings"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"].as_array().unwrap().len(), 3);
        assert_eq!(body["results"][0], "MSFT earnings beat");

        let (status, body) = call(router, "GET", "/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"documents": 3, "dimension": 384}));
    }

    #[tokio::test]
    async fn test_unavailable_store_is_server_error() {
        let router = create_retriever_router(Arc::new(UnavailableIndex::new("cannot create /ro")));

        let (status, body) = call(router, "POST", "/query", Some(json!({"query": "AAPL", "top_k": 1}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "internal");
    }

    #[tokio::test]
    async fn test_receive_transcription() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            temp_store(&dir).await,
            Arc::new(RecordingGenerator::default()),
            Arc::new(RecordingSpeaker::default()),
        );
        let router = create_router(Arc::new(orch));

        let (status, body) = call(
            router.clone(),
            "POST",
            "/receive_transcription",
            Some(json!({"transcription": "MSFT earnings and AAPL price"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_query"], "MSFT earnings and AAPL price");
        assert_eq!(body["ticker_intent_map"], json!({"MSFT": "earnings", "AAPL": "price"}));
        assert!(body["agent_data"]["AAPL"]["data"].is_object());
        assert_eq!(body["retriever_result"]["status"], "ok");
        assert_eq!(body["llm_response"]["response"], "Here is what I found.");

        let (status, body) = call(
            router.clone(),
            "POST",
            "/receive_transcription",
            Some(json!({"transcription": "hello there"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticker_intent_map"], json!({}));

        let (status, _) = call(router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
