//! Error types for the financial query orchestrator

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Core Taxonomy
    // =============================

    /// A collaborator call failed or answered with a non-2xx status.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No documents in index.")]
    EmptyIndex,

    #[error("Internal failure: {0}")]
    Internal(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse failure class exposed to HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    EmptyIndex,
    UpstreamUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::EmptyIndex => "empty_index",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "validation" => Some(ErrorKind::Validation),
            "empty_index" => Some(ErrorKind::EmptyIndex),
            "upstream_unavailable" => Some(ErrorKind::UpstreamUnavailable),
            "internal" => Some(ErrorKind::Internal),
            _ => None,
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation | ErrorKind::EmptyIndex => StatusCode::BAD_REQUEST,
            ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl OrchestrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestrationError::UpstreamUnavailable(_) | OrchestrationError::HttpError(_) => {
                ErrorKind::UpstreamUnavailable
            }
            OrchestrationError::Validation(_) => ErrorKind::Validation,
            OrchestrationError::EmptyIndex => ErrorKind::EmptyIndex,
            // request bodies are decoded by the extractors, so a serde failure here is ours
            OrchestrationError::Internal(_)
            | OrchestrationError::SerializationError(_)
            | OrchestrationError::IoError(_) => ErrorKind::Internal,
        }
    }
}

impl OrchestrationError {
    /// The message without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            OrchestrationError::UpstreamUnavailable(msg)
            | OrchestrationError::Validation(msg)
            | OrchestrationError::Internal(msg) => msg.clone(),
            OrchestrationError::EmptyIndex => self.to_string(),
            OrchestrationError::SerializationError(e) => e.to_string(),
            OrchestrationError::HttpError(e) => e.to_string(),
            OrchestrationError::IoError(e) => e.to_string(),
        }
    }
}

impl IntoResponse for OrchestrationError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": kind.code(),
            "detail": self.detail(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        (kind.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_round_trip() {
        for kind in [
            ErrorKind::Validation,
            ErrorKind::EmptyIndex,
            ErrorKind::UpstreamUnavailable,
            ErrorKind::Internal,
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code("teapot"), None);
    }

    #[test]
    fn test_serde_failures_are_internal() {
        let err: OrchestrationError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.kind().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_detail_drops_prefix() {
        let err = OrchestrationError::Validation("No documents provided.".into());
        assert_eq!(err.to_string(), "Validation error: No documents provided.");
        assert_eq!(err.detail(), "No documents provided.");
        assert_eq!(OrchestrationError::EmptyIndex.detail(), "No documents in index.");
    }

    #[tokio::test]
    async fn test_response_body_carries_code_and_detail() {
        let response = OrchestrationError::Internal("disk full".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "internal");
        assert_eq!(body["detail"], "disk full");
        assert_eq!(body["error"], "Internal failure: disk full");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(OrchestrationError::EmptyIndex.kind().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            OrchestrationError::Validation("bad date".into()).kind().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OrchestrationError::Internal("boot".into()).kind().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
