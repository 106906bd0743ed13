//! Speech output client (`POST /speak`)

use crate::error::OrchestrationError;
use crate::http::{JsonClient, DEFAULT_TIMEOUT};
use crate::Result;
use serde_json::{json, Value};

#[async_trait::async_trait]
pub trait Speaker: Send + Sync {
    /// Speak `text`; returns the service's acknowledgement message.
    async fn speak(&self, text: &str) -> Result<String>;
}

pub struct HttpSpeaker {
    http: JsonClient,
}

impl HttpSpeaker {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(base_url, DEFAULT_TIMEOUT)?,
        })
    }
}

#[async_trait::async_trait]
impl Speaker for HttpSpeaker {
    async fn speak(&self, text: &str) -> Result<String> {
        let body = self
            .http
            .post("/speak", Some(&json!({ "text": text })))
            .await?
            .into_success("/speak")?;

        body.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                OrchestrationError::UpstreamUnavailable(format!(
                    "Speech service sent no message: {}",
                    body
                ))
            })
    }
}
