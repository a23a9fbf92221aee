//! HTTP client for the external AI inference service.

use async_trait::async_trait;
use proto::{AiRequest, ExternalServiceError};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::AiBackend;

/// Default bound for one AI request.
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(60);

/// Posts `{message}` to a fixed endpoint and returns its JSON body.
pub struct HttpAiClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpAiClient {
    /// Creates a client for `endpoint` with the default timeout.
    ///
    /// An empty endpoint is accepted; every call then fails as unreachable.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_AI_TIMEOUT)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl AiBackend for HttpAiClient {
    async fn generate(&self, message: &str) -> Result<Value, ExternalServiceError> {
        let body = AiRequest {
            message: message.to_string(),
        };
        debug!(endpoint = %self.endpoint, chars = message.chars().count(), "Forwarding message to AI endpoint");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        debug!(status = %status.as_u16(), "AI endpoint response received");

        let text = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            let preview: String = text.chars().take(500).collect();
            warn!(status = %status.as_u16(), "AI endpoint returned an error status");
            return Err(ExternalServiceError::Status {
                status: status.as_u16(),
                preview,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ExternalServiceError::InvalidResponse(format!(
                "{e}; body: {}",
                text.chars().take(200).collect::<String>()
            ))
        })
    }
}

impl HttpAiClient {
    fn map_send_error(&self, e: reqwest::Error) -> ExternalServiceError {
        if e.is_timeout() {
            ExternalServiceError::Timeout(self.timeout)
        } else {
            ExternalServiceError::Unreachable(e.to_string())
        }
    }
}
