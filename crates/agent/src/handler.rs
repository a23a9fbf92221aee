//! `POST /api/ai` request handling, independent of the HTTP framework.

use proto::{AiEnvelope, AiRequest, ChatError};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::AiBackend;

/// Validates chat requests and forwards them to the AI backend.
#[derive(Clone)]
pub struct ChatRequestHandler {
    backend: Arc<dyn AiBackend>,
}

impl ChatRequestHandler {
    pub fn new(backend: Arc<dyn AiBackend>) -> Self {
        Self { backend }
    }

    /// Handles one raw request body.
    ///
    /// Invalid bodies are rejected before the backend is called. The backend's
    /// JSON body is returned untouched inside the success envelope.
    pub async fn handle(&self, raw_body: &[u8]) -> Result<AiEnvelope, ChatError> {
        let request = AiRequest::parse(raw_body).inspect_err(|e| {
            debug!(reason = e.reason(), "Rejected chat request body");
        })?;

        let reply = self
            .backend
            .generate(&request.message)
            .await
            .inspect_err(|e| warn!("AI backend call failed: {e}"))?;

        Ok(AiEnvelope::ok(reply))
    }
}
