//! Chat request handling and the external AI service client.

pub mod client;
pub mod handler;

pub use client::HttpAiClient;
pub use handler::ChatRequestHandler;

use async_trait::async_trait;
use proto::ExternalServiceError;
use serde_json::Value;

/// External AI inference service.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Sends one user message and returns the service's opaque JSON reply.
    async fn generate(&self, message: &str) -> Result<Value, ExternalServiceError>;
}
