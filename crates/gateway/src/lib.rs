//! HTTP gateway: the chat proxy and test-runner endpoints behind one axum server.

pub mod router;
pub mod server;

/// Shared handler state and the API router.
pub use router::{AppState, api_router};
/// HTTP server with CORS and static asset serving.
pub use server::WebServer;
