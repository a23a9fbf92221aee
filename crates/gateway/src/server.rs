//! HTTP server bootstrap: CORS, static web client assets, graceful shutdown.

use proto::GatewayError;
use std::future::Future;
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::router::{AppState, api_router};

/// axum server exposing the API and, optionally, the built web client.
#[derive(Debug, Clone)]
pub struct WebServer {
    host: String,
    port: u16,
    cors_origins: String,
    static_dir: String,
}

impl WebServer {
    /// Creates a server with the given parameters.
    pub fn new(host: String, port: u16, cors_origins: String, static_dir: String) -> Self {
        Self {
            host,
            port,
            cors_origins,
            static_dir,
        }
    }

    /// Builds the CORS layer from the configured origins string.
    fn build_cors(&self) -> CorsLayer {
        if self.cors_origins.trim().is_empty() || self.cors_origins == "*" {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            // Parse comma-separated origins
            let origins: Vec<_> = self
                .cors_origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }

    /// Builds the full application: API routes, CORS and static fallback.
    pub fn app(&self, state: AppState) -> axum::Router {
        let app = api_router(state).layer(self.build_cors());

        if self.static_dir.is_empty() {
            return app;
        }
        let expanded = expand_tilde(&self.static_dir);
        if Path::new(&expanded).is_dir() {
            info!(path = %expanded, "Serving static files");
            app.fallback_service(tower_http::services::ServeDir::new(expanded))
        } else {
            debug!(path = %expanded, "Static dir does not exist, skipping");
            app
        }
    }

    /// Binds and serves until `shutdown` resolves.
    pub async fn run<F>(self, state: AppState, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.app(state);
        let addr = format!("{}:{}", self.host, self.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| GatewayError::Bind {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;

        info!(addr = %addr, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Serve(e.to_string()))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Expands `~` at the start of a path to `$HOME`.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{home}{rest}")
    } else {
        path.to_string()
    }
}
