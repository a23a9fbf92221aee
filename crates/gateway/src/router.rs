//! HTTP routes for the chat proxy and the test runner.

use agent::ChatRequestHandler;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use proto::{ChatError, ErrorBody, TestRunRequest, TestRunResponse};
use std::sync::Arc;
use tools::TestOrchestrator;
use tracing::{debug, info, warn};

/// Request-independent collaborators shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    chat: ChatRequestHandler,
    tests: Arc<TestOrchestrator>,
}

impl AppState {
    pub fn new(chat: ChatRequestHandler, tests: Arc<TestOrchestrator>) -> Self {
        Self { chat, tests }
    }
}

/// Builds the API router.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ai", post(ai_handler))
        .route("/api/tests", post(tests_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

// ─── Handlers ──────────────────────────────────────────────

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "ok"
}

/// `POST /api/ai`: validate, forward, wrap.
async fn ai_handler(State(state): State<AppState>, body: Bytes) -> Response {
    match state.chat.handle(&body).await {
        Ok(envelope) => (StatusCode::CREATED, Json(envelope)).into_response(),
        Err(ChatError::Validation(e)) => {
            debug!(reason = e.reason(), "POST /api/ai rejected");
            (StatusCode::BAD_REQUEST, Json(ErrorBody::bare(e.to_string()))).into_response()
        }
        Err(e @ ChatError::External(_)) => {
            warn!("POST /api/ai failed: {e}");
            (StatusCode::BAD_GATEWAY, Json(ErrorBody::failed(e.to_string()))).into_response()
        }
    }
}

/// `POST /api/tests`: run the selected suites and report.
async fn tests_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match TestRunRequest::parse(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(reason = e.reason(), "POST /api/tests rejected");
            return (StatusCode::BAD_REQUEST, Json(ErrorBody::failed(e.to_string())))
                .into_response();
        }
    };

    info!(test_target = %request.target, "POST /api/tests");
    let report = state.tests.run_tests(request.target).await;
    let status = if report.success {
        StatusCode::CREATED
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(TestRunResponse::from(report))).into_response()
}
