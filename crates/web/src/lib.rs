use proto::{AiRequest, TestRunRequest, TestTarget};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};
use web_sys::{Headers, Request, RequestInit, Response, console};

pub mod turn;

pub use turn::{ChatTurnController, HttpReply, PendingTurn, TurnError, TurnPhase};

const DEFAULT_CHAT_ENDPOINT: &str = "/api/ai";
const DEFAULT_TESTS_ENDPOINT: &str = "/api/tests";

// ─── Logging helper ────────────────────────────────────────

fn log(s: &str) {
    console::log_1(&JsValue::from_str(s));
}

// ─── Public API ────────────────────────────────────────────

/// Returns the crate version string.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// WASM entry point, called automatically by the JS glue.
///
/// Initialises panic hook for readable browser console errors and
/// logs the module version. Rendering lives in the page script; this module
/// owns the conversation state and the HTTP calls.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    log(&format!(
        "capassist-web v{} WASM module loaded",
        env!("CARGO_PKG_VERSION")
    ));
}

/// Conversation bound to the page, exported to JS.
#[wasm_bindgen]
pub struct ChatSession {
    controller: Rc<RefCell<ChatTurnController>>,
    endpoint: String,
}

#[wasm_bindgen]
impl ChatSession {
    /// Creates a session posting to `endpoint` (empty = `/api/ai`).
    #[wasm_bindgen(constructor)]
    pub fn new(endpoint: &str) -> Self {
        Self {
            controller: Rc::new(RefCell::new(ChatTurnController::new())),
            endpoint: endpoint_or(endpoint, DEFAULT_CHAT_ENDPOINT),
        }
    }

    /// Current conversation as a JSON array of `{role, message, ...}`.
    pub fn messages(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.controller.borrow().messages())
            .map_err(|e| JsValue::from_str(&format!("JSON error: {e}")))
    }

    /// `true` while a turn is in flight; the page disables its composer.
    #[wasm_bindgen(js_name = isLoading)]
    pub fn is_loading(&self) -> bool {
        self.controller.borrow().is_loading()
    }

    /// Starts a turn and resolves with the JSON of the message that replaced
    /// the placeholder. Rejects without touching the log on empty input or
    /// while another turn is pending.
    pub fn send(&self, text: String) -> js_sys::Promise {
        let controller = self.controller.clone();
        let endpoint = self.endpoint.clone();

        future_to_promise(async move {
            let turn = controller
                .borrow_mut()
                .begin(&text)
                .map_err(|e| JsValue::from_str(&e.to_string()))?;

            let outcome = match serde_json::to_string(&AiRequest {
                message: turn.text().to_string(),
            }) {
                Ok(body) => post_json(&endpoint, &body).await,
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = &outcome {
                log(&format!("chat request failed: {e}"));
            }

            let message = controller.borrow_mut().finish(turn, outcome).clone();
            serde_json::to_string(&message)
                .map(|json| JsValue::from_str(&json))
                .map_err(|e| JsValue::from_str(&format!("JSON error: {e}")))
        })
    }
}

/// Developer panel that triggers test runs on the server.
#[wasm_bindgen]
pub struct TestPanel {
    endpoint: String,
    running: Rc<Cell<bool>>,
}

#[wasm_bindgen]
impl TestPanel {
    /// Creates a panel posting to `endpoint` (empty = `/api/tests`).
    #[wasm_bindgen(constructor)]
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint_or(endpoint, DEFAULT_TESTS_ENDPOINT),
            running: Rc::new(Cell::new(false)),
        }
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Runs `target` (`rag`, `ai`, `ui` or `all`) and resolves with
    /// `{status, ok, output}` as JSON.
    pub fn run(&self, target: String) -> js_sys::Promise {
        let endpoint = self.endpoint.clone();
        let running = self.running.clone();

        future_to_promise(async move {
            let target: TestTarget = target
                .parse()
                .map_err(|_| JsValue::from_str(&format!("unknown target: {target}")))?;
            if running.replace(true) {
                return Err(JsValue::from_str("a test run is already in progress"));
            }

            let outcome = match serde_json::to_string(&TestRunRequest { target }) {
                Ok(body) => post_json(&endpoint, &body).await,
                Err(e) => Err(e.to_string()),
            };
            running.set(false);

            let result = match outcome {
                Ok(reply) => PanelResult::from_reply(&reply),
                Err(e) => PanelResult::transport_error(&e),
            };
            serde_json::to_string(&result)
                .map(|json| JsValue::from_str(&json))
                .map_err(|e| JsValue::from_str(&format!("JSON error: {e}")))
        })
    }
}

// ─── Private helpers (not exported to JS) ──────────────────

/// What the test panel renders for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct PanelResult {
    /// HTTP status, or 0 when the request never completed.
    status: u16,
    ok: bool,
    output: String,
}

impl PanelResult {
    fn from_reply(reply: &HttpReply) -> Self {
        let body: serde_json::Value = serde_json::from_str(&reply.body).unwrap_or_default();
        let output = body["output"]
            .as_str()
            .or_else(|| body["error"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| reply.body.clone());
        Self {
            status: reply.status,
            ok: body["ok"].as_bool().unwrap_or(false),
            output,
        }
    }

    fn transport_error(err: &str) -> Self {
        Self {
            status: 0,
            ok: false,
            output: format!("{}{err}", turn::UNEXPECTED_ERROR_PREFIX),
        }
    }
}

fn endpoint_or(endpoint: &str, default: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

/// POSTs a JSON body with `fetch` and returns status plus raw text.
async fn post_json(url: &str, body: &str) -> Result<HttpReply, String> {
    let window = web_sys::window().ok_or_else(|| "no window available".to_string())?;

    let headers = Headers::new().map_err(js_error)?;
    headers
        .set("Content-Type", "application/json")
        .map_err(js_error)?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_headers(&headers);
    init.set_body(&JsValue::from_str(body));

    let request = Request::new_with_str_and_init(url, &init).map_err(js_error)?;
    let value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_error)?;
    let response: Response = value.dyn_into().map_err(js_error)?;
    let text = JsFuture::from(response.text().map_err(js_error)?)
        .await
        .map_err(js_error)?;

    Ok(HttpReply::new(
        response.status(),
        text.as_string().unwrap_or_default(),
    ))
}

/// Renders a JS exception the way `String(err)` would.
fn js_error(err: JsValue) -> String {
    if let Some(e) = err.dyn_ref::<js_sys::Error>() {
        return String::from(e.to_string());
    }
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

// ─── Tests ─────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_or_defaults_when_blank() {
        assert_eq!(endpoint_or("", DEFAULT_CHAT_ENDPOINT), "/api/ai");
        assert_eq!(endpoint_or("  ", DEFAULT_TESTS_ENDPOINT), "/api/tests");
        assert_eq!(
            endpoint_or("http://localhost:3000/api/ai", DEFAULT_CHAT_ENDPOINT),
            "http://localhost:3000/api/ai"
        );
    }

    #[test]
    fn test_panel_result_from_success_reply() {
        let reply = HttpReply::new(201, r#"{"ok":true,"output":"all green"}"#);
        assert_eq!(
            PanelResult::from_reply(&reply),
            PanelResult {
                status: 201,
                ok: true,
                output: "all green".to_string()
            }
        );
    }

    #[test]
    fn test_panel_result_from_failed_run() {
        let reply = HttpReply::new(500, r#"{"ok":false,"output":"(exit code: 1)"}"#);
        let result = PanelResult::from_reply(&reply);
        assert!(!result.ok);
        assert_eq!(result.status, 500);
        assert_eq!(result.output, "(exit code: 1)");
    }

    #[test]
    fn test_panel_result_uses_error_field_for_rejections() {
        let reply = HttpReply::new(400, r#"{"ok":false,"error":"Invalid body"}"#);
        assert_eq!(PanelResult::from_reply(&reply).output, "Invalid body");
    }

    #[test]
    fn test_panel_result_falls_back_to_raw_body() {
        let reply = HttpReply::new(504, "Gateway Timeout");
        let result = PanelResult::from_reply(&reply);
        assert!(!result.ok);
        assert_eq!(result.output, "Gateway Timeout");
    }

    #[test]
    fn test_panel_transport_error_is_prefixed() {
        let result = PanelResult::transport_error("Failed to fetch");
        assert_eq!(result.status, 0);
        assert_eq!(result.output, "Erro inesperado: Failed to fetch");
    }

    #[test]
    fn test_panel_result_serializes_for_js() {
        let json = serde_json::to_string(&PanelResult::transport_error("x")).unwrap();
        assert!(json.contains(r#""status":0"#));
        assert!(json.contains(r#""ok":false"#));
    }
}
