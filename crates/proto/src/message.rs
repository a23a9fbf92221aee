use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the end user.
    User,
    /// Message produced by the assistant (or the client on its behalf).
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One entry of the visible conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub message: String,
    /// Structured side payload attached by the AI service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<Value>,
    /// Reasoning text attached by the AI service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

impl ChatMessage {
    /// Creates a user message.
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            message: message.into(),
            interaction: None,
            thinking: None,
        }
    }

    /// Creates a system message.
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            message: message.into(),
            interaction: None,
            thinking: None,
        }
    }
}

/// Body of `POST /api/ai`, also forwarded verbatim to the AI endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiRequest {
    pub message: String,
}

impl AiRequest {
    /// Parses and validates a raw request body.
    ///
    /// The body must be a JSON object carrying a `message` string of at least
    /// one character. Whitespace-only messages are accepted as-is.
    pub fn parse(raw: &[u8]) -> Result<Self, ValidationError> {
        let req: AiRequest = serde_json::from_slice(raw)
            .map_err(|e| ValidationError::InvalidBody(e.to_string()))?;
        if req.message.is_empty() {
            return Err(ValidationError::InvalidBody(
                "message must not be empty".to_string(),
            ));
        }
        Ok(req)
    }
}

/// Success envelope returned by `POST /api/ai`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiEnvelope {
    pub ok: bool,
    /// Opaque body returned by the AI endpoint.
    pub message: Value,
}

impl AiEnvelope {
    /// Wraps an external response body.
    pub fn ok(message: Value) -> Self {
        Self { ok: true, message }
    }
}

/// Reply fields the chat client understands inside an [`AiEnvelope`].
#[derive(Debug, Clone, PartialEq)]
pub struct AiReply {
    pub message: String,
    pub thinking: Option<String>,
    pub interaction: Option<Value>,
}

impl AiReply {
    /// Extracts the reply from the opaque `message` payload of an envelope.
    ///
    /// Accepts `{message, thinking?, interaction?}` objects and bare strings.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        match payload {
            Value::String(text) => Some(Self {
                message: text.clone(),
                thinking: None,
                interaction: None,
            }),
            Value::Object(map) => {
                let message = map.get("message")?.as_str()?.to_string();
                let thinking = map
                    .get("thinking")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let interaction = map.get("interaction").filter(|v| !v.is_null()).cloned();
                Some(Self {
                    message,
                    thinking,
                    interaction,
                })
            }
            _ => None,
        }
    }

    /// Converts the reply into the system message that fills a turn's slot.
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            role: Role::System,
            message: self.message,
            interaction: self.interaction,
            thinking: self.thinking,
        }
    }
}

/// Error body shared by both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    pub error: String,
}

impl ErrorBody {
    /// Error body without an `ok` field.
    pub fn bare(error: impl Into<String>) -> Self {
        Self {
            ok: None,
            error: error.into(),
        }
    }

    /// Error body with `ok: false`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: Some(false),
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(Role::System.to_string(), "system");
    }

    #[test]
    fn chat_message_omits_absent_side_payloads() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json, json!({"role": "user", "message": "hi"}));
    }

    #[test]
    fn ai_request_accepts_non_empty_message() {
        let req = AiRequest::parse(br#"{"message":"hello","extra":1}"#).unwrap();
        assert_eq!(req.message, "hello");
    }

    #[test]
    fn ai_request_accepts_whitespace_message() {
        let req = AiRequest::parse(br#"{"message":" "}"#).unwrap();
        assert_eq!(req.message, " ");
    }

    #[test]
    fn ai_request_rejects_empty_missing_and_malformed() {
        for raw in [
            &br#"{"message":""}"#[..],
            br#"{}"#,
            br#"{"message":42}"#,
            br#"{"message":null}"#,
            br#"[]"#,
            b"not json",
            b"",
        ] {
            let err = AiRequest::parse(raw).expect_err("body must be rejected");
            assert_eq!(err.to_string(), "Invalid body");
        }
    }

    #[test]
    fn ai_reply_reads_nested_message_object() {
        let payload = json!({
            "message": "Hello",
            "thinking": "pondering",
            "interaction": {"kind": "chart"}
        });
        let reply = AiReply::from_payload(&payload).unwrap();
        assert_eq!(reply.message, "Hello");
        assert_eq!(reply.thinking.as_deref(), Some("pondering"));
        assert_eq!(reply.interaction, Some(json!({"kind": "chart"})));
    }

    #[test]
    fn ai_reply_accepts_bare_string_payload() {
        let reply = AiReply::from_payload(&json!("plain")).unwrap();
        assert_eq!(reply.into_message(), ChatMessage::system("plain"));
    }

    #[test]
    fn ai_reply_rejects_payload_without_text() {
        assert!(AiReply::from_payload(&json!({"thinking": "x"})).is_none());
        assert!(AiReply::from_payload(&json!({"message": 3})).is_none());
        assert!(AiReply::from_payload(&json!(null)).is_none());
    }

    #[test]
    fn error_body_shapes_match_endpoints() {
        assert_eq!(
            serde_json::to_value(ErrorBody::bare("Invalid body")).unwrap(),
            json!({"error": "Invalid body"})
        );
        assert_eq!(
            serde_json::to_value(ErrorBody::failed("Invalid body")).unwrap(),
            json!({"ok": false, "error": "Invalid body"})
        );
    }
}
