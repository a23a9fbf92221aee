use proto::{
    AggregateReport, AiEnvelope, AiReply, AiRequest, ChatMessage, Role, TestRunRequest,
    TestRunResponse, TestTarget,
};
use serde_json::json;

#[test]
fn ai_envelope_carries_external_body_untouched() {
    let external = json!({"message": "Olá", "thinking": "t", "interaction": {"rows": [1, 2]}});
    let envelope = AiEnvelope::ok(external.clone());

    let wire = serde_json::to_string(&envelope).expect("serialize envelope");
    let parsed: AiEnvelope = serde_json::from_str(&wire).expect("deserialize envelope");
    assert!(parsed.ok);
    assert_eq!(parsed.message, external);

    let reply = AiReply::from_payload(&parsed.message).expect("reply text");
    let message = reply.into_message();
    assert_eq!(message.role, Role::System);
    assert_eq!(message.message, "Olá");
    assert_eq!(message.thinking.as_deref(), Some("t"));
    assert_eq!(message.interaction, Some(json!({"rows": [1, 2]})));
}

#[test]
fn forwarded_request_has_only_message_field() {
    let req = AiRequest::parse(br#"{"message":"oi","session":"ignored"}"#).expect("valid body");
    assert_eq!(
        serde_json::to_value(&req).expect("serialize"),
        json!({"message": "oi"})
    );
}

#[test]
fn test_run_request_and_response_shapes() {
    let req = TestRunRequest::parse(br#"{"target":"ui"}"#).expect("valid body");
    assert_eq!(req.target, TestTarget::Ui);

    let resp = TestRunResponse::from(AggregateReport {
        success: true,
        combined_output: "cwd: .\n> pnpm test".to_string(),
    });
    assert_eq!(
        serde_json::to_value(&resp).expect("serialize"),
        json!({"ok": true, "output": "cwd: .\n> pnpm test"})
    );
}

#[test]
fn conversation_round_trips_through_json() {
    let log = vec![ChatMessage::user("oi"), ChatMessage::system("...")];
    let wire = serde_json::to_string(&log).expect("serialize log");
    let parsed: Vec<ChatMessage> = serde_json::from_str(&wire).expect("deserialize log");
    assert_eq!(parsed, log);
}
