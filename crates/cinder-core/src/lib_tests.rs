use super::*;
use serde_json::json;

#[test]
fn test_assistant_reply_round_trip_through_history() {
    let response = ChatResponse::new("resp-1", "llama3", "")
        .with_tool_calls(vec![ToolCall::new("call-1", "get_weather", r#"{"city":"Hanoi"}"#)])
        .with_finish_reason(FinishReason::ToolCalls);

    let message = response.to_message().finalize();
    assert!(message.has_tool_calls());
    assert_eq!(message.status, MessageStatus::Ready);

    let stored = serde_json::to_string(&message).unwrap();
    let restored: Message = serde_json::from_str(&stored).unwrap();
    assert_eq!(restored, message);
}

#[test]
fn test_tool_definition_from_descriptor() {
    let descriptor = ToolDescriptor::new(
        "calc",
        Some("Evaluate arithmetic".to_string()),
        json!({"type": "object", "properties": {"expr": {"type": "string"}}}),
    );
    let definition = ToolDefinition::from(&descriptor);

    assert_eq!(definition.name, "calc");
    assert_eq!(definition.description.as_deref(), Some("Evaluate arithmetic"));
    assert_eq!(definition.parameters, descriptor.input_schema);
}

#[test]
fn test_tool_result_message() {
    let msg = Message::tool_result("call-1", "Sunny, 25°C").finalize();
    assert!(matches!(msg.role, Role::Tool));
    assert_eq!(msg.tool_call_id, Some("call-1".to_string()));
    assert_eq!(msg.text(), Some("Sunny, 25°C"));
}
