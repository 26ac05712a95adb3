//! Bridge between model tool calls and a tool registry

use cinder_core::types::{Message, ToolCall, ToolDefinition, ToolDescriptor};
use cinder_mcp::{CallToolResult, RegistryContent, RegistryTransport};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};

pub const NO_CONTENT_MARKER: &str = "WARNING: No content returned from tool";
pub const FAILURE_PREFIX: &str = "ERROR: Tool call failed - ";

/// Normalized result of one tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallOutcome {
    Text(String),
    NoContent,
    Failed(String),
}

impl ToolCallOutcome {
    /// Text the model sees as the tool message content
    pub fn content(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::NoContent => NO_CONTENT_MARKER.to_string(),
            Self::Failed(err) => format!("{}{}", FAILURE_PREFIX, err),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Pending tool message answering `call_id`
    pub fn into_message(self, call_id: &str) -> Message {
        Message::tool_result(call_id, self.content())
    }
}

/// Map registry descriptors to protocol tool definitions, preserving order
pub fn map_tool_list_to_protocol(tools: &[ToolDescriptor]) -> Vec<ToolDefinition> {
    tools.iter().map(ToolDefinition::from).collect()
}

pub struct ToolBridge;

impl ToolBridge {
    /// Call `name` on the registry with the model's raw argument string.
    ///
    /// Bad arguments and registry failures come back as `Failed` so the model
    /// can see them. Only a non-text first content part is an error.
    pub async fn invoke(registry: &dyn RegistryTransport, name: &str, raw_args: &str) -> Result<ToolCallOutcome> {
        let arguments = match decode_arguments(raw_args) {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(tool = name, error = %e, "tool arguments are not valid JSON");
                return Ok(ToolCallOutcome::Failed(format!("invalid arguments: {}", e)));
            }
        };

        let result = match registry.call_tool(name, arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                return Ok(ToolCallOutcome::Failed(e.to_string()));
            }
        };

        normalize(name, result)
    }

    /// Invoke a model tool call and turn the outcome into its tool message
    pub async fn execute(registry: &dyn RegistryTransport, call: &ToolCall) -> Result<Message> {
        let outcome = Self::invoke(registry, &call.name, &call.arguments).await?;
        debug!(tool = %call.name, call_id = %call.id, failed = outcome.is_failure(), "tool call finished");
        Ok(outcome.into_message(&call.id))
    }
}

fn decode_arguments(raw: &str) -> std::result::Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
}

fn normalize(name: &str, result: CallToolResult) -> Result<ToolCallOutcome> {
    match result.content.into_iter().next() {
        None => Ok(ToolCallOutcome::NoContent),
        // An `isError` text result reaches the model as the registry wrote it
        Some(RegistryContent::Text { text }) => {
            if result.is_error {
                debug!(tool = name, "registry flagged the tool result as an error");
            }
            Ok(ToolCallOutcome::Text(text))
        }
        Some(other) => Err(BridgeError::UnsupportedContentType {
            tool: name.to_string(),
            kind: other.kind().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FnTool, LocalToolRegistry};
    use crate::error::ToolError;
    use cinder_core::types::Role;
    use cinder_mcp::RegistryTransport;
    use serde_json::json;
    use std::sync::Arc;

    async fn registry() -> LocalToolRegistry {
        let registry = LocalToolRegistry::new();
        registry.register(Arc::new(FnTool::new("echo", "Echo the text argument", |args| {
            Ok(CallToolResult::text(args["text"].as_str().unwrap_or_default()))
        })));
        registry.register(Arc::new(FnTool::new("silent", "Returns nothing", |_| Ok(CallToolResult::empty()))));
        registry.register(Arc::new(FnTool::new("picture", "Returns an image", |_| {
            Ok(CallToolResult {
                content: vec![RegistryContent::Image {
                    data: "aGk=".into(),
                    mime_type: "image/png".into(),
                }],
                is_error: false,
            })
        })));
        registry.register(Arc::new(FnTool::new("broken", "Always fails", |_| {
            Err(ToolError::ExecutionFailed("disk on fire".into()))
        })));
        registry.connect().await.unwrap();
        registry
    }

    #[test]
    fn test_mapping_preserves_order_and_fields() {
        let descriptors = vec![
            ToolDescriptor::new("b", Some("second".into()), json!({"type": "object"})),
            ToolDescriptor::new("a", None, json!({"type": "object", "properties": {"x": {"type": "number"}}})),
        ];
        let tools = map_tool_list_to_protocol(&descriptors);
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "b");
        assert_eq!(tools[0].description.as_deref(), Some("second"));
        assert_eq!(tools[1].parameters["properties"]["x"]["type"], "number");
        assert!(map_tool_list_to_protocol(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_text_result() {
        let registry = registry().await;
        let outcome = ToolBridge::invoke(&registry, "echo", r#"{"text":"4"}"#).await.unwrap();
        assert_eq!(outcome, ToolCallOutcome::Text("4".into()));
        assert_eq!(outcome.content(), "4");
    }

    #[tokio::test]
    async fn test_blank_arguments_are_empty_object() {
        let registry = registry().await;
        let outcome = ToolBridge::invoke(&registry, "echo", "").await.unwrap();
        assert_eq!(outcome, ToolCallOutcome::Text(String::new()));
    }

    #[tokio::test]
    async fn test_malformed_arguments_fail_softly() {
        let registry = registry().await;
        let outcome = ToolBridge::invoke(&registry, "echo", "{text: 4").await.unwrap();
        assert!(outcome.is_failure());
        assert!(outcome.content().starts_with("ERROR: Tool call failed - "));
    }

    #[tokio::test]
    async fn test_empty_content_warns() {
        let registry = registry().await;
        let outcome = ToolBridge::invoke(&registry, "silent", "{}").await.unwrap();
        assert_eq!(outcome, ToolCallOutcome::NoContent);
        assert_eq!(outcome.content(), "WARNING: No content returned from tool");
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_softly() {
        let registry = registry().await;
        let outcome = ToolBridge::invoke(&registry, "missing", "{}").await.unwrap();
        assert_eq!(outcome, ToolCallOutcome::Failed("tool not found: missing".into()));
    }

    #[tokio::test]
    async fn test_in_band_tool_error() {
        let registry = registry().await;
        let outcome = ToolBridge::invoke(&registry, "broken", "{}").await.unwrap();
        assert_eq!(outcome, ToolCallOutcome::Text("Tool execution failed: disk on fire".into()));
        assert_eq!(outcome.content(), "Tool execution failed: disk on fire");
    }

    #[tokio::test]
    async fn test_non_text_content_is_fatal() {
        let registry = registry().await;
        let err = ToolBridge::invoke(&registry, "picture", "{}").await.unwrap_err();
        match err {
            BridgeError::UnsupportedContentType { tool, kind } => {
                assert_eq!(tool, "picture");
                assert_eq!(kind, "image");
            }
        }
    }

    #[tokio::test]
    async fn test_execute_builds_tool_message() {
        let registry = registry().await;
        let call = ToolCall::new("call_7", "echo", r#"{"text":"hi"}"#);
        let message = ToolBridge::execute(&registry, &call).await.unwrap();
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_7"));
        assert_eq!(message.text_content(), "hi");
    }
}
