use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::content::{Content, ContentPart};
use crate::types::tool::ToolCall;

/// Unique message identifier
pub type MessageId = String;

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a message.
///
/// A message is `Pending` while it is still being produced, `Ready` once it is
/// complete and `Error` if production failed. Ready messages are never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Pending,
    Ready,
    Error,
}

/// Core message type for LLM conversations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Message {
    fn build(role: Role, content: Content) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            status: MessageStatus::Pending,
            metadata: HashMap::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Create a system message. Caller-supplied input is complete on creation.
    pub fn system(content: impl Into<String>) -> Self {
        Self::build(Role::System, Content::text(content)).finalize()
    }

    /// Create a user message. Caller-supplied input is complete on creation.
    pub fn user(content: impl Into<String>) -> Self {
        Self::build(Role::User, Content::text(content)).finalize()
    }

    /// Create a pending assistant message with optional tool calls
    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        let mut message = Self::build(Role::Assistant, Content::text(content));
        message.tool_calls = tool_calls.filter(|calls| !calls.is_empty());
        message
    }

    /// Create a pending tool result message answering `call_id`
    pub fn tool_result(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        let mut message = Self::build(Role::Tool, Content::text(result));
        message.tool_call_id = Some(call_id.into());
        message
    }

    /// Create a message from parts (multimodal content)
    pub fn from_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self::build(role, Content::parts(parts))
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Mark the message as complete. Ready messages keep their first
    /// completion timestamp.
    pub fn finalize(mut self) -> Self {
        if self.status != MessageStatus::Ready {
            self.status = MessageStatus::Ready;
            self.completed_at = Some(Utc::now());
        }
        self
    }

    /// Mark the message as failed
    pub fn fail(mut self) -> Self {
        self.status = MessageStatus::Error;
        self.completed_at = Some(Utc::now());
        self
    }

    pub fn is_ready(&self) -> bool {
        self.status == MessageStatus::Ready
    }

    /// Get text content if available
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text { text } => Some(text),
            Content::Parts { parts } => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            }),
        }
    }

    /// Get all text content concatenated
    pub fn text_content(&self) -> String {
        self.content.to_text()
    }

    /// Check if this message contains tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().map(|tc| !tc.is_empty()).unwrap_or(false)
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::build(Role::User, Content::text(""))
    }
}
