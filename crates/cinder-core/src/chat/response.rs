use serde::{Deserialize, Serialize};

use crate::chat::FinishReason;
use crate::types::{Message, ToolCall};

/// One completed reply from the model endpoint (first choice only)
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: ChatUsage,
    pub finish_reason: FinishReason,
}

impl ChatResponse {
    pub fn new(id: impl Into<String>, model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            content: content.into(),
            tool_calls: Vec::new(),
            usage: ChatUsage::default(),
            finish_reason: FinishReason::Stop,
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_usage(mut self, usage: ChatUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Build the pending assistant message carrying this reply
    pub fn to_message(&self) -> Message {
        let tool_calls = if self.tool_calls.is_empty() {
            None
        } else {
            Some(self.tool_calls.clone())
        };
        Message::assistant(self.content.clone(), tool_calls)
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl ChatUsage {
    pub fn new(input: u32, output: u32) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input.saturating_add(output),
        }
    }

    /// Add another usage to this one, saturating at `u32::MAX`
    pub fn add(&mut self, other: &ChatUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageStatus, Role};

    #[test]
    fn test_to_message_carries_tool_calls() {
        let response = ChatResponse::new("resp_1", "llama3", "")
            .with_tool_calls(vec![ToolCall::new("call_1", "calc", r#"{"expr":"2+2"}"#)])
            .with_finish_reason(FinishReason::ToolCalls);

        let message = response.to_message();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.status, MessageStatus::Pending);
        assert_eq!(message.tool_calls.as_ref().map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_usage_add() {
        let mut usage = ChatUsage::new(10, 20);
        usage.add(&ChatUsage::new(1, 2));
        assert_eq!(usage.input_tokens, 11);
        assert_eq!(usage.output_tokens, 22);
        assert_eq!(usage.total_tokens, 33);
    }

    #[test]
    fn test_usage_saturates() {
        let mut usage = ChatUsage::new(3_000_000_000, 2_000_000_000);
        assert_eq!(usage.total_tokens, u32::MAX);

        usage.add(&ChatUsage::new(u32::MAX, 1));
        assert_eq!(usage.input_tokens, u32::MAX);
        assert_eq!(usage.output_tokens, 2_000_000_001);
        assert_eq!(usage.total_tokens, u32::MAX);
    }
}
