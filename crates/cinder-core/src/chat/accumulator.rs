use std::collections::BTreeMap;

use crate::chat::{ChatChunk, ChatResponse, ChatUsage, FinishReason};
use crate::types::ToolCall;

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Folds streamed chunks back into one [`ChatResponse`].
///
/// Tool calls are keyed by their stream index so interleaved argument deltas
/// land on the right call. Error chunks are not handled here; callers surface
/// them before pushing.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    id: String,
    model: String,
    content: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    usage: ChatUsage,
    finish_reason: Option<FinishReason>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &ChatChunk) {
        match chunk {
            ChatChunk::Start { id, model } => {
                if self.id.is_empty() {
                    self.id = id.clone();
                }
                if self.model.is_empty() {
                    self.model = model.clone();
                }
            }
            ChatChunk::Content { text } => self.content.push_str(text),
            ChatChunk::ToolCallStart { index, call_id, name } => {
                let call = self.tool_calls.entry(*index).or_default();
                if !call_id.is_empty() {
                    call.id = call_id.clone();
                }
                call.name.push_str(name);
            }
            ChatChunk::ToolCallDelta { index, arguments_delta } => {
                self.tool_calls
                    .entry(*index)
                    .or_default()
                    .arguments
                    .push_str(arguments_delta);
            }
            ChatChunk::Usage { input_tokens, output_tokens } => {
                self.usage = ChatUsage::new(*input_tokens, *output_tokens);
            }
            ChatChunk::Finish { reason } => self.finish_reason = Some(*reason),
            ChatChunk::Error { .. } => {}
        }
    }

    /// Text received so far
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn finish(self) -> ChatResponse {
        let tool_calls = self
            .tool_calls
            .into_values()
            .map(|call| ToolCall::new(call.id, call.name, call.arguments))
            .collect();

        ChatResponse {
            id: self.id,
            model: self.model,
            content: self.content,
            tool_calls,
            usage: self.usage,
            finish_reason: self.finish_reason.unwrap_or(FinishReason::Unknown),
        }
    }
}
