pub mod openai;

pub use openai::OpenAiTransformer;

use cinder_core::chat::{ChatChunk, ChatRequest, ChatResponse};
use cinder_core::types::ToolDefinition;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

use crate::error::ConversionError;

/// Type alias for LLM stream
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, crate::LLMError>> + Send>>;

/// Schema transformer trait for converting between internal and provider formats
pub trait SchemaTransformer: Send + Sync {
    fn provider_id(&self) -> &str;

    /// Transform request to provider-specific format
    fn transform_request(&self, request: &ChatRequest) -> Result<Value, ConversionError>;

    /// Parse one SSE `data:` payload. A single payload may carry several
    /// deltas (role, content and tool calls), so all of them are returned.
    fn parse_stream_chunk(&self, data: &str) -> Result<Vec<ChatChunk>, ConversionError>;

    /// Transform tool definitions to provider format
    fn transform_tools(&self, tools: &[ToolDefinition]) -> Result<Value, ConversionError>;

    /// Parse a complete response (non-streaming)
    fn parse_response(&self, data: &Value) -> Result<ChatResponse, ConversionError>;
}
