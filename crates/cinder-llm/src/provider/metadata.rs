use async_trait::async_trait;
use cinder_core::chat::{ChatRequest, ChatResponse};
use crate::error::Result;
use crate::transformer::LLMStream;

/// A chat-completions model endpoint
#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    fn metadata(&self) -> &ProviderMetadata;

    /// Send a chat request and get a complete response
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Send a chat request and stream the response
    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream>;

    /// Validate the provider configuration
    async fn validate(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub id: String,
    pub name: String,
    pub capabilities: ProviderCapabilities,
}

#[derive(Debug, Clone)]
pub struct ProviderCapabilities {
    pub streaming: bool,
    pub tool_calling: bool,
    pub vision: bool,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            streaming: true,
            tool_calling: true,
            vision: false,
        }
    }
}
