use async_trait::async_trait;
use cinder_core::chat::{ChatRequest, ChatResponse};

use crate::error::Result;
use crate::provider::{BaseProvider, LLMProvider, ProviderCapabilities, ProviderConfig, ProviderMetadata};
use crate::transformer::{LLMStream, OpenAiTransformer};

/// OpenAI-compatible chat-completions endpoint.
///
/// Works against the local inference server as well as hosted APIs that
/// speak the same schema.
pub struct OpenAiProvider {
    base: BaseProvider<OpenAiTransformer>,
}

impl OpenAiProvider {
    pub fn with_config(config: ProviderConfig) -> Result<Self> {
        let metadata = ProviderMetadata {
            id: config.provider_id.clone(),
            name: if config.provider_id == "local" {
                "Local server".to_string()
            } else {
                "OpenAI compatible".to_string()
            },
            capabilities: ProviderCapabilities::default(),
        };

        let base = BaseProvider::new(config, OpenAiTransformer::new(), metadata)?;
        Ok(Self { base })
    }

    /// The local inference server with its default credentials
    pub fn local() -> Result<Self> {
        Self::with_config(ProviderConfig::default())
    }

    /// Hosted endpoint at `base_url` using an API key
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let config = ProviderConfig::new("openai", base_url).with_api_key(api_key);
        Self::with_config(config)
    }

    pub fn config(&self) -> &ProviderConfig {
        self.base.config()
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        self.base.provider_id()
    }

    fn metadata(&self) -> &ProviderMetadata {
        self.base.metadata()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.base.chat(request).await
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream> {
        self.base.chat_stream(request).await
    }

    async fn validate(&self) -> Result<()> {
        self.base.validate().await
    }
}
