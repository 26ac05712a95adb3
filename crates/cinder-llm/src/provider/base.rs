use async_trait::async_trait;
use cinder_core::chat::{ChatChunk, ChatRequest, ChatResponse};
use eventsource_stream::Eventsource;
use futures::{future, stream, StreamExt};
use reqwest::{header, Client, StatusCode};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::sync::Arc;

use crate::auth::{ApiKeyAuth, Authenticator, BearerAuth, NoAuth};
use crate::error::{LLMError, Result};
use crate::provider::{AuthConfig, LLMProvider, ProviderConfig, ProviderMetadata};
use crate::transformer::{LLMStream, SchemaTransformer};

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Base provider implementation
/// Handles common HTTP functionality and delegates schema transformation
pub struct BaseProvider<T: SchemaTransformer> {
    config: ProviderConfig,
    http_client: reqwest_middleware::ClientWithMiddleware,
    transformer: Arc<T>,
    metadata: ProviderMetadata,
    authenticator: Arc<dyn Authenticator>,
}

impl<T: SchemaTransformer + 'static> BaseProvider<T> {
    pub fn new(config: ProviderConfig, transformer: T, metadata: ProviderMetadata) -> Result<Self> {
        let authenticator: Arc<dyn Authenticator> = match &config.auth {
            AuthConfig::ApiKey { key } => Arc::new(ApiKeyAuth::new(key.clone())),
            AuthConfig::Bearer { token } => Arc::new(BearerAuth::new(token.clone())),
            AuthConfig::None => Arc::new(NoAuth),
        };
        Self::with_authenticator(config, transformer, metadata, authenticator)
    }

    /// Create with a custom authenticator
    pub fn with_authenticator(
        config: ProviderConfig,
        transformer: T,
        metadata: ProviderMetadata,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self> {
        let retry_policy = ExponentialBackoff::builder()
            .base(2)
            .build_with_max_retries(3);

        let http_client = reqwest_middleware::ClientBuilder::new(
            Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(|e| LLMError::Config(e.to_string()))?,
        )
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

        Ok(Self {
            config,
            http_client,
            transformer: Arc::new(transformer),
            metadata,
            authenticator,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn build_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

        if let Some((header_name, header_value)) = self.authenticator.get_auth_header().await? {
            let name = header::HeaderName::from_bytes(header_name.as_bytes())
                .map_err(|e| LLMError::Config(format!("Invalid auth header name: {}", e)))?;
            let value = header::HeaderValue::from_str(&header_value)
                .map_err(|e| LLMError::Config(format!("Invalid auth header value: {}", e)))?;
            headers.insert(name, value);
        }

        for (key, value) in &self.config.headers {
            let header_name = header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| LLMError::Config(format!("Invalid header name: {}", e)))?;
            let header_value = header::HeaderValue::from_str(value)
                .map_err(|e| LLMError::Config(format!("Invalid header value: {}", e)))?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    async fn post(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let body = self.transformer.transform_request(request)?;
        let headers = self.build_headers().await?;
        let url = self.config.completions_url();

        log::debug!(
            "POST {} model={} messages={} tools={} stream={}",
            url,
            request.model,
            request.messages.len(),
            request.tools.len(),
            request.options.stream
        );

        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        let error_text = response.text().await.unwrap_or_default();
        log::warn!("endpoint returned {}: {}", status, error_text);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LLMError::Auth(error_text),
            StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimited { retry_after },
            _ => LLMError::Api {
                status: status.as_u16(),
                message: error_text,
            },
        })
    }

    /// Send a non-streaming request
    pub async fn send_request(&self, mut request: ChatRequest) -> Result<ChatResponse> {
        request.options.stream = false;
        let response = self.post(&request).await?;

        let response_data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        Ok(self.transformer.parse_response(&response_data)?)
    }

    /// Send a streaming request; the stream ends at the `[DONE]` sentinel
    pub async fn send_stream_request(&self, mut request: ChatRequest) -> Result<LLMStream> {
        request.options.stream = true;
        let response = self.post(&request).await?;

        let transformer = self.transformer.clone();
        let stream = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                future::ready(!matches!(event, Ok(e) if e.data.trim() == "[DONE]"))
            })
            .flat_map(move |event| {
                let items: Vec<Result<ChatChunk>> = match event {
                    Ok(event) => match transformer.parse_stream_chunk(&event.data) {
                        Ok(chunks) => chunks.into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(LLMError::Transform(e))],
                    },
                    Err(e) => vec![Err(LLMError::Stream(e.to_string()))],
                };
                stream::iter(items)
            });

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl<T: SchemaTransformer + 'static> LLMProvider for BaseProvider<T> {
    fn provider_id(&self) -> &str {
        &self.config.provider_id
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.send_request(request).await
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream> {
        self.send_stream_request(request).await
    }

    async fn validate(&self) -> Result<()> {
        if self.config.base_url.trim().is_empty() {
            return Err(LLMError::Config("base_url is empty".to_string()));
        }
        reqwest::Url::parse(&self.config.completions_url())
            .map_err(|e| LLMError::Config(format!("Invalid base_url: {}", e)))?;
        let _ = self.build_headers().await?;
        Ok(())
    }
}
