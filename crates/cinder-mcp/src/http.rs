use async_trait::async_trait;
use cinder_core::types::ToolDescriptor;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{RegistryError, RegistryResult};
use crate::protocol::{
    CallToolResult, ClientInfo, InitializeParams, InitializeResult, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, ListToolsResult, LATEST_PROTOCOL_VERSION,
};
use crate::sse::{is_event_stream_content_type, read_sse_response};
use crate::transport::RegistryTransport;

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Upper bound on `tools/list` pages followed in one call
const MAX_LIST_PAGES: usize = 32;

#[derive(Debug, Clone)]
pub struct HttpRegistryConfig {
    pub url: String,
    pub timeout: Duration,
    pub client_name: String,
    pub client_version: String,
}

impl HttpRegistryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }
}

impl Default for HttpRegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/mcp".to_string(),
            timeout: Duration::from_secs(30),
            client_name: "cinder-mcp-client".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    connected: bool,
    session_id: Option<String>,
    protocol_version: Option<String>,
}

/// Registry client over the streamable HTTP transport
pub struct HttpRegistryClient {
    config: HttpRegistryConfig,
    http: reqwest::Client,
    next_id: AtomicU64,
    state: RwLock<SessionState>,
}

impl HttpRegistryClient {
    pub fn new(config: HttpRegistryConfig) -> RegistryResult<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http,
            next_id: AtomicU64::new(1),
            state: RwLock::new(SessionState::default()),
        })
    }

    pub fn config(&self) -> &HttpRegistryConfig {
        &self.config
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.read().session_id.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().connected
    }

    fn headers(&self) -> HeaderMap {
        let state = self.state.read();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/event-stream"));

        let version = state.protocol_version.as_deref().unwrap_or(LATEST_PROTOCOL_VERSION);
        if let Ok(value) = HeaderValue::from_str(version) {
            headers.insert(PROTOCOL_VERSION_HEADER, value);
        }
        if let Some(value) = state.session_id.as_deref().and_then(|s| HeaderValue::from_str(s).ok()) {
            headers.insert(SESSION_HEADER, value);
        }
        headers
    }

    async fn post<T: Serialize>(&self, body: &T) -> RegistryResult<reqwest::Response> {
        let response = self
            .http
            .post(&self.config.url)
            .headers(self.headers())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::Http {
                status: status.as_u16(),
                message,
            });
        }

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.state.write().session_id = Some(session_id.to_string());
        }

        Ok(response)
    }

    async fn request(&self, method: &str, params: Option<Value>) -> RegistryResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        tracing::debug!(id, method, "registry request");

        let response = self.post(&request).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let message = if is_event_stream_content_type(&content_type) {
            read_sse_response(response, id).await?
        } else {
            let bytes = response.bytes().await?;
            let message: JsonRpcMessage = serde_json::from_slice(&bytes)?;
            if !message.answers(id) {
                return Err(RegistryError::Protocol(format!(
                    "response id {:?} does not match request {}",
                    message.id, id
                )));
            }
            message
        };

        if let Some(error) = message.error {
            return Err(RegistryError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        message
            .result
            .ok_or_else(|| RegistryError::Protocol(format!("{} response has no result", method)))
    }

    async fn notify(&self, method: &str) -> RegistryResult<()> {
        self.post(&JsonRpcNotification::new(method)).await?;
        Ok(())
    }

    fn ensure_connected(&self) -> RegistryResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(RegistryError::NotConnected)
        }
    }
}

#[async_trait]
impl RegistryTransport for HttpRegistryClient {
    async fn connect(&self) -> RegistryResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info: ClientInfo {
                name: self.config.client_name.clone(),
                version: self.config.client_version.clone(),
            },
        };
        let result = self.request("initialize", Some(serde_json::to_value(params)?)).await?;
        let initialize: InitializeResult = serde_json::from_value(result)?;
        self.state.write().protocol_version = Some(initialize.protocol_version.clone());

        self.notify("notifications/initialized").await?;
        self.state.write().connected = true;

        tracing::info!(
            url = %self.config.url,
            protocol_version = %initialize.protocol_version,
            session = ?self.session_id(),
            "connected to tool registry"
        );
        Ok(())
    }

    async fn list_tools(&self) -> RegistryResult<Vec<ToolDescriptor>> {
        self.ensure_connected()?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        tracing::warn!(pages = MAX_LIST_PAGES, "tools/list pagination truncated");
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> RegistryResult<CallToolResult> {
        self.ensure_connected()?;

        let result = self
            .request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}
