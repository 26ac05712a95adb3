use cinder_llm::LLMError;
use cinder_mcp::RegistryError;
use cinder_tool::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    /// Connecting to or listing the tool registry failed before the first model call
    #[error("tool registry unavailable: {0}")]
    RegistryUnavailable(#[source] RegistryError),

    #[error("model endpoint error: {0}")]
    Endpoint(#[from] LLMError),

    #[error("tool '{tool}' returned unsupported content type '{kind}'")]
    UnsupportedContentType { tool: String, kind: String },
}

impl From<BridgeError> for AgentError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::UnsupportedContentType { tool, kind } => Self::UnsupportedContentType { tool, kind },
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
