use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("registry returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("registry not connected")]
    NotConnected,

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
