pub mod config;
pub mod base;
pub mod metadata;

pub use config::{ProviderConfig, AuthConfig, DEFAULT_BASE_URL};
pub use base::BaseProvider;
pub use metadata::{ProviderMetadata, ProviderCapabilities, LLMProvider};
