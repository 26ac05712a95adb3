use async_trait::async_trait;
use cinder_core::types::ToolDescriptor;
use serde_json::Value;

use crate::error::RegistryResult;
use crate::protocol::CallToolResult;

/// Connection to a tool registry.
///
/// `connect` must succeed before the other calls; implementations return
/// [`RegistryError::NotConnected`](crate::RegistryError::NotConnected)
/// otherwise. Connecting twice is a no-op.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    async fn connect(&self) -> RegistryResult<()>;

    /// Every tool the registry advertises, in registry order
    async fn list_tools(&self) -> RegistryResult<Vec<ToolDescriptor>>;

    async fn call_tool(&self, name: &str, arguments: Value) -> RegistryResult<CallToolResult>;
}
