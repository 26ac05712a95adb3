//! In-process tool registry

use async_trait::async_trait;
use cinder_core::types::ToolDescriptor;
use cinder_mcp::{CallToolResult, RegistryError, RegistryResult, RegistryTransport};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ToolError;

/// A tool implemented inside the process
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    async fn call(&self, arguments: Value) -> std::result::Result<CallToolResult, ToolError>;
}

type ToolFn = dyn Fn(Value) -> std::result::Result<CallToolResult, ToolError> + Send + Sync;

/// Synchronous closure-backed tool
pub struct FnTool {
    descriptor: ToolDescriptor,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> std::result::Result<CallToolResult, ToolError> + Send + Sync + 'static,
    {
        Self {
            descriptor: ToolDescriptor::new(
                name,
                Some(description.into()),
                json!({"type": "object", "properties": {}}),
            ),
            func: Box::new(func),
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.descriptor.input_schema = schema;
        self
    }
}

#[async_trait]
impl ToolHandler for FnTool {
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    async fn call(&self, arguments: Value) -> std::result::Result<CallToolResult, ToolError> {
        (self.func)(arguments)
    }
}

/// Registry of in-process tools, usable anywhere a remote registry is.
///
/// Handler errors are reported in-band (`isError`) the way a remote registry
/// reports them; only an unknown tool name is a transport error.
#[derive(Clone, Default)]
pub struct LocalToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn ToolHandler>>>,
    connected: Arc<AtomicBool>,
}

impl LocalToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(tools: Vec<Arc<dyn ToolHandler>>) -> Self {
        let registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&self, tool: Arc<dyn ToolHandler>) {
        let name = tool.descriptor().name;
        self.tools.insert(name, tool);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn ensure_connected(&self) -> RegistryResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RegistryError::NotConnected)
        }
    }
}

#[async_trait]
impl RegistryTransport for LocalToolRegistry {
    async fn connect(&self) -> RegistryResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn list_tools(&self) -> RegistryResult<Vec<ToolDescriptor>> {
        self.ensure_connected()?;
        let mut tools: Vec<ToolDescriptor> = self.tools.iter().map(|entry| entry.value().descriptor()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> RegistryResult<CallToolResult> {
        self.ensure_connected()?;
        // Clone the handler out so no map guard is held across the await
        let handler = self
            .tools
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;

        match handler.call(arguments).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "local tool failed");
                Ok(CallToolResult::error(e.to_string()))
            }
        }
    }
}
