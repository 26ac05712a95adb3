//! cinder-tool - Tool bridge for the conversation driver
//!
//! This crate provides:
//! - Mapping of registry tool descriptors to chat-completions tool definitions
//! - Tool invocation with result normalization into tool messages
//! - An in-process tool registry for locally implemented tools

pub mod bridge;
pub mod error;
pub mod registry;

pub use bridge::{map_tool_list_to_protocol, ToolBridge, ToolCallOutcome};
pub use error::{BridgeError, Result, ToolError};
pub use registry::{FnTool, LocalToolRegistry, ToolHandler};

/// Re-export async_trait for implementers
pub use async_trait::async_trait;
