pub mod message;
pub mod tool;
pub mod content;

pub use message::{Message, MessageId, MessageStatus, Role};
pub use tool::{ToolCall, ToolDefinition, ToolDescriptor};
pub use content::{Content, ContentPart, ImageSource};
