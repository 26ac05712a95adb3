use std::sync::Arc;

use cinder_core::chat::ChatUsage;
use cinder_core::types::{Message, Role, ToolDescriptor};
use cinder_mcp::RegistryTransport;
use tokio_util::sync::CancellationToken;

/// Everything one turn owns.
///
/// Each thread brings its own registry connection and cancellation token, so
/// turns of different threads can run side by side on one driver.
pub struct TurnContext {
    pub thread_id: String,
    pub registry: Arc<dyn RegistryTransport>,
    pub cancel: CancellationToken,
    /// Tools the registry advertised at the start of the turn
    pub tools: Vec<ToolDescriptor>,
}

impl TurnContext {
    pub fn new(thread_id: impl Into<String>, registry: Arc<dyn RegistryTransport>) -> Self {
        Self {
            thread_id: thread_id.into(),
            registry,
            cancel: CancellationToken::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("thread_id", &self.thread_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("tools", &self.tools.len())
            .finish()
    }
}

/// Why a turn stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The model answered with finish reason `stop`
    Completed,
    /// Every allowed model call was used without a `stop`
    IterationCapReached,
    Cancelled,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::IterationCapReached => "iteration_cap_reached",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Caller's messages followed by everything the turn appended
    pub messages: Vec<Message>,
    pub termination: Termination,
    /// Model calls made
    pub iterations: usize,
    pub usage: ChatUsage,
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        self.termination == Termination::Completed
    }

    /// Last assistant message, usually the answer
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }
}
