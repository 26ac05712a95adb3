//! Conversation driver: the bounded call-model, run-tools loop of one turn.

pub mod config;
pub mod context;
pub mod driver;
pub mod error;

pub use config::DriverConfig;
pub use context::{Termination, TurnContext, TurnOutcome};
pub use driver::ConversationDriver;
pub use error::{AgentError, Result};
