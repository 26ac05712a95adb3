pub mod request;
pub mod response;
pub mod chunk;
pub mod accumulator;

pub use request::{ChatRequest, ChatOptions};
pub use response::{ChatResponse, ChatUsage};
pub use chunk::{ChatChunk, FinishReason};
pub use accumulator::StreamAccumulator;
