pub mod types;
pub mod chat;
pub mod telemetry;
pub mod broadcast;
pub mod cancel;

pub use types::{
    Message,
    MessageId,
    MessageStatus,
    Role,
    Content,
    ContentPart,
    ImageSource,
    ToolCall,
    ToolDefinition,
    ToolDescriptor,
};

pub use chat::{
    ChatRequest,
    ChatResponse,
    ChatChunk,
    ChatOptions,
    ChatUsage,
    FinishReason,
    StreamAccumulator,
};

pub use telemetry::{
    Clock,
    ManualClock,
    SampleKey,
    SpeedUpdate,
    SystemClock,
    TokenSpeedSample,
    TokenSpeedTracker,
};

pub use broadcast::{
    BroadcastSink,
    ChannelObserver,
    MessageEvent,
    MessageObserver,
    ObserverError,
    ObserverId,
    StreamDelta,
};

pub use cancel::CancellationRegistry;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
