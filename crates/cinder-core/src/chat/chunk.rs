/// Chat stream chunk
#[derive(Debug, Clone, PartialEq)]
pub enum ChatChunk {
    /// Stream start
    Start { id: String, model: String },
    /// Text content delta
    Content { text: String },
    /// A new tool call at position `index`
    ToolCallStart { index: usize, call_id: String, name: String },
    /// More argument text for the tool call at `index`
    ToolCallDelta { index: usize, arguments_delta: String },
    Usage { input_tokens: u32, output_tokens: u32 },
    Finish { reason: FinishReason },
    Error { message: String },
}

impl ChatChunk {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    pub fn finish(reason: FinishReason) -> Self {
        Self::Finish { reason }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Reason the endpoint gave for ending a reply.
///
/// Only `Stop` ends a conversation turn; everything else, including a missing
/// or unrecognised reason, keeps the tool loop going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    /// Absent or not one of the known values
    Unknown,
}

impl FinishReason {
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(|s| s.to_ascii_lowercase()) {
            Some(s) if s == "stop" => Self::Stop,
            Some(s) if s == "length" => Self::Length,
            Some(s) if s == "tool_calls" || s == "function_call" => Self::ToolCalls,
            Some(s) if s == "content_filter" => Self::ContentFilter,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_stop(&self) -> bool {
        *self == Self::Stop
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
