//! The bounded tool loop.
//!
//! One turn: ask the model, append its reply, run the tool calls it asked for
//! in order, and ask again until it says `stop`, the iteration cap is hit, or
//! the turn is cancelled. Every message the turn appends is finalized first
//! and published to the broadcast sink.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cinder_core::broadcast::{BroadcastSink, MessageEvent, StreamDelta};
use cinder_core::chat::{ChatChunk, ChatOptions, ChatRequest, ChatResponse, ChatUsage, StreamAccumulator};
use cinder_core::telemetry::TokenSpeedTracker;
use cinder_core::types::{Message, ToolDefinition};
use cinder_llm::{LLMError, LLMProvider};
use cinder_observability::{create_iteration_span, create_tool_span, create_turn_span};
use cinder_tool::{map_tool_list_to_protocol, ToolBridge};
use futures::StreamExt;
use serde_json::json;
use tracing::{debug, info, warn, Instrument};

use crate::config::DriverConfig;
use crate::context::{Termination, TurnContext, TurnOutcome};
use crate::error::{AgentError, Result};

pub struct ConversationDriver {
    provider: Arc<dyn LLMProvider>,
    telemetry: Arc<TokenSpeedTracker>,
    sink: Arc<BroadcastSink>,
    config: DriverConfig,
}

/// Partial state of a turn, handed back as-is on cancellation
struct TurnState {
    messages: Vec<Message>,
    iterations: usize,
    usage: ChatUsage,
}

impl TurnState {
    fn finish(self, termination: Termination) -> TurnOutcome {
        TurnOutcome {
            messages: self.messages,
            termination,
            iterations: self.iterations,
            usage: self.usage,
        }
    }
}

impl ConversationDriver {
    pub fn new(provider: Arc<dyn LLMProvider>, telemetry: Arc<TokenSpeedTracker>, sink: Arc<BroadcastSink>) -> Self {
        Self {
            provider,
            telemetry,
            sink,
            config: DriverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Arc<TokenSpeedTracker> {
        &self.telemetry
    }

    pub fn sink(&self) -> &Arc<BroadcastSink> {
        &self.sink
    }

    /// Run one turn over `messages` against `model`.
    ///
    /// Returns the caller's messages followed by every assistant and tool
    /// message the turn produced, in order.
    pub async fn run(&self, messages: Vec<Message>, model: &str, ctx: &mut TurnContext) -> Result<TurnOutcome> {
        let span = create_turn_span(&ctx.thread_id, model);
        self.run_turn(messages, model, ctx).instrument(span).await
    }

    async fn run_turn(&self, messages: Vec<Message>, model: &str, ctx: &mut TurnContext) -> Result<TurnOutcome> {
        self.load_tools(ctx).await?;
        let tools = map_tool_list_to_protocol(&ctx.tools);

        let mut state = TurnState {
            messages,
            iterations: 0,
            usage: ChatUsage::default(),
        };

        while state.iterations < self.config.max_iterations {
            if ctx.is_cancelled() {
                info!(iterations = state.iterations, "turn cancelled");
                return Ok(state.finish(Termination::Cancelled));
            }

            state.iterations += 1;
            let request = self.build_request(model, &state.messages, &tools);

            let completion = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    self.telemetry.reset_stream(&ctx.thread_id);
                    info!(iterations = state.iterations, "turn cancelled while waiting for the model");
                    return Ok(state.finish(Termination::Cancelled));
                }
                completion = self
                    .complete(request, &ctx.thread_id)
                    .instrument(create_iteration_span(state.iterations)) => completion,
            };

            let completion = match completion {
                Ok(completion) => completion,
                Err(e) => {
                    self.telemetry.reset_stream(&ctx.thread_id);
                    return Err(AgentError::Endpoint(e));
                }
            };
            state.usage.add(&completion.response.usage);

            let finish_reason = completion.response.finish_reason;
            let tool_calls = completion.response.tool_calls.clone();
            let assistant = self.finalize_reply(&completion, &ctx.thread_id);
            self.emit(&mut state.messages, &ctx.thread_id, assistant);

            if finish_reason.is_stop() {
                debug!(iterations = state.iterations, "model finished the turn");
                return Ok(state.finish(Termination::Completed));
            }

            for call in &tool_calls {
                if ctx.is_cancelled() {
                    info!(tool = %call.name, "turn cancelled before tool call");
                    return Ok(state.finish(Termination::Cancelled));
                }

                let execution =
                    ToolBridge::execute(ctx.registry.as_ref(), call).instrument(create_tool_span(&call.name, &call.id));
                let tool_message = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        info!(tool = %call.name, "turn cancelled during tool call");
                        return Ok(state.finish(Termination::Cancelled));
                    }
                    result = execution => result?,
                };

                self.emit(&mut state.messages, &ctx.thread_id, tool_message.finalize());
            }
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "iteration cap reached before the model finished the turn"
        );
        Ok(state.finish(Termination::IterationCapReached))
    }

    async fn load_tools(&self, ctx: &mut TurnContext) -> Result<()> {
        ctx.registry.connect().await.map_err(AgentError::RegistryUnavailable)?;
        ctx.tools = ctx.registry.list_tools().await.map_err(AgentError::RegistryUnavailable)?;
        debug!(tools = ctx.tools.len(), "registry tools loaded");
        Ok(())
    }

    fn build_request(&self, model: &str, messages: &[Message], tools: &[ToolDefinition]) -> ChatRequest {
        ChatRequest::new(model)
            .with_messages(messages.to_vec())
            .with_tools(tools.to_vec())
            .with_options(
                ChatOptions::new()
                    .with_temperature(self.config.temperature)
                    .with_streaming(self.config.stream),
            )
    }

    /// One model call, streamed or not, folded into a complete response
    async fn complete(&self, request: ChatRequest, thread_id: &str) -> std::result::Result<Completion, LLMError> {
        let started_at = self.telemetry.now();
        let response = if self.config.stream {
            self.stream_response(request, thread_id).await?
        } else {
            self.provider.chat(request).await?
        };
        Ok(Completion { response, started_at })
    }

    async fn stream_response(&self, request: ChatRequest, thread_id: &str) -> std::result::Result<ChatResponse, LLMError> {
        let mut stream = self.provider.chat_stream(request).await?;
        let mut accumulator = StreamAccumulator::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            match &chunk {
                ChatChunk::Error { message } => return Err(LLMError::Stream(message.clone())),
                ChatChunk::Content { text } if !text.is_empty() => {
                    self.telemetry.on_stream_token(thread_id);
                    self.sink.publish_delta(StreamDelta {
                        thread_id: thread_id.to_string(),
                        text: text.clone(),
                    });
                }
                _ => {}
            }
            accumulator.push(&chunk);
        }

        Ok(accumulator.finish())
    }

    /// Build the finalized assistant message and settle its telemetry
    fn finalize_reply(&self, completion: &Completion, thread_id: &str) -> Message {
        let message = completion.response.to_message();

        let sample = if self.config.stream {
            self.telemetry.transfer_stream_to_message(thread_id, &message.id);
            self.telemetry.message_speed(&message.id)
        } else {
            Some(self.telemetry.record_completed(
                &message.id,
                u64::from(completion.response.usage.output_tokens),
                completion.started_at,
            ))
        };

        let message = match sample {
            Some(sample) => message.with_metadata("token_speed", json!(sample.tokens_per_second)),
            None => message,
        };
        message.finalize()
    }

    fn emit(&self, messages: &mut Vec<Message>, thread_id: &str, message: Message) {
        self.sink.publish(&MessageEvent::new(thread_id, message.clone()));
        messages.push(message);
    }
}

struct Completion {
    response: ChatResponse,
    started_at: DateTime<Utc>,
}
