use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cinder_agent::{AgentError, ConversationDriver, DriverConfig, Termination, TurnContext};
use cinder_core::broadcast::{BroadcastSink, MessageEvent, MessageObserver, ObserverError};
use cinder_core::chat::{ChatChunk, ChatRequest, ChatResponse, ChatUsage, FinishReason};
use cinder_core::telemetry::TokenSpeedTracker;
use cinder_core::types::{Message, MessageStatus, Role, ToolCall, ToolDescriptor};
use cinder_llm::{LLMError, LLMProvider, LLMStream, ProviderCapabilities, ProviderMetadata};
use cinder_mcp::{CallToolResult, RegistryContent, RegistryError, RegistryResult, RegistryTransport};
use cinder_tool::{FnTool, LocalToolRegistry};
use parking_lot::Mutex;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Provider replaying scripted replies; the last reply repeats once the script runs out
struct ScriptedProvider {
    replies: Mutex<VecDeque<ChatResponse>>,
    repeat: Option<ChatResponse>,
    requests: Mutex<Vec<ChatRequest>>,
    metadata: ProviderMetadata,
}

impl ScriptedProvider {
    fn new(replies: Vec<ChatResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            metadata: ProviderMetadata {
                id: "scripted".to_string(),
                name: "Scripted Provider".to_string(),
                capabilities: ProviderCapabilities::default(),
            },
        }
    }

    fn repeating(reply: ChatResponse) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat = Some(reply);
        provider
    }

    fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn request(&self, index: usize) -> ChatRequest {
        self.requests.lock()[index].clone()
    }

    fn next_reply(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .or_else(|| self.repeat.clone())
            .ok_or_else(|| LLMError::Api {
                status: 500,
                message: "script exhausted".to_string(),
            })
    }
}

fn chunks_for(response: &ChatResponse) -> Vec<ChatChunk> {
    let mut chunks = vec![ChatChunk::Start {
        id: response.id.clone(),
        model: response.model.clone(),
    }];
    chunks.extend(response.content.chars().map(|c| ChatChunk::content(c.to_string())));
    for (index, call) in response.tool_calls.iter().enumerate() {
        chunks.push(ChatChunk::ToolCallStart {
            index,
            call_id: call.id.clone(),
            name: call.name.clone(),
        });
        chunks.push(ChatChunk::ToolCallDelta {
            index,
            arguments_delta: call.arguments.clone(),
        });
    }
    chunks.push(ChatChunk::Usage {
        input_tokens: response.usage.input_tokens,
        output_tokens: response.usage.output_tokens,
    });
    chunks.push(ChatChunk::finish(response.finish_reason));
    chunks
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn provider_id(&self) -> &str {
        "scripted"
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        self.next_reply(request)
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream, LLMError> {
        let reply = self.next_reply(request)?;
        let chunks: Vec<Result<ChatChunk, LLMError>> = chunks_for(&reply).into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn validate(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

/// Provider that never answers
struct HangingProvider {
    metadata: ProviderMetadata,
}

#[async_trait]
impl LLMProvider for HangingProvider {
    fn provider_id(&self) -> &str {
        "hanging"
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LLMError> {
        futures::future::pending().await
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<LLMStream, LLMError> {
        futures::future::pending().await
    }

    async fn validate(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

/// Streams an echo of the last user message, yielding to the runtime between chunks
struct EchoStreamProvider {
    metadata: ProviderMetadata,
}

impl EchoStreamProvider {
    fn new() -> Self {
        Self {
            metadata: ProviderMetadata {
                id: "echo".to_string(),
                name: "Echo Provider".to_string(),
                capabilities: ProviderCapabilities::default(),
            },
        }
    }

    fn reply_for(request: &ChatRequest) -> ChatResponse {
        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text_content())
            .unwrap_or_default();
        text_reply(&prompt.to_uppercase())
    }
}

#[async_trait]
impl LLMProvider for EchoStreamProvider {
    fn provider_id(&self) -> &str {
        "echo"
    }

    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        Ok(Self::reply_for(&request))
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream, LLMError> {
        let chunks = chunks_for(&Self::reply_for(&request));
        let stream = futures::stream::iter(chunks).then(|chunk| async move {
            tokio::task::yield_now().await;
            Ok::<_, LLMError>(chunk)
        });
        Ok(Box::pin(stream))
    }

    async fn validate(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

struct UnreachableRegistry;

#[async_trait]
impl RegistryTransport for UnreachableRegistry {
    async fn connect(&self) -> RegistryResult<()> {
        Err(RegistryError::Http {
            status: 503,
            message: "registry is down".to_string(),
        })
    }

    async fn list_tools(&self) -> RegistryResult<Vec<ToolDescriptor>> {
        Err(RegistryError::NotConnected)
    }

    async fn call_tool(&self, _name: &str, _arguments: Value) -> RegistryResult<CallToolResult> {
        Err(RegistryError::NotConnected)
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<MessageEvent>>,
}

impl Recorder {
    fn messages(&self) -> Vec<Message> {
        self.events.lock().iter().map(|e| e.message.clone()).collect()
    }
}

impl MessageObserver for Recorder {
    fn on_message(&self, event: &MessageEvent) -> Result<(), ObserverError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

fn text_reply(text: &str) -> ChatResponse {
    ChatResponse::new("resp", "mock", text)
        .with_usage(ChatUsage::new(12, 6))
        .with_finish_reason(FinishReason::Stop)
}

fn tool_reply(calls: Vec<ToolCall>) -> ChatResponse {
    ChatResponse::new("resp", "mock", "")
        .with_tool_calls(calls)
        .with_usage(ChatUsage::new(10, 4))
        .with_finish_reason(FinishReason::ToolCalls)
}

fn calc_registry() -> LocalToolRegistry {
    let registry = LocalToolRegistry::new();
    registry.register(Arc::new(
        FnTool::new("calc", "Evaluate a sum of two numbers", |args| {
            let a = args["a"].as_i64().unwrap_or_default();
            let b = args["b"].as_i64().unwrap_or_default();
            Ok(CallToolResult::text((a + b).to_string()))
        })
        .with_input_schema(json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
            "required": ["a", "b"]
        })),
    ));
    registry.register(Arc::new(FnTool::new("silent", "Returns nothing", |_| {
        Ok(CallToolResult::empty())
    })));
    registry.register(Arc::new(FnTool::new("snapshot", "Returns an image", |_| {
        Ok(CallToolResult {
            content: vec![RegistryContent::Image {
                data: "aGk=".to_string(),
                mime_type: "image/png".to_string(),
            }],
            is_error: false,
        })
    })));
    registry
}

struct Harness {
    driver: ConversationDriver,
    telemetry: Arc<TokenSpeedTracker>,
    sink: Arc<BroadcastSink>,
    recorder: Arc<Recorder>,
}

fn harness(provider: Arc<dyn LLMProvider>, config: DriverConfig) -> Harness {
    let telemetry = Arc::new(TokenSpeedTracker::new());
    let sink = Arc::new(BroadcastSink::new());
    let recorder = Arc::new(Recorder::default());
    sink.subscribe(recorder.clone());
    let driver = ConversationDriver::new(provider, telemetry.clone(), sink.clone()).with_config(config);
    Harness {
        driver,
        telemetry,
        sink,
        recorder,
    }
}

fn context(registry: LocalToolRegistry) -> TurnContext {
    TurnContext::new("thread-1", Arc::new(registry))
}

#[tokio::test]
async fn test_plain_answer_finishes_in_one_call() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_reply("4")]));
    let h = harness(provider.clone(), DriverConfig::default());
    let mut ctx = context(calc_registry());

    let outcome = h
        .driver
        .run(vec![Message::user("What's 2+2?")], "llama3", &mut ctx)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.messages.len(), 2);
    assert_eq!(outcome.messages[1].role, Role::Assistant);
    assert_eq!(outcome.messages[1].status, MessageStatus::Ready);
    assert_eq!(outcome.usage, ChatUsage::new(12, 6));
    assert_eq!(provider.call_count(), 1);

    let published = h.recorder.messages();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].id, outcome.messages[1].id);
    assert!(h.telemetry.message_speed(&published[0].id).is_some());
}

#[tokio::test]
async fn test_request_carries_tools_and_temperature() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_reply("done")]));
    let h = harness(provider.clone(), DriverConfig::default());
    let mut ctx = context(calc_registry());

    h.driver.run(vec![Message::user("hi")], "llama3", &mut ctx).await.unwrap();

    let request = provider.request(0);
    assert_eq!(request.model, "llama3");
    assert_eq!(request.options.temperature, Some(0.2));
    assert!(!request.options.stream);
    let names: Vec<&str> = request.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["calc", "silent", "snapshot"]);
    assert_eq!(request.tools[0].parameters["required"], json!(["a", "b"]));
    assert_eq!(ctx.tools.len(), 3);
}

#[tokio::test]
async fn test_tool_call_round_trip() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_reply(vec![ToolCall::new("call_1", "calc", r#"{"a":2,"b":2}"#)]),
        text_reply("2+2 is 4"),
    ]));
    let h = harness(provider.clone(), DriverConfig::default());
    let mut ctx = context(calc_registry());

    let outcome = h
        .driver
        .run(vec![Message::user("What's 2+2?")], "llama3", &mut ctx)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(provider.call_count(), 2);

    let roles: Vec<Role> = outcome.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    assert!(outcome.messages[1].has_tool_calls());

    let tool_message = &outcome.messages[2];
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(tool_message.text_content(), "4");
    assert_eq!(tool_message.status, MessageStatus::Ready);

    // 第二次请求带上了工具结果
    let second = provider.request(1);
    assert_eq!(second.messages.len(), 3);
    assert_eq!(second.messages[2].text_content(), "4");

    assert_eq!(h.recorder.messages().len(), 3);
    assert_eq!(outcome.usage, ChatUsage::new(22, 10));
}

#[tokio::test]
async fn test_malformed_arguments_become_error_message() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_reply(vec![ToolCall::new("call_1", "calc", "{a: 2")]),
        text_reply("sorry"),
    ]));
    let h = harness(provider.clone(), DriverConfig::default());
    let mut ctx = context(calc_registry());

    let outcome = h.driver.run(vec![Message::user("add")], "llama3", &mut ctx).await.unwrap();

    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(provider.call_count(), 2);
    let tool_messages: Vec<&Message> = outcome.messages.iter().filter(|m| m.role == Role::Tool).collect();
    assert_eq!(tool_messages.len(), 1);
    assert!(tool_messages[0]
        .text_content()
        .starts_with("ERROR: Tool call failed - "));
}

#[tokio::test]
async fn test_empty_tool_content_becomes_warning() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_reply(vec![ToolCall::new("call_1", "silent", "")]),
        text_reply("ok"),
    ]));
    let h = harness(provider, DriverConfig::default());
    let mut ctx = context(calc_registry());

    let outcome = h.driver.run(vec![Message::user("go")], "llama3", &mut ctx).await.unwrap();

    let tool_messages: Vec<String> = outcome
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.text_content())
        .collect();
    assert_eq!(tool_messages, vec!["WARNING: No content returned from tool".to_string()]);
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_the_model() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_reply(vec![ToolCall::new("call_1", "weather", "{}")]),
        text_reply("no weather tool"),
    ]));
    let h = harness(provider, DriverConfig::default());
    let mut ctx = context(calc_registry());

    let outcome = h.driver.run(vec![Message::user("weather?")], "llama3", &mut ctx).await.unwrap();
    assert_eq!(
        outcome.messages[2].text_content(),
        "ERROR: Tool call failed - tool not found: weather"
    );
}

#[tokio::test]
async fn test_iteration_cap() {
    let provider = Arc::new(ScriptedProvider::repeating(tool_reply(vec![ToolCall::new(
        "call_1",
        "calc",
        r#"{"a":1,"b":1}"#,
    )])));
    let h = harness(provider.clone(), DriverConfig::default());
    let mut ctx = context(calc_registry());

    let outcome = h.driver.run(vec![Message::user("loop")], "llama3", &mut ctx).await.unwrap();

    assert_eq!(outcome.termination, Termination::IterationCapReached);
    assert_eq!(outcome.iterations, 10);
    assert_eq!(provider.call_count(), 10);
    assert_eq!(outcome.messages.len(), 1 + 10 * 2);
    assert_eq!(h.recorder.messages().len(), 20);
}

#[tokio::test]
async fn test_non_stop_reply_without_tools_keeps_looping() {
    let length_reply = ChatResponse::new("resp", "mock", "partial").with_finish_reason(FinishReason::Length);
    let provider = Arc::new(ScriptedProvider::repeating(length_reply));
    let h = harness(provider.clone(), DriverConfig::new().with_max_iterations(3));
    let mut ctx = context(calc_registry());

    let outcome = h.driver.run(vec![Message::user("go")], "llama3", &mut ctx).await.unwrap();

    assert_eq!(outcome.termination, Termination::IterationCapReached);
    assert_eq!(provider.call_count(), 3);
    assert_eq!(outcome.messages.len(), 4);
}

#[tokio::test]
async fn test_registry_failure_stops_before_model() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_reply("unused")]));
    let h = harness(provider.clone(), DriverConfig::default());
    let mut ctx = TurnContext::new("thread-1", Arc::new(UnreachableRegistry));

    let err = h
        .driver
        .run(vec![Message::user("hi")], "llama3", &mut ctx)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AgentError::RegistryUnavailable(RegistryError::Http { status: 503, .. })
    ));
    assert_eq!(provider.call_count(), 0);
    assert!(h.recorder.messages().is_empty());
    assert!(h.telemetry.is_empty());
}

#[tokio::test]
async fn test_endpoint_error_is_fatal() {
    let provider = Arc::new(ScriptedProvider::new(Vec::new()));
    let h = harness(provider, DriverConfig::default());
    let mut ctx = context(calc_registry());

    let err = h.driver.run(vec![Message::user("hi")], "llama3", &mut ctx).await.unwrap_err();
    assert!(matches!(err, AgentError::Endpoint(LLMError::Api { status: 500, .. })));
    assert!(h.recorder.messages().is_empty());
}

#[tokio::test]
async fn test_unsupported_content_aborts_turn() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_reply(vec![ToolCall::new("call_1", "snapshot", "{}")]),
        text_reply("unused"),
    ]));
    let h = harness(provider.clone(), DriverConfig::default());
    let mut ctx = context(calc_registry());

    let err = h.driver.run(vec![Message::user("look")], "llama3", &mut ctx).await.unwrap_err();

    match err {
        AgentError::UnsupportedContentType { tool, kind } => {
            assert_eq!(tool, "snapshot");
            assert_eq!(kind, "image");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(provider.call_count(), 1);
    // 只有 assistant 消息被发布
    assert_eq!(h.recorder.messages().len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_reply("unused")]));
    let h = harness(provider.clone(), DriverConfig::default());
    let token = CancellationToken::new();
    token.cancel();
    let mut ctx = context(calc_registry()).with_cancellation(token);

    let outcome = h.driver.run(vec![Message::user("hi")], "llama3", &mut ctx).await.unwrap();

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.messages.len(), 1);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_cancel_interrupts_model_call() {
    let provider = Arc::new(HangingProvider {
        metadata: ProviderMetadata {
            id: "hanging".to_string(),
            name: "Hanging".to_string(),
            capabilities: ProviderCapabilities::default(),
        },
    });
    let h = harness(provider, DriverConfig::default());
    let token = CancellationToken::new();
    let mut ctx = context(calc_registry()).with_cancellation(token.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        h.driver.run(vec![Message::user("hi")], "llama3", &mut ctx),
    )
    .await
    .expect("driver should stop on cancel")
    .unwrap();

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.messages.len(), 1);
    assert!(h.recorder.messages().is_empty());
}

#[tokio::test]
async fn test_cancel_between_tool_calls_keeps_partial_list() {
    let token = CancellationToken::new();
    let registry = calc_registry();
    let trigger = token.clone();
    registry.register(Arc::new(FnTool::new("stop_button", "Cancels the turn", move |_| {
        trigger.cancel();
        Ok(CallToolResult::text("pressed"))
    })));

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_reply(vec![
            ToolCall::new("call_1", "stop_button", "{}"),
            ToolCall::new("call_2", "calc", r#"{"a":1,"b":2}"#),
        ]),
        text_reply("unused"),
    ]));
    let h = harness(provider.clone(), DriverConfig::default());
    let mut ctx = context(registry).with_cancellation(token);

    let outcome = h.driver.run(vec![Message::user("press")], "llama3", &mut ctx).await.unwrap();

    assert_eq!(outcome.termination, Termination::Cancelled);
    let roles: Vec<Role> = outcome.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
    assert_eq!(outcome.messages[2].text_content(), "pressed");
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_streaming_publishes_deltas_and_speed() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_reply("Hi there")]));
    let h = harness(provider.clone(), DriverConfig::new().with_streaming(true));
    let mut deltas = h.sink.subscribe_deltas();
    let mut ctx = context(calc_registry());

    let outcome = h.driver.run(vec![Message::user("hello")], "llama3", &mut ctx).await.unwrap();

    assert_eq!(outcome.termination, Termination::Completed);
    assert!(provider.request(0).options.stream);

    let mut streamed = String::new();
    while let Ok(delta) = deltas.try_recv() {
        assert_eq!(delta.thread_id, "thread-1");
        streamed.push_str(&delta.text);
    }
    assert_eq!(streamed, "Hi there");

    let answer = &outcome.messages[1];
    assert_eq!(answer.text_content(), "Hi there");
    assert!(answer.metadata.contains_key("token_speed"));

    // 流式样本已经转移到消息上
    assert!(h.telemetry.stream_speed("thread-1").is_none());
    let sample = h.telemetry.message_speed(&answer.id).unwrap();
    assert_eq!(sample.token_count, 8);
}

#[tokio::test]
async fn test_streaming_tool_calls_are_reassembled() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_reply(vec![ToolCall::new("call_1", "calc", r#"{"a":3,"b":4}"#)]),
        text_reply("7"),
    ]));
    let h = harness(provider, DriverConfig::new().with_streaming(true));
    let mut ctx = context(calc_registry());

    let outcome = h.driver.run(vec![Message::user("3+4")], "llama3", &mut ctx).await.unwrap();

    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.messages[2].text_content(), "7");
    assert_eq!(outcome.messages[3].text_content(), "7");
}

#[tokio::test]
async fn test_concurrent_turns_keep_their_own_samples() {
    let h = harness(Arc::new(EchoStreamProvider::new()), DriverConfig::new().with_streaming(true));
    let mut deltas = h.sink.subscribe_deltas();
    let mut ctx_a = TurnContext::new("thread-a", Arc::new(calc_registry()));
    let mut ctx_b = TurnContext::new("thread-b", Arc::new(calc_registry()));

    let (a, b) = tokio::join!(
        h.driver.run(vec![Message::user("short")], "llama3", &mut ctx_a),
        h.driver.run(vec![Message::user("a much longer prompt")], "llama3", &mut ctx_b),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.termination, Termination::Completed);
    assert_eq!(b.termination, Termination::Completed);
    assert_eq!(a.messages[1].text_content(), "SHORT");
    assert_eq!(b.messages[1].text_content(), "A MUCH LONGER PROMPT");

    // 每个 thread 的样本只落在自己的消息上
    let sample_a = h.telemetry.message_speed(&a.messages[1].id).unwrap();
    let sample_b = h.telemetry.message_speed(&b.messages[1].id).unwrap();
    assert_eq!(sample_a.token_count, 5);
    assert_eq!(sample_b.token_count, 20);
    assert!(h.telemetry.stream_speed("thread-a").is_none());
    assert!(h.telemetry.stream_speed("thread-b").is_none());
    assert_eq!(h.telemetry.len(), 2);

    let mut streamed_a = String::new();
    let mut streamed_b = String::new();
    while let Ok(delta) = deltas.try_recv() {
        match delta.thread_id.as_str() {
            "thread-a" => streamed_a.push_str(&delta.text),
            "thread-b" => streamed_b.push_str(&delta.text),
            other => panic!("delta for unexpected thread {}", other),
        }
    }
    assert_eq!(streamed_a, "SHORT");
    assert_eq!(streamed_b, "A MUCH LONGER PROMPT");

    let events = h.recorder.events.lock().clone();
    assert_eq!(events.len(), 2);
    for event in &events {
        let expected = if event.thread_id == "thread-a" { &a.messages[1] } else { &b.messages[1] };
        assert_eq!(event.message.id, expected.id);
    }
}
