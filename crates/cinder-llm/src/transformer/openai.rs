use cinder_core::chat::{ChatChunk, ChatRequest, ChatResponse, ChatUsage, FinishReason};
use cinder_core::types::{Content, ContentPart, Message, ToolCall, ToolDefinition};
use serde_json::{json, Value};

use crate::error::ConversionError;
use crate::transformer::SchemaTransformer;

/// OpenAI-compatible chat-completions schema
pub struct OpenAiTransformer;

impl OpenAiTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Convert internal Message to OpenAI format
    fn convert_message(&self, msg: &Message) -> Result<Value, ConversionError> {
        let mut json = json!({
            "role": msg.role.as_str(),
        });

        match &msg.content {
            // Assistant turns that only call tools send `content: null`
            Content::Text { text } if text.is_empty() && msg.has_tool_calls() => {
                json["content"] = Value::Null;
            }
            Content::Text { text } => {
                json["content"] = json!(text);
            }
            Content::Parts { parts } => {
                let content_parts: Vec<Value> = parts.iter().map(|p| self.convert_content_part(p)).collect();
                json["content"] = json!(content_parts);
            }
        }

        if let Some(tool_calls) = &msg.tool_calls {
            json["tool_calls"] = json!(tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments,
                        }
                    })
                })
                .collect::<Vec<_>>());
        }

        if let Some(tool_call_id) = &msg.tool_call_id {
            json["tool_call_id"] = json!(tool_call_id);
        }

        Ok(json)
    }

    fn convert_content_part(&self, part: &ContentPart) -> Value {
        match part {
            ContentPart::Text { text } => json!({
                "type": "text",
                "text": text,
            }),
            ContentPart::Image { source } => json!({
                "type": "image_url",
                "image_url": {
                    "url": source.to_url(),
                }
            }),
        }
    }

    fn parse_usage(usage: &Value) -> ChatUsage {
        let count = |field: &str| usage[field].as_u64().map(clamp_tokens);
        let mut parsed = ChatUsage::new(
            count("prompt_tokens").unwrap_or(0),
            count("completion_tokens").unwrap_or(0),
        );
        if let Some(total) = count("total_tokens") {
            parsed.total_tokens = total;
        }
        parsed
    }
}

/// Endpoint-reported counts beyond `u32` are clamped
fn clamp_tokens(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl Default for OpenAiTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaTransformer for OpenAiTransformer {
    fn provider_id(&self) -> &str {
        "openai"
    }

    fn transform_request(&self, request: &ChatRequest) -> Result<Value, ConversionError> {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| self.convert_message(m))
            .collect::<Result<Vec<_>, _>>()?;

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": request.options.stream,
        });

        if !request.tools.is_empty() {
            body["tools"] = self.transform_tools(&request.tools)?;
        }

        if let Some(temp) = request.options.temperature {
            body["temperature"] = json!(temp);
        }

        if let Some(max_tokens) = request.options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        Ok(body)
    }

    fn parse_stream_chunk(&self, data: &str) -> Result<Vec<ChatChunk>, ConversionError> {
        let chunk: Value = serde_json::from_str(data)?;
        let mut chunks = Vec::new();

        if let Some(error) = chunk.get("error") {
            let message = error["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            chunks.push(ChatChunk::error(message));
            return Ok(chunks);
        }

        let choice = chunk["choices"].get(0);
        let delta = choice.map(|c| &c["delta"]);

        if delta.and_then(|d| d["role"].as_str()).is_some() {
            chunks.push(ChatChunk::Start {
                id: chunk["id"].as_str().unwrap_or_default().to_string(),
                model: chunk["model"].as_str().unwrap_or_default().to_string(),
            });
        }

        if let Some(content) = delta.and_then(|d| d["content"].as_str()) {
            if !content.is_empty() {
                chunks.push(ChatChunk::content(content));
            }
        }

        if let Some(tool_calls) = delta.and_then(|d| d["tool_calls"].as_array()) {
            for (position, tc) in tool_calls.iter().enumerate() {
                let index = tc["index"].as_u64().map(|i| i as usize).unwrap_or(position);

                if let Some(name) = tc["function"]["name"].as_str() {
                    chunks.push(ChatChunk::ToolCallStart {
                        index,
                        call_id: tc["id"].as_str().unwrap_or_default().to_string(),
                        name: name.to_string(),
                    });
                }

                if let Some(arguments) = tc["function"]["arguments"].as_str() {
                    if !arguments.is_empty() {
                        chunks.push(ChatChunk::ToolCallDelta {
                            index,
                            arguments_delta: arguments.to_string(),
                        });
                    }
                }
            }
        }

        if let Some(usage) = chunk.get("usage").filter(|u| u.is_object()) {
            let usage = Self::parse_usage(usage);
            chunks.push(ChatChunk::Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            });
        }

        if let Some(reason) = choice.and_then(|c| c["finish_reason"].as_str()) {
            chunks.push(ChatChunk::finish(FinishReason::parse(Some(reason))));
        }

        Ok(chunks)
    }

    fn transform_tools(&self, tools: &[ToolDefinition]) -> Result<Value, ConversionError> {
        let tools_json: Vec<Value> = tools
            .iter()
            .map(|t| {
                let mut function = json!({
                    "name": t.name,
                    "parameters": t.parameters,
                });
                if let Some(description) = &t.description {
                    function["description"] = json!(description);
                }
                json!({
                    "type": "function",
                    "function": function,
                })
            })
            .collect();

        Ok(json!(tools_json))
    }

    fn parse_response(&self, data: &Value) -> Result<ChatResponse, ConversionError> {
        let id = data["id"].as_str().unwrap_or_default().to_string();
        let model = data["model"].as_str().unwrap_or_default().to_string();

        let choice = data["choices"]
            .get(0)
            .ok_or_else(|| ConversionError::MissingField("choices".to_string()))?;

        let message = &choice["message"];
        if !message.is_object() {
            return Err(ConversionError::MissingField("choices[0].message".to_string()));
        }

        let content = message["content"].as_str().unwrap_or_default().to_string();

        let tool_calls: Vec<ToolCall> = message["tool_calls"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        let name = tc["function"]["name"].as_str()?;
                        let arguments = match &tc["function"]["arguments"] {
                            Value::String(s) => s.clone(),
                            Value::Null => String::new(),
                            other => other.to_string(),
                        };
                        Some(ToolCall::new(
                            tc["id"].as_str().unwrap_or_default(),
                            name,
                            arguments,
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let usage = data
            .get("usage")
            .filter(|u| u.is_object())
            .map(Self::parse_usage)
            .unwrap_or_default();

        let finish_reason = FinishReason::parse(choice["finish_reason"].as_str());

        Ok(ChatResponse::new(id, model, content)
            .with_tool_calls(tool_calls)
            .with_usage(usage)
            .with_finish_reason(finish_reason))
    }
}
