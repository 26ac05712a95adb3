use eventsource_stream::Eventsource;
use futures::StreamExt;

use crate::error::{RegistryError, RegistryResult};
use crate::protocol::JsonRpcMessage;

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

/// Read an SSE response until the message answering `request_id` shows up.
/// Server requests and notifications seen on the way are skipped.
pub async fn read_sse_response(response: reqwest::Response, request_id: u64) -> RegistryResult<JsonRpcMessage> {
    let mut events = response.bytes_stream().eventsource();

    while let Some(event) = events.next().await {
        let event = event.map_err(|e| RegistryError::Protocol(format!("event stream error: {}", e)))?;
        if let Some(message) = decode_event(&event.data, request_id)? {
            return Ok(message);
        }
    }

    Err(RegistryError::Protocol(format!(
        "event stream ended without a response to request {}",
        request_id
    )))
}

/// Decode one event payload; multi-line `data:` fields arrive already joined
fn decode_event(data: &str, request_id: u64) -> RegistryResult<Option<JsonRpcMessage>> {
    if data.trim().is_empty() {
        return Ok(None);
    }

    let message: JsonRpcMessage = serde_json::from_str(data)?;
    if message.answers(request_id) {
        Ok(Some(message))
    } else {
        tracing::debug!(method = ?message.method, "skipping registry message");
        Ok(None)
    }
}
