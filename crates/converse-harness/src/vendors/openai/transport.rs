use serde_json::Value;

use crate::errors::ProviderError;
use crate::model::ProviderKind;
use crate::sse::SseFrame;
use crate::stream::StreamEvent;

use super::convert::parse_usage;

pub(crate) fn map_chat_frame_to_events(
    provider: ProviderKind,
    frame: &SseFrame,
) -> Result<Vec<StreamEvent>, ProviderError> {
    let data = frame.data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data == "[DONE]" {
        return Ok(vec![StreamEvent::StreamEnd]);
    }
    let value: Value = serde_json::from_str(data).map_err(|e| {
        ProviderError::protocol(provider, format!("invalid SSE JSON frame: {e}"))
    })?;
    map_chat_chunk_to_events(provider, &value)
}

pub(crate) fn map_chat_chunk_to_events(
    provider: ProviderKind,
    value: &Value,
) -> Result<Vec<StreamEvent>, ProviderError> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("chat completions stream error");
        return Err(ProviderError::provider(provider, message, None));
    }

    let mut events = Vec::new();
    if let Some(report) = parse_usage(value) {
        events.push(StreamEvent::UsageUpdate(report));
    }

    let Some(choice) = value.pointer("/choices/0") else {
        return Ok(events);
    };

    if let Some(delta) = choice.get("delta") {
        if let Some(text) = non_empty_str(delta, "reasoning_content") {
            events.push(StreamEvent::ThinkingDelta(text.to_string()));
        }
        if let Some(text) = non_empty_str(delta, "content") {
            events.push(StreamEvent::TextDelta(text.to_string()));
        }
        if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let function = call.get("function");
                if let Some(name) = function.and_then(|f| non_empty_str(f, "name")) {
                    let id = call.get("id").and_then(Value::as_str).unwrap_or_default();
                    events.push(StreamEvent::ToolCallStart {
                        id: id.to_string(),
                        name: name.to_string(),
                    });
                }
                if let Some(args) = function.and_then(|f| non_empty_str(f, "arguments")) {
                    events.push(StreamEvent::ToolCallArgumentsDelta(args.to_string()));
                }
            }
        }
        if let Some(refusal) = non_empty_str(delta, "refusal") {
            events.push(StreamEvent::Refusal(refusal.to_string()));
        }
    }

    if choice.get("finish_reason").and_then(Value::as_str) == Some("tool_calls") {
        events.push(StreamEvent::ToolCallsFinished);
    }
    Ok(events)
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
