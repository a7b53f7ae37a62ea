use serde_json::Value;

use crate::errors::ProviderError;
use crate::model::ProviderKind;
use crate::sse::SseFrame;
use crate::stream::StreamEvent;

use super::convert::{error_from_payload, parse_usage};

const PROVIDER: ProviderKind = ProviderKind::Anthropic;

/// Maps Messages API stream frames to normalized events.
///
/// Keeps the text seen so far so a `refusal` stop reason can carry it.
#[derive(Debug, Default)]
pub(crate) struct MessagesFrameMapper {
    text: String,
}

impl MessagesFrameMapper {
    pub fn map_frame(&mut self, frame: &SseFrame) -> Result<Vec<StreamEvent>, ProviderError> {
        let data = frame.data.trim();
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let value: Value = serde_json::from_str(data).map_err(|e| {
            ProviderError::protocol(PROVIDER, format!("invalid SSE JSON frame: {e}"))
        })?;
        self.map_value(&value)
    }

    pub fn map_value(&mut self, value: &Value) -> Result<Vec<StreamEvent>, ProviderError> {
        let Some(event_type) = value.get("type").and_then(Value::as_str) else {
            return Ok(Vec::new());
        };
        match event_type {
            "message_start" => Ok(value
                .pointer("/message/usage")
                .map(|usage| vec![StreamEvent::UsageUpdate(parse_usage(usage))])
                .unwrap_or_default()),
            "content_block_start" => {
                let block = value.get("content_block");
                if block.and_then(|b| b.get("type")).and_then(Value::as_str) != Some("tool_use") {
                    return Ok(Vec::new());
                }
                let field = |key: &str| {
                    block
                        .and_then(|b| b.get(key))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                Ok(vec![StreamEvent::ToolCallStart {
                    id: field("id"),
                    name: field("name"),
                }])
            }
            "content_block_delta" => {
                let Some(delta) = value.get("delta") else {
                    return Ok(Vec::new());
                };
                let text = |key: &str| {
                    delta
                        .get(key)
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(ToOwned::to_owned)
                };
                let event = match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => text("text").map(|t| {
                        self.text.push_str(&t);
                        StreamEvent::TextDelta(t)
                    }),
                    Some("thinking_delta") => text("thinking").map(StreamEvent::ThinkingDelta),
                    Some("input_json_delta") => {
                        text("partial_json").map(StreamEvent::ToolCallArgumentsDelta)
                    }
                    _ => None,
                };
                Ok(event.into_iter().collect())
            }
            "message_delta" => {
                let mut events = Vec::new();
                if let Some(usage) = value.get("usage") {
                    events.push(StreamEvent::UsageUpdate(parse_usage(usage)));
                }
                match value.pointer("/delta/stop_reason").and_then(Value::as_str) {
                    Some("tool_use") => events.push(StreamEvent::ToolCallsFinished),
                    Some("refusal") => {
                        let text = if self.text.trim().is_empty() {
                            "the model declined to respond".to_string()
                        } else {
                            self.text.clone()
                        };
                        events.push(StreamEvent::Refusal(text));
                    }
                    _ => {}
                }
                Ok(events)
            }
            "message_stop" => Ok(vec![StreamEvent::StreamEnd]),
            "error" => Err(error_from_payload(value)),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::UsageReport;
    use serde_json::json;

    #[test]
    fn tool_use_lifecycle() {
        let mut mapper = MessagesFrameMapper::default();
        let start = mapper
            .map_value(&json!({"type":"content_block_start","index":1,
                "content_block":{"type":"tool_use","id":"toolu_01","name":"get_weather","input":{}}}))
            .expect("start");
        assert_eq!(
            start,
            vec![StreamEvent::ToolCallStart {
                id: "toolu_01".into(),
                name: "get_weather".into()
            }]
        );
        let delta = mapper
            .map_value(&json!({"type":"content_block_delta","index":1,
                "delta":{"type":"input_json_delta","partial_json":"{\"city\":"}}))
            .expect("delta");
        assert_eq!(
            delta,
            vec![StreamEvent::ToolCallArgumentsDelta("{\"city\":".into())]
        );
        let stop = mapper
            .map_value(&json!({"type":"message_delta","delta":{"stop_reason":"tool_use"},
                "usage":{"output_tokens":30}}))
            .expect("stop");
        assert_eq!(stop.last(), Some(&StreamEvent::ToolCallsFinished));
    }

    #[test]
    fn text_and_thinking_deltas() {
        let mut mapper = MessagesFrameMapper::default();
        let frame = SseFrame {
            event: Some("content_block_delta".into()),
            data: r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#.into(),
        };
        assert_eq!(
            mapper.map_frame(&frame).expect("text"),
            vec![StreamEvent::TextDelta("Hello".into())]
        );
        assert_eq!(
            mapper
                .map_value(&json!({"type":"content_block_delta","index":0,
                    "delta":{"type":"thinking_delta","thinking":"Let me think"}}))
                .expect("thinking"),
            vec![StreamEvent::ThinkingDelta("Let me think".into())]
        );
    }

    #[test]
    fn message_start_usage_includes_cache_reads_in_prompt() {
        let mut mapper = MessagesFrameMapper::default();
        let events = mapper
            .map_value(&json!({"type":"message_start","message":{"usage":
                {"input_tokens":42,"output_tokens":1,"cache_read_input_tokens":8,"cache_creation_input_tokens":3}}}))
            .expect("start");
        assert_eq!(
            events,
            vec![StreamEvent::UsageUpdate(UsageReport {
                prompt_tokens: 50,
                completion_tokens: 1,
                cache_read_tokens: 8,
                cache_write_tokens: 3,
            })]
        );
    }

    #[test]
    fn refusal_stop_reason_carries_partial_text() {
        let mut mapper = MessagesFrameMapper::default();
        mapper
            .map_value(&json!({"type":"content_block_delta","index":0,
                "delta":{"type":"text_delta","text":"I can't do that"}}))
            .expect("text");
        let events = mapper
            .map_value(&json!({"type":"message_delta","delta":{"stop_reason":"refusal"}}))
            .expect("refusal");
        assert_eq!(events, vec![StreamEvent::Refusal("I can't do that".into())]);
    }

    #[test]
    fn message_stop_ends_and_error_fails() {
        let mut mapper = MessagesFrameMapper::default();
        assert_eq!(
            mapper.map_value(&json!({"type":"message_stop"})).expect("stop"),
            vec![StreamEvent::StreamEnd]
        );
        assert!(mapper.map_value(&json!({"type":"ping"})).expect("ping").is_empty());
        let err = mapper
            .map_value(&json!({"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}))
            .expect_err("error");
        assert_eq!(err.message(), "Overloaded");
    }
}
