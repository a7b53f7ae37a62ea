//! Translation between the conversation model and Messages API JSON.

use serde_json::{Value, json};

use crate::content::{
    AssistantContent, AssistantPrompt, ChatMessage, ToolCallRequest, UserContent, is_image_mime,
};
use crate::errors::ProviderError;
use crate::model::ProviderKind;
use crate::provider::{ProviderRequest, ProviderResponse};
use crate::tools::ToolChoice;
use crate::usage::{Usage, UsageReport};

const PROVIDER: ProviderKind = ProviderKind::Anthropic;

pub(crate) fn build_request_body(req: &ProviderRequest) -> Value {
    let system: Vec<&str> = req
        .messages
        .iter()
        .filter_map(|m| match m {
            ChatMessage::SystemContext { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();

    let mut body = json!({
        "model": req.model.model,
        "messages": convert_messages(&req.messages),
        "max_tokens": req.options.max_tokens,
        "stream": req.options.stream,
    });
    if !system.is_empty() {
        body["system"] = json!(system.join("\n\n"));
    }
    if let Some(temperature) = req.options.temperature {
        body["temperature"] = json!(temperature);
    }
    if !req.tools.is_empty() {
        body["tools"] = Value::Array(
            req.tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect(),
        );
        body["tool_choice"] = match &req.tool_choice {
            ToolChoice::Auto => json!({ "type": "auto" }),
            ToolChoice::Required(name) => json!({ "type": "tool", "name": name }),
        };
    }
    body
}

fn convert_messages(messages: &[ChatMessage]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            ChatMessage::SystemContext { .. } => {}
            ChatMessage::UserPrompt { content } => {
                let blocks: Vec<Value> = content.iter().filter_map(convert_user_content).collect();
                if !blocks.is_empty() {
                    out.push(json!({ "role": "user", "content": blocks }));
                }
            }
            ChatMessage::AssistantPrompt(prompt) => {
                let blocks = convert_assistant(prompt);
                if !blocks.is_empty() {
                    out.push(json!({ "role": "assistant", "content": blocks }));
                }
            }
            ChatMessage::ToolResult { results } => {
                let blocks: Vec<Value> = results
                    .iter()
                    .map(|result| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": result.tool_call_id,
                            "content": result.text,
                        })
                    })
                    .collect();
                out.push(json!({ "role": "user", "content": blocks }));
            }
        }
    }
    out
}

fn convert_user_content(content: &UserContent) -> Option<Value> {
    match content {
        UserContent::Text { text } => Some(json!({ "type": "text", "text": text })),
        UserContent::Image { mime_type, data } if is_image_mime(mime_type) => Some(json!({
            "type": "image",
            "source": { "type": "base64", "media_type": mime_type, "data": data },
        })),
        UserContent::Image { .. } | UserContent::File { .. } => None,
    }
}

fn convert_assistant(prompt: &AssistantPrompt) -> Vec<Value> {
    let mut blocks: Vec<Value> = prompt
        .content
        .iter()
        .filter_map(AssistantContent::as_text)
        .filter(|text| !text.is_empty())
        .map(|text| json!({ "type": "text", "text": text }))
        .collect();
    for call in &prompt.tool_calls {
        // The API wants an object; unparsable arguments replay as `{}`.
        let input = serde_json::from_str::<Value>(&call.arguments)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({}));
        blocks.push(json!({
            "type": "tool_use",
            "id": call.id,
            "name": call.name,
            "input": input,
        }));
    }
    blocks
}

/// Reads a Messages `usage` object. Cache reads are folded into the prompt
/// count so they can be netted out uniformly.
pub(crate) fn parse_usage(usage: &Value) -> UsageReport {
    let field = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
    let cache_read = field("cache_read_input_tokens");
    UsageReport {
        prompt_tokens: field("input_tokens").saturating_add(cache_read),
        completion_tokens: field("output_tokens"),
        cache_read_tokens: cache_read,
        cache_write_tokens: field("cache_creation_input_tokens"),
    }
}

/// Parses a non-streaming Messages response.
pub(crate) fn parse_response(model: &str, value: &Value) -> Result<ProviderResponse, ProviderError> {
    if value.get("type").and_then(Value::as_str) == Some("error") {
        return Err(error_from_payload(value));
    }
    let blocks = value
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::protocol(PROVIDER, "response has no content array"))?;

    let mut prompt = AssistantPrompt::new(model);
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
                prompt.content.push(AssistantContent::text(text));
            }
            Some("thinking") => {
                let text = block
                    .get("thinking")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                prompt.content.push(AssistantContent::Thinking {
                    text: text.to_string(),
                });
            }
            Some("tool_use") => {
                let text = |key: &str| {
                    block
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                prompt
                    .tool_calls
                    .push(ToolCallRequest::new(text("id"), text("name"), input.to_string()));
            }
            _ => {}
        }
    }

    if value.get("stop_reason").and_then(Value::as_str) == Some("refusal") {
        return Err(ProviderError::refusal(PROVIDER, prompt.text()));
    }

    Ok(ProviderResponse {
        message: prompt,
        usage: value
            .get("usage")
            .map(|u| Usage::from(parse_usage(u)))
            .unwrap_or_default(),
    })
}

pub(crate) fn error_from_payload(value: &Value) -> ProviderError {
    let message = value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("anthropic error event");
    ProviderError::provider(PROVIDER, message, None)
}
