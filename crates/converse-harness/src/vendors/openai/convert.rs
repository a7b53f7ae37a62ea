//! Translation between the conversation model and Chat Completions JSON.

use serde_json::{Value, json};

use crate::content::{
    AssistantContent, AssistantPrompt, ChatMessage, ToolCallRequest, UserContent, is_image_mime,
};
use crate::errors::ProviderError;
use crate::model::ProviderKind;
use crate::provider::{ProviderRequest, ProviderResponse};
use crate::tools::{ToolChoice, ToolSpec};
use crate::usage::{Usage, UsageReport};

pub(crate) fn build_request_body(req: &ProviderRequest) -> Value {
    let mut body = json!({
        "model": req.model.model,
        "messages": convert_messages(&req.messages),
        "max_tokens": req.options.max_tokens,
        "stream": req.options.stream,
    });
    if req.options.stream {
        body["stream_options"] = json!({ "include_usage": true });
    }
    if let Some(temperature) = req.options.temperature {
        body["temperature"] = json!(temperature);
    }
    if !req.tools.is_empty() {
        body["tools"] = Value::Array(
            req.tools
                .iter()
                .map(|tool| convert_tool(tool, req.options.strict_tool_params))
                .collect(),
        );
        body["tool_choice"] = convert_tool_choice(&req.tool_choice);
    }
    body
}

fn convert_messages(messages: &[ChatMessage]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len());
    let mut system_run: Vec<Value> = Vec::new();
    for message in messages {
        if let ChatMessage::SystemContext { text } = message {
            system_run.push(json!({ "type": "text", "text": text }));
            continue;
        }
        if !system_run.is_empty() {
            out.push(json!({
                "role": "system",
                "content": std::mem::take(&mut system_run),
            }));
        }
        match message {
            ChatMessage::SystemContext { .. } => {}
            ChatMessage::UserPrompt { content } => {
                let parts: Vec<Value> = content.iter().filter_map(convert_user_content).collect();
                if !parts.is_empty() {
                    out.push(json!({ "role": "user", "content": parts }));
                }
            }
            ChatMessage::AssistantPrompt(prompt) => out.push(convert_assistant(prompt)),
            ChatMessage::ToolResult { results } => {
                out.extend(results.iter().map(|result| {
                    json!({
                        "role": "tool",
                        "tool_call_id": result.tool_call_id,
                        "content": result.text,
                    })
                }));
            }
        }
    }
    if !system_run.is_empty() {
        out.push(json!({ "role": "system", "content": system_run }));
    }
    out
}

fn convert_user_content(content: &UserContent) -> Option<Value> {
    match content {
        UserContent::Text { text } => Some(json!({ "type": "text", "text": text })),
        UserContent::Image { mime_type, data } if is_image_mime(mime_type) => Some(json!({
            "type": "image_url",
            "image_url": { "url": format!("data:{mime_type};base64,{data}") },
        })),
        UserContent::Image { .. } | UserContent::File { .. } => None,
    }
}

fn convert_assistant(prompt: &AssistantPrompt) -> Value {
    let text: Vec<Value> = prompt
        .content
        .iter()
        .filter_map(AssistantContent::as_text)
        .filter(|text| !text.is_empty())
        .map(|text| json!({ "type": "text", "text": text }))
        .collect();
    let mut message = json!({
        "role": "assistant",
        "content": if text.is_empty() { Value::Null } else { Value::Array(text) },
    });
    if prompt.has_tool_calls() {
        message["tool_calls"] = Value::Array(
            prompt
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.name, "arguments": call.arguments },
                    })
                })
                .collect(),
        );
    }
    message
}

fn convert_tool(tool: &ToolSpec, strict: bool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
            "strict": strict,
        },
    })
}

fn convert_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::Required(name) => json!({ "type": "function", "function": { "name": name } }),
    }
}

/// Reads `usage` of a completion or of the final stream chunk.
pub(crate) fn parse_usage(value: &Value) -> Option<UsageReport> {
    let usage = value.get("usage").filter(|u| u.is_object())?;
    let field = |v: &Value, key: &str| v.get(key).and_then(Value::as_u64).unwrap_or(0);
    Some(UsageReport {
        prompt_tokens: field(usage, "prompt_tokens"),
        completion_tokens: field(usage, "completion_tokens"),
        cache_read_tokens: usage
            .get("prompt_tokens_details")
            .map(|details| field(details, "cached_tokens"))
            .unwrap_or(0),
        cache_write_tokens: 0,
    })
}

/// Parses a non-streaming Chat Completions response.
pub(crate) fn parse_response(
    kind: ProviderKind,
    model: &str,
    value: &Value,
) -> Result<ProviderResponse, ProviderError> {
    let message = value
        .pointer("/choices/0/message")
        .ok_or_else(|| ProviderError::protocol(kind, "response has no choices[0].message"))?;

    if let Some(refusal) = message
        .get("refusal")
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
    {
        return Err(ProviderError::refusal(kind, refusal));
    }

    let mut prompt = AssistantPrompt::new(model);
    if let Some(text) = message
        .get("content")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
    {
        prompt.content.push(AssistantContent::text(text));
    }
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            if call.get("type").and_then(Value::as_str) != Some("function") {
                return Err(ProviderError::protocol(
                    kind,
                    format!("unsupported tool call type: {call}"),
                ));
            }
            let text = |pointer: &str| {
                call.pointer(pointer)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            prompt.tool_calls.push(ToolCallRequest::new(
                text("/id"),
                text("/function/name"),
                text("/function/arguments"),
            ));
        }
    }

    Ok(ProviderResponse {
        message: prompt,
        usage: parse_usage(value).map(Usage::from).unwrap_or_default(),
    })
}
