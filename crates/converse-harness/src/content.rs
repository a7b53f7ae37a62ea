//! Provider-agnostic conversation turns.
//!
//! A conversation is an ordered `Vec<ChatMessage>`; the order is the dialogue
//! order presented to the provider.

use serde::{Deserialize, Serialize};

/// MIME types accepted as inline images by every adapter.
pub const IMAGE_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// True when `mime_type` can be sent to a provider as inline image media.
pub fn is_image_mime(mime_type: &str) -> bool {
    IMAGE_MIME_TYPES.contains(&mime_type)
}

/// One turn of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    /// Context injected by the application (sheet contents, instructions).
    SystemContext { text: String },
    /// A prompt written by the end user.
    UserPrompt { content: Vec<UserContent> },
    /// A reply produced by a model.
    AssistantPrompt(AssistantPrompt),
    /// Results of the tool calls requested by the preceding assistant turn.
    ToolResult { results: Vec<ToolResultContent> },
}

impl ChatMessage {
    /// Creates a system context turn.
    pub fn system(text: impl Into<String>) -> Self {
        Self::SystemContext { text: text.into() }
    }

    /// Creates a user turn with a single text item.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::UserPrompt {
            content: vec![UserContent::Text { text: text.into() }],
        }
    }

    pub fn is_system_context(&self) -> bool {
        matches!(self, Self::SystemContext { .. })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::AssistantPrompt(_))
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    pub fn as_assistant(&self) -> Option<&AssistantPrompt> {
        match self {
            Self::AssistantPrompt(prompt) => Some(prompt),
            _ => None,
        }
    }
}

/// Returns the conversation without its system context turns.
pub fn prompt_messages(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter(|m| !m.is_system_context())
        .cloned()
        .collect()
}

/// Content item of a user turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserContent {
    Text {
        text: String,
    },
    /// Base64-encoded image data.
    Image {
        mime_type: String,
        data: String,
    },
    /// Base64-encoded attachment. Adapters drop these.
    File {
        file_name: String,
        mime_type: String,
        data: String,
    },
}

impl UserContent {
    /// Builds an image item, falling back to a file item for unsupported MIME types.
    pub fn image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        if is_image_mime(&mime_type) {
            Self::Image {
                mime_type,
                data: data.into(),
            }
        } else {
            Self::File {
                file_name: String::new(),
                mime_type,
                data: data.into(),
            }
        }
    }
}

/// Content item of an assistant turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantContent {
    Text { text: String },
    Thinking { text: String },
}

impl AssistantContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Thinking { .. } => None,
        }
    }
}

/// A model request to invoke a named tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique within one assistant turn.
    pub id: String,
    pub name: String,
    /// Raw JSON arguments; may be incomplete while `loading` is true.
    pub arguments: String,
    pub loading: bool,
}

impl ToolCallRequest {
    /// Creates a finished tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
            loading: false,
        }
    }
}

/// An assistant turn: ordered content plus tool call requests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantPrompt {
    pub content: Vec<AssistantContent>,
    pub tool_calls: Vec<ToolCallRequest>,
    /// Provider model name that produced this turn.
    pub model: String,
}

impl AssistantPrompt {
    /// Creates an empty assistant turn for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Concatenates all text items in order and ignores thinking items.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for item in &self.content {
            if let Some(text) = item.as_text() {
                out.push_str(text);
            }
        }
        out
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Appends `suffix` to the last text item (or a new one), separated by a
    /// blank line, and trims the result.
    pub fn append_notice(&mut self, suffix: &str) {
        match self.content.last_mut() {
            Some(AssistantContent::Text { text }) => {
                text.push_str("\n\n");
                text.push_str(suffix);
                *text = text.trim().to_string();
            }
            _ => self.content.push(AssistantContent::text(suffix)),
        }
    }
}

/// One tool result keyed by the originating call id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultContent {
    pub tool_call_id: String,
    pub text: String,
}
