use std::pin::Pin;

use crate::content::{AssistantPrompt, ChatMessage};
use crate::errors::{HarnessError, ProviderError};
use crate::model::{ModelOptions, ModelRef, ProviderKind};
use crate::stream::StreamEvent;
use crate::tools::{ToolChoice, ToolSpec};
use crate::usage::Usage;

/// Boxed stream of normalized events produced by an adapter.
pub type ProviderEventStream =
    Pin<Box<dyn futures::Stream<Item = Result<StreamEvent, ProviderError>> + Send + 'static>>;

/// Provider-agnostic request handed to an adapter.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderRequest {
    pub run_id: uuid::Uuid,
    pub model: ModelRef,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
    pub options: ModelOptions,
}

impl ProviderRequest {
    /// Validates the conversation and assembles a request.
    ///
    /// The conversation must be non-empty and must not end with an assistant
    /// turn.
    pub fn build(
        conversation: &[ChatMessage],
        tools: Vec<ToolSpec>,
        tool_choice: ToolChoice,
        model: ModelRef,
        options: ModelOptions,
    ) -> Result<Self, HarnessError> {
        if model.model.trim().is_empty() {
            return Err(HarnessError::Validation("model must not be empty".into()));
        }
        match conversation.last() {
            None => {
                return Err(HarnessError::Validation(
                    "conversation must contain at least one message".into(),
                ));
            }
            Some(last) if last.is_assistant() => {
                return Err(HarnessError::Validation(
                    "conversation must not end with an assistant message".into(),
                ));
            }
            Some(_) => {}
        }
        Ok(Self {
            run_id: uuid::Uuid::new_v4(),
            model,
            messages: conversation.to_vec(),
            tools,
            tool_choice,
            options,
        })
    }
}

/// An open provider stream.
pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
}

/// Complete reply of a non-streaming call.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderResponse {
    pub message: AssistantPrompt,
    pub usage: Usage,
}

/// Contract implemented by every provider family.
///
/// Dropping the returned stream aborts the underlying HTTP response.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Opens a streaming response.
    async fn start_stream(&self, req: ProviderRequest)
    -> Result<ProviderStreamHandle, ProviderError>;

    /// Requests one complete response.
    async fn invoke(&self, req: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::AssistantPrompt;

    fn model() -> ModelRef {
        ModelRef::new(ProviderKind::OpenAi, "gpt-4.1")
    }

    #[test]
    fn build_rejects_trailing_assistant_turn() {
        let conversation = vec![
            ChatMessage::user_text("hi"),
            ChatMessage::AssistantPrompt(AssistantPrompt::new("gpt-4.1")),
        ];
        let err = ProviderRequest::build(
            &conversation,
            Vec::new(),
            ToolChoice::Auto,
            model(),
            ModelOptions::default(),
        )
        .expect_err("must reject");
        assert!(matches!(err, HarnessError::Validation(msg) if msg.contains("assistant")));
    }

    #[test]
    fn build_rejects_empty_conversation() {
        let err = ProviderRequest::build(
            &[],
            Vec::new(),
            ToolChoice::Auto,
            model(),
            ModelOptions::default(),
        )
        .expect_err("must reject");
        assert!(matches!(err, HarnessError::Validation(_)));
    }

    #[test]
    fn build_keeps_dialogue_order() {
        let conversation = vec![ChatMessage::system("ctx"), ChatMessage::user_text("hi")];
        let req = ProviderRequest::build(
            &conversation,
            Vec::new(),
            ToolChoice::Auto,
            model(),
            ModelOptions::default(),
        )
        .expect("request");
        assert_eq!(req.messages, conversation);
    }
}
