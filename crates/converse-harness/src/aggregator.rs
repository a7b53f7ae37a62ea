//! Incremental reconstruction of one assistant message from stream events.
//!
//! The aggregator walks `Empty -> Accumulating -> Finalizing -> Done`. Content
//! items and tool calls live in growable vectors; the builder keeps the index
//! of the item and the call currently receiving deltas instead of popping and
//! re-pushing the last element.

use crate::content::{AssistantContent, AssistantPrompt, ToolCallRequest};
use crate::provider::ProviderResponse;
use crate::stream::StreamEvent;
use crate::usage::{Usage, UsageReport, UsageTracker};

/// Text of the single item synthesized when a response carries neither text
/// nor tool calls.
pub const EMPTY_RESPONSE_FALLBACK: &str = "Please try again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregatorState {
    Empty,
    Accumulating,
    Finalizing,
    Done,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Text,
    Thinking,
}

#[derive(Debug, Default)]
struct AssistantMessageBuilder {
    message: AssistantPrompt,
    /// Content item receiving text or thinking deltas.
    open_item: Option<usize>,
    /// Tool call receiving argument deltas.
    open_call: Option<usize>,
}

impl AssistantMessageBuilder {
    fn append(&mut self, kind: ItemKind, delta: &str) {
        if let Some(idx) = self.open_item {
            match (&mut self.message.content[idx], kind) {
                (AssistantContent::Text { text }, ItemKind::Text)
                | (AssistantContent::Thinking { text }, ItemKind::Thinking) => {
                    text.push_str(delta);
                    return;
                }
                _ => {}
            }
        }
        let item = match kind {
            ItemKind::Text => AssistantContent::Text {
                text: delta.to_string(),
            },
            ItemKind::Thinking => AssistantContent::Thinking {
                text: delta.to_string(),
            },
        };
        self.message.content.push(item);
        self.open_item = Some(self.message.content.len() - 1);
    }

    fn settle_calls(&mut self) {
        for call in &mut self.message.tool_calls {
            call.loading = false;
        }
    }

    fn start_call(&mut self, id: &str, name: &str) {
        if let Some(idx) = self.open_call {
            let current = &mut self.message.tool_calls[idx];
            if current.loading && current.id.is_empty() && current.name.is_empty() {
                // Placeholder created by argument fragments that arrived first.
                current.id = id.to_string();
                current.name = name.to_string();
                return;
            }
            current.loading = false;
        }
        self.push_call(id, name);
    }

    fn push_call(&mut self, id: &str, name: &str) {
        self.message.tool_calls.push(ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: String::new(),
            loading: true,
        });
        self.open_call = Some(self.message.tool_calls.len() - 1);
    }

    fn append_arguments(&mut self, delta: &str) {
        let idx = match self.open_call {
            Some(idx) => idx,
            None => {
                self.push_call("", "");
                self.message.tool_calls.len() - 1
            }
        };
        self.message.tool_calls[idx].arguments.push_str(delta);
    }

    fn finalize(&mut self) {
        let content = &mut self.message.content;
        content.retain(|item| !matches!(item, AssistantContent::Text { text } if text.is_empty()));

        let has_text = content
            .iter()
            .any(|item| item.as_text().is_some_and(|t| !t.trim().is_empty()));
        if !has_text && self.message.tool_calls.is_empty() {
            content.retain(|item| item.as_text().is_none());
            content.push(AssistantContent::text(EMPTY_RESPONSE_FALLBACK));
        }

        self.settle_calls();
        self.open_item = None;
        self.open_call = None;
    }
}

/// Builds one assistant message from a provider's event stream.
#[derive(Debug)]
pub struct StreamAggregator {
    state: AggregatorState,
    builder: AssistantMessageBuilder,
    usage: UsageTracker,
    refusal: Option<String>,
}

impl StreamAggregator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            state: AggregatorState::Empty,
            builder: AssistantMessageBuilder {
                message: AssistantPrompt::new(model),
                ..AssistantMessageBuilder::default()
            },
            usage: UsageTracker::default(),
            refusal: None,
        }
    }

    /// Seeds an aggregator with a complete non-streaming response so the same
    /// finalization rules apply to it.
    pub fn from_response(response: ProviderResponse) -> Self {
        let mut aggregator = Self::new(response.message.model.clone());
        aggregator.builder.message = response.message;
        aggregator.usage.observe(UsageReport {
            prompt_tokens: response
                .usage
                .input_tokens
                .saturating_add(response.usage.cache_read_tokens),
            completion_tokens: response.usage.output_tokens,
            cache_read_tokens: response.usage.cache_read_tokens,
            cache_write_tokens: response.usage.cache_write_tokens,
        });
        aggregator.state = AggregatorState::Accumulating;
        aggregator
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// Refusal text seen on the stream, if any.
    pub fn refusal(&self) -> Option<&str> {
        self.refusal.as_deref()
    }

    /// Current (possibly partial) message.
    pub fn snapshot(&self) -> &AssistantPrompt {
        &self.builder.message
    }

    pub fn usage(&self) -> Usage {
        self.usage.usage()
    }

    /// Applies one event and returns the snapshot to forward, if any.
    ///
    /// `UsageUpdate` and `Refusal` produce no snapshot; events after `Done`
    /// are ignored.
    pub fn apply(&mut self, event: StreamEvent) -> Option<AssistantPrompt> {
        if self.state == AggregatorState::Done {
            return None;
        }
        if self.state == AggregatorState::Empty {
            self.state = AggregatorState::Accumulating;
        }
        match event {
            StreamEvent::TextDelta(text) => {
                self.builder.append(ItemKind::Text, &text);
                self.builder.settle_calls();
            }
            StreamEvent::ThinkingDelta(text) => {
                self.builder.append(ItemKind::Thinking, &text);
            }
            StreamEvent::ToolCallStart { id, name } => self.builder.start_call(&id, &name),
            StreamEvent::ToolCallArgumentsDelta(text) => {
                self.builder.append_arguments(&text);
            }
            StreamEvent::ToolCallsFinished => self.builder.settle_calls(),
            StreamEvent::UsageUpdate(report) => {
                self.usage.observe(report);
                return None;
            }
            StreamEvent::Refusal(text) => {
                self.refusal = Some(text);
                return None;
            }
            StreamEvent::StreamEnd => return Some(self.finalize()),
        }
        Some(self.builder.message.clone())
    }

    /// Finalizes the current state and returns the finished message.
    ///
    /// Calling this again after `Done` returns the same message.
    pub fn finalize(&mut self) -> AssistantPrompt {
        if self.state != AggregatorState::Done {
            self.state = AggregatorState::Finalizing;
            self.builder.finalize();
            self.state = AggregatorState::Done;
        }
        self.builder.message.clone()
    }

    /// Finalizes an interrupted response: drops its tool calls and appends
    /// `notice` to the partial text.
    pub fn finalize_with_notice(&mut self, notice: &str) -> AssistantPrompt {
        self.builder.message.tool_calls.clear();
        self.builder.open_call = None;
        self.builder.message.append_notice(notice);
        self.state = AggregatorState::Finalizing;
        self.builder.finalize();
        self.state = AggregatorState::Done;
        self.builder.message.clone()
    }
}
