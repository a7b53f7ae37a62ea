//! Request, progress and result types of one submit.

use converse_harness::{AssistantPrompt, ChatMessage, ModelOptions, ModelRef, ToolPolicy, Usage};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::error::OrchestratorError;

/// Appended to the partial reply when the caller cancels.
pub const ABORTED_NOTICE: &str = "Request aborted by the user.";
/// Appended to the partial reply when a provider request fails.
pub const FAILURE_NOTICE: &str = "Looks like there was a problem. Please try again.";

/// Input of [`Orchestrator::submit`](crate::Orchestrator::submit).
#[derive(Clone, Debug)]
pub struct SubmitRequest {
    /// Prior conversation, already in dialogue order.
    pub history: Vec<ChatMessage>,
    /// New turns to append; must be non-empty and must not end with an
    /// assistant turn.
    pub turns: Vec<ChatMessage>,
    pub model: ModelRef,
    pub options: ModelOptions,
    pub policy: ToolPolicy,
}

impl SubmitRequest {
    pub fn new(model: ModelRef, policy: ToolPolicy) -> Self {
        Self {
            history: Vec::new(),
            turns: Vec::new(),
            model,
            options: ModelOptions::default(),
            policy,
        }
    }

    pub fn history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn turn(mut self, turn: ChatMessage) -> Self {
        self.turns.push(turn);
        self
    }

    pub fn options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }
}

/// Why the conversation loop stopped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinishReason {
    /// The model replied without tool calls.
    Completed,
    /// `user_prompt_suggestions` returned a non-empty list.
    Suggestions,
    /// The tool iteration cap was reached.
    ToolIterationLimit,
    Cancelled,
    Refused { reason: String },
    Failed { error: String },
}

/// Terminal outcome of a submit. Produced exactly once per started submit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinalResult {
    pub run_id: uuid::Uuid,
    /// The last assistant turn.
    pub message: AssistantPrompt,
    /// Sum over every provider request of this submit.
    pub usage: Usage,
    pub finish_reason: FinishReason,
    /// Full conversation including the appended turns.
    pub conversation: Vec<ChatMessage>,
    pub suggestions: Vec<String>,
    /// Number of provider requests made.
    pub iterations: u32,
}

/// Progress of a running submit.
#[derive(Clone, Debug, PartialEq)]
pub enum ConversationEvent {
    /// Latest state of the reply being streamed in provider request `iteration`.
    Snapshot {
        iteration: u32,
        message: AssistantPrompt,
    },
    Completed(FinalResult),
}

/// Receiver side of a running submit.
pub struct SubmitStream {
    run_id: uuid::Uuid,
    rx: mpsc::Receiver<ConversationEvent>,
    final_rx: oneshot::Receiver<FinalResult>,
    saw_terminal: bool,
}

impl SubmitStream {
    pub(crate) fn new(
        run_id: uuid::Uuid,
        rx: mpsc::Receiver<ConversationEvent>,
        final_rx: oneshot::Receiver<FinalResult>,
    ) -> Self {
        Self {
            run_id,
            rx,
            final_rx,
            saw_terminal: false,
        }
    }

    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Waits for the next event. Snapshots may be skipped when the consumer
    /// falls behind; the `Completed` event is never skipped.
    ///
    /// Returns `None` once the channel is closed.
    pub async fn next_event(&mut self) -> Option<ConversationEvent> {
        let event = self.rx.recv().await;
        if let Some(ConversationEvent::Completed(_)) = &event {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains remaining events and returns the final result.
    ///
    /// Safe to call after consuming events with `next_event()`.
    pub async fn finish(mut self) -> Result<FinalResult, OrchestratorError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(ConversationEvent::Completed(_)) => self.saw_terminal = true,
                Some(_) => {}
                None => break,
            }
        }
        self.final_rx
            .await
            .map_err(|_| OrchestratorError::TaskLost {
                run_id: self.run_id,
            })
    }
}
