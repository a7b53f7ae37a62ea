use std::sync::Arc;

use converse_harness::{
    AbortSignal, AssistantContent, AssistantPrompt, ChatMessage, Harness, ModelOptions, ModelRef,
    ProviderAdapter, ProviderError, ProviderRequest, ToolChoice, ToolPolicy, ToolSpec, TurnFailure,
    TurnOutcome, Usage, run_turn, select_tools,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::submit::{
    ABORTED_NOTICE, ConversationEvent, FAILURE_NOTICE, FinalResult, FinishReason, SubmitRequest,
    SubmitStream,
};
use crate::tool::{ToolDispatcher, ToolRegistry};

/// Supplies fresh application context before every provider request.
///
/// When set on the orchestrator, all `SystemContext` turns are removed from
/// the working conversation and the returned texts are prepended in order.
#[async_trait::async_trait]
pub trait ContextProvider: Send + Sync {
    async fn context(&self, policy: &ToolPolicy) -> Vec<String>;
}

/// Drives the submit -> stream -> tool -> resubmit loop.
///
/// Cheap to clone; clones share the harness and tool registry.
#[derive(Clone)]
pub struct Orchestrator {
    harness: Harness,
    tools: Arc<ToolRegistry>,
    config: OrchestratorConfig,
    context: Option<Arc<dyn ContextProvider>>,
}

impl Orchestrator {
    pub fn new(harness: Harness, tools: ToolRegistry) -> Self {
        Self {
            harness,
            tools: Arc::new(tools),
            config: OrchestratorConfig::default(),
            context: None,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(provider);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Validates the request and starts the conversation loop on a new task.
    ///
    /// Must be called within a Tokio runtime. Every `Ok` return is followed
    /// by exactly one [`FinalResult`].
    pub fn submit(
        &self,
        request: SubmitRequest,
        signal: AbortSignal,
    ) -> Result<SubmitStream, OrchestratorError> {
        let SubmitRequest {
            history,
            turns,
            model,
            options,
            policy,
        } = request;

        match turns.last() {
            None => return Err(OrchestratorError::validation("no turns to submit")),
            Some(last) if last.is_assistant() => {
                return Err(OrchestratorError::validation(
                    "submitted turns must not end with an assistant message",
                ));
            }
            Some(_) => {}
        }
        if model.model.trim().is_empty() {
            return Err(OrchestratorError::validation("model must not be empty"));
        }
        let provider = self.harness.provider(model.provider)?;

        let mut conversation = history;
        conversation.extend(turns);

        let (tools, tool_choice) = select_tools(&self.tools.specs(), &policy);
        let run_id = uuid::Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.config.snapshot_buffer.max(1));
        let (final_tx, final_rx) = oneshot::channel();

        let run = ConversationRun {
            run_id,
            provider,
            dispatcher: ToolDispatcher::new(self.tools.clone(), self.config.tool_execution),
            context: self.context.clone(),
            model,
            options,
            policy,
            tools,
            tool_choice,
            max_tool_iterations: self.config.max_tool_iterations,
            tx,
        };
        tokio::spawn(async move {
            let result = run.drive(conversation, signal).await;
            let _ = run
                .tx
                .send(ConversationEvent::Completed(result.clone()))
                .await;
            let _ = final_tx.send(result);
        });

        Ok(SubmitStream::new(run_id, rx, final_rx))
    }
}

struct ConversationRun {
    run_id: uuid::Uuid,
    provider: Arc<dyn ProviderAdapter>,
    dispatcher: ToolDispatcher,
    context: Option<Arc<dyn ContextProvider>>,
    model: ModelRef,
    options: ModelOptions,
    policy: ToolPolicy,
    tools: Vec<ToolSpec>,
    tool_choice: ToolChoice,
    max_tool_iterations: u32,
    tx: mpsc::Sender<ConversationEvent>,
}

/// Mutable state of one loop.
struct LoopState {
    conversation: Vec<ChatMessage>,
    usage: Usage,
    iterations: u32,
    suggestions: Vec<String>,
}

impl ConversationRun {
    async fn drive(&self, conversation: Vec<ChatMessage>, mut signal: AbortSignal) -> FinalResult {
        info!(
            run_id = %self.run_id,
            provider = %self.model.provider,
            model = %self.model.model,
            tools = self.tools.len(),
            "conversation started"
        );
        let mut state = LoopState {
            conversation,
            usage: Usage::default(),
            iterations: 0,
            suggestions: Vec::new(),
        };
        let mut tool_iterations = 0_u32;
        let mut tool_choice = self.tool_choice.clone();

        let reason = loop {
            if tool_iterations >= self.max_tool_iterations {
                break FinishReason::ToolIterationLimit;
            }
            if signal.is_aborted() {
                state.push_assistant(self.notice_only(ABORTED_NOTICE));
                break FinishReason::Cancelled;
            }
            self.refresh_context(&mut state.conversation).await;

            let request = match ProviderRequest::build(
                &state.conversation,
                self.tools.clone(),
                tool_choice.clone(),
                self.model.clone(),
                self.options.clone(),
            ) {
                Ok(request) => request,
                Err(err) => {
                    error!(run_id = %self.run_id, error = %err, "could not build provider request");
                    state.push_assistant(self.notice_only(FAILURE_NOTICE));
                    break FinishReason::Failed {
                        error: err.to_string(),
                    };
                }
            };

            state.iterations += 1;
            let iteration = state.iterations;
            debug!(run_id = %self.run_id, iteration, "sending provider request");
            let outcome = run_turn(self.provider.as_ref(), request, &mut signal, |snapshot| {
                // Superseded snapshots may be dropped when the consumer lags.
                let _ = self.tx.try_send(ConversationEvent::Snapshot {
                    iteration,
                    message: snapshot.clone(),
                });
            })
            .await;

            match outcome {
                Ok(TurnOutcome::Completed { message, usage }) => {
                    state.usage += usage;
                    let calls = message.tool_calls.clone();
                    state.push_assistant(message);
                    if calls.is_empty() {
                        break FinishReason::Completed;
                    }

                    tool_iterations += 1;
                    // A pinned tool is forced once; follow-up requests let the model answer.
                    tool_choice = ToolChoice::Auto;
                    debug!(run_id = %self.run_id, iteration, calls = calls.len(), "dispatching tool calls");
                    let dispatched = self.dispatcher.dispatch(&calls).await;
                    state.conversation.push(dispatched.to_message());
                    if !dispatched.suggestions.is_empty() {
                        state.suggestions = dispatched.suggestions;
                        break FinishReason::Suggestions;
                    }
                }
                Ok(TurnOutcome::Cancelled { mut partial }) => {
                    state.usage += partial.usage();
                    state.push_assistant(partial.finalize_with_notice(ABORTED_NOTICE));
                    break FinishReason::Cancelled;
                }
                Err(TurnFailure { error, mut partial }) => {
                    state.usage += partial.usage();
                    break match error {
                        ProviderError::Refusal { text, .. } => {
                            let mut message = AssistantPrompt::new(self.model.model.clone());
                            message.content.push(AssistantContent::text(text.clone()));
                            state.push_assistant(message);
                            FinishReason::Refused { reason: text }
                        }
                        error => {
                            error!(
                                run_id = %self.run_id,
                                provider = %self.model.provider,
                                iteration,
                                error = %error,
                                "provider request failed"
                            );
                            state.push_assistant(partial.finalize_with_notice(FAILURE_NOTICE));
                            FinishReason::Failed {
                                error: error.to_string(),
                            }
                        }
                    };
                }
            }
        };

        info!(
            run_id = %self.run_id,
            iterations = state.iterations,
            finish_reason = ?reason,
            input_tokens = state.usage.input_tokens,
            output_tokens = state.usage.output_tokens,
            "conversation finished"
        );
        state.into_result(self.run_id, reason)
    }

    async fn refresh_context(&self, conversation: &mut Vec<ChatMessage>) {
        let Some(provider) = &self.context else {
            return;
        };
        let fresh = provider.context(&self.policy).await;
        conversation.retain(|m| !m.is_system_context());
        conversation.splice(0..0, fresh.into_iter().map(ChatMessage::system));
    }

    fn notice_only(&self, notice: &str) -> AssistantPrompt {
        let mut message = AssistantPrompt::new(self.model.model.clone());
        message.append_notice(notice);
        message
    }
}

impl LoopState {
    fn push_assistant(&mut self, message: AssistantPrompt) {
        self.conversation.push(ChatMessage::AssistantPrompt(message));
    }

    fn into_result(self, run_id: uuid::Uuid, finish_reason: FinishReason) -> FinalResult {
        let message = self
            .conversation
            .iter()
            .rev()
            .find_map(ChatMessage::as_assistant)
            .cloned()
            .unwrap_or_default();
        FinalResult {
            run_id,
            message,
            usage: self.usage,
            finish_reason,
            conversation: self.conversation,
            suggestions: self.suggestions,
            iterations: self.iterations,
        }
    }
}
