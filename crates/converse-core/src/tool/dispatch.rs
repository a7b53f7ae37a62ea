use std::sync::Arc;

use converse_harness::{ChatMessage, ToolCallRequest, ToolResultContent};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::ToolExecution;
use crate::error::ToolCallError;

use super::registry::ToolRegistry;
use super::suggestions::{PROMPT_SUGGESTIONS_TOOL, suggestions_from_args};

/// Results of one batch of tool calls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// One result per call, in request order.
    pub results: Vec<ToolResultContent>,
    /// Suggestions surfaced by `user_prompt_suggestions`, if it ran.
    pub suggestions: Vec<String>,
}

impl DispatchOutcome {
    /// The tool result turn to append to the conversation.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::ToolResult {
            results: self.results.clone(),
        }
    }
}

/// Executes the tool calls of an assistant turn against a registry.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    mode: ToolExecution,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, mode: ToolExecution) -> Self {
        Self { registry, mode }
    }

    /// Runs every call and returns results in request order. A failing call
    /// only affects its own result text.
    pub async fn dispatch(&self, calls: &[ToolCallRequest]) -> DispatchOutcome {
        let outputs: Vec<(ToolResultContent, Option<Vec<String>>)> = match self.mode {
            ToolExecution::Sequential => {
                let mut outputs = Vec::with_capacity(calls.len());
                for call in calls {
                    outputs.push(self.run_call(call).await);
                }
                outputs
            }
            ToolExecution::Concurrent => join_all(calls.iter().map(|c| self.run_call(c))).await,
        };

        let mut outcome = DispatchOutcome::default();
        for (result, suggestions) in outputs {
            outcome.results.push(result);
            if let Some(suggestions) = suggestions {
                outcome.suggestions = suggestions;
            }
        }
        outcome
    }

    async fn run_call(&self, call: &ToolCallRequest) -> (ToolResultContent, Option<Vec<String>>) {
        let (text, suggestions) = match self.execute(call).await {
            Ok(output) => output,
            Err(err) => {
                warn!(tool = %call.name, tool_call_id = %call.id, error = %err, "tool call rejected");
                (err.to_string(), None)
            }
        };
        (
            ToolResultContent {
                tool_call_id: call.id.clone(),
                text,
            },
            suggestions,
        )
    }

    async fn execute(
        &self,
        call: &ToolCallRequest,
    ) -> Result<(String, Option<Vec<String>>), ToolCallError> {
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ToolCallError::UnknownTool {
                name: call.name.clone(),
            })?;
        let args = tool.parse_arguments(&call.arguments)?;
        let suggestions =
            (call.name == PROMPT_SUGGESTIONS_TOOL).then(|| suggestions_from_args(&args));
        debug!(tool = %call.name, tool_call_id = %call.id, "executing tool");
        let text = tool.executor.execute(&call.name, args).await;
        Ok((text, suggestions))
    }
}
