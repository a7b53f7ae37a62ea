use converse_harness::HarnessError;
use thiserror::Error;

/// Errors raised while registering tools.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("invalid parameter schema for tool {tool}: {message}")]
    InvalidSchema { tool: String, message: String },
    #[error("tool already registered: {tool}")]
    DuplicateTool { tool: String },
}

/// Per-call dispatch failure. Rendered into that call's result text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolCallError {
    #[error("Unknown tool")]
    UnknownTool { name: String },
    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("Arguments for {tool} failed validation: {message}")]
    ValidationFailed { tool: String, message: String },
}

/// Errors returned by [`Orchestrator::submit`](crate::Orchestrator::submit) and
/// [`SubmitStream::finish`](crate::SubmitStream::finish).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Harness(#[from] HarnessError),
    /// The conversation task ended without reporting a result.
    #[error("conversation task ended without a final result (run_id={run_id})")]
    TaskLost { run_id: uuid::Uuid },
}

impl OrchestratorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tool_renders_exact_text() {
        let err = ToolCallError::UnknownTool {
            name: "nope".into(),
        };
        assert_eq!(err.to_string(), "Unknown tool");
    }
}
