//! Tool registry, tool dispatch, and the bounded conversation loop.
//!
//! [`Orchestrator::submit`] appends the caller's turns, streams the model
//! reply, runs requested tools, and resubmits until the model stops calling
//! tools, a loop-ending tool fires, the iteration cap is hit, or the caller
//! cancels.

pub mod config;
pub mod error;
pub mod observability;
pub mod orchestrator;
pub mod submit;
pub mod tool;

pub use config::{OrchestratorConfig, ToolExecution};
pub use error::{OrchestratorError, ToolCallError, ToolError};
pub use observability::init_observability;
pub use orchestrator::{ContextProvider, Orchestrator};
pub use submit::{
    ABORTED_NOTICE, ConversationEvent, FAILURE_NOTICE, FinalResult, FinishReason, SubmitRequest,
    SubmitStream,
};
pub use tool::{
    DispatchOutcome, FnToolExecutor, PROMPT_SUGGESTIONS_TOOL, ToolDispatcher, ToolExecutor,
    ToolRegistry, prompt_suggestions_spec,
};
