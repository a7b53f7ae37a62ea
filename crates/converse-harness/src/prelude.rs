//! Common imports for typical harness usage.
pub use crate::{
    AbortHandle, AbortSignal, AssistantContent, AssistantPrompt, ChatMessage, Harness,
    HarnessError, ModelOptions, ModelRef, ProviderAdapter, ProviderError, ProviderKind,
    ProviderRequest, StreamEvent, ToolCallRequest, ToolChoice, ToolPolicy, ToolSpec, TurnOutcome,
    Usage, UserContent, run_turn,
};
