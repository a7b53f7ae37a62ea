//! Tools the model can call: registration, argument validation, dispatch.
mod dispatch;
mod registry;
mod suggestions;

pub use dispatch::{DispatchOutcome, ToolDispatcher};
pub use registry::{FnToolExecutor, ToolExecutor, ToolRegistry};
pub use suggestions::{PROMPT_SUGGESTIONS_TOOL, prompt_suggestions_spec};
