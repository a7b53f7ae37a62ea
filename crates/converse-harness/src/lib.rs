//! Provider-agnostic chat messages, provider adapters, and streaming
//! assistant-message aggregation.
//!
//! Vendor-specific APIs are namespaced under `vendors::*`.
//!
//! # Streaming one turn (OpenAI)
//!
//! ```no_run
//! use converse_harness::prelude::*;
//! use converse_harness::vendors::openai::OpenAiProvider;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), HarnessError> {
//! let provider = OpenAiProvider::from_env()?;
//! let request = ProviderRequest::build(
//!     &[
//!         ChatMessage::system("Answer briefly."),
//!         ChatMessage::user_text("Say hello"),
//!     ],
//!     Vec::new(),
//!     ToolChoice::Auto,
//!     ModelRef::new(ProviderKind::OpenAi, "gpt-4.1-mini"),
//!     ModelOptions::default(),
//! )?;
//!
//! match run_turn(&provider, request, &mut AbortSignal::never(), |_| {}).await {
//!     Ok(TurnOutcome::Completed { message, .. }) => println!("{}", message.text()),
//!     Ok(TurnOutcome::Cancelled { .. }) => {}
//!     Err(failure) => eprintln!("{}", failure.error),
//! }
//! # Ok(())
//! # }
//! ```

/// Streaming assistant-message reconstruction.
pub mod aggregator;
/// Cooperative cancellation handle and signal.
pub mod cancel;
/// Conversation turns and their content items.
pub mod content;
/// Public error types used by the harness API.
pub mod errors;
/// Provider registry and builder.
pub mod harness;
/// Provider kinds, model references, and per-request options.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
/// Provider adapter contract and request assembly.
pub mod provider;
/// Single-turn stream driver.
pub mod run;
pub(crate) mod sse;
/// Normalized provider stream events.
pub mod stream;
/// Tool declarations and exposure policy.
pub mod tools;
/// Token usage accounting.
pub mod usage;
/// Vendor-specific integrations.
pub mod vendors;

pub use aggregator::{AggregatorState, EMPTY_RESPONSE_FALLBACK, StreamAggregator};
pub use cancel::{AbortHandle, AbortSignal};
pub use content::{
    AssistantContent, AssistantPrompt, ChatMessage, IMAGE_MIME_TYPES, ToolCallRequest,
    ToolResultContent, UserContent, is_image_mime, prompt_messages,
};
pub use errors::{HarnessError, ProviderError};
pub use harness::{Harness, HarnessBuilder};
pub use model::{ModelOptions, ModelRef, ProviderKind};
pub use provider::{
    ProviderAdapter, ProviderEventStream, ProviderRequest, ProviderResponse, ProviderStreamHandle,
};
pub use run::{TurnFailure, TurnOutcome, run_turn};
pub use stream::StreamEvent;
pub use tools::{Source, ToolChoice, ToolPolicy, ToolSpec, select_tools};
pub use usage::{Usage, UsageReport, UsageTracker};
