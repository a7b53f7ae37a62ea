//! OpenAI-compatible Chat Completions integration.
//!
//! Serves both [`ProviderKind::OpenAi`](crate::model::ProviderKind::OpenAi)
//! and [`ProviderKind::XAi`](crate::model::ProviderKind::XAi).
mod adapter;
mod config;
mod convert;
pub(crate) mod transport;

pub use adapter::OpenAiProvider;
pub use config::OpenAiClientConfig;
