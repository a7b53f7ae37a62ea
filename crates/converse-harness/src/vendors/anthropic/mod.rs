//! Anthropic Messages API integration.
mod adapter;
mod config;
mod convert;
pub(crate) mod transport;

pub use adapter::AnthropicProvider;
pub use config::{ANTHROPIC_VERSION, AnthropicClientConfig};
