//! Vendor adapters. Each submodule exposes a config and a `ProviderAdapter`.
pub mod anthropic;
pub mod openai;
