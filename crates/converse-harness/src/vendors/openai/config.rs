use std::time::Duration;

use crate::errors::HarnessError;
use crate::model::ProviderKind;

/// Configuration for an OpenAI-compatible Chat Completions client.
///
/// The same client serves OpenAI and xAI; only the base URL, key and
/// reported [`ProviderKind`] differ.
#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    /// Provider family reported by the adapter.
    pub kind: ProviderKind,
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL for the OpenAI-compatible endpoint.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Default HTTP timeout for requests.
    pub timeout: Duration,
}

impl OpenAiClientConfig {
    /// Creates an OpenAI config with default endpoint and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Creates an xAI config; xAI speaks the OpenAI wire format.
    pub fn xai(api_key: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::XAi,
            base_url: "https://api.x.ai".to_string(),
            ..Self::new(api_key)
        }
    }

    /// Builds an OpenAI config from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, HarnessError> {
        Ok(Self::new(read_key("OPENAI_API_KEY", ProviderKind::OpenAi)?))
    }

    /// Builds an xAI config from `XAI_API_KEY`.
    pub fn xai_from_env() -> Result<Self, HarnessError> {
        Ok(Self::xai(read_key("XAI_API_KEY", ProviderKind::XAi)?))
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the default HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

fn read_key(var: &str, kind: ProviderKind) -> Result<String, HarnessError> {
    let api_key = std::env::var(var).unwrap_or_default();
    if api_key.trim().is_empty() {
        return Err(HarnessError::Config(format!(
            "missing {var} for {kind} provider"
        )));
    }
    Ok(api_key)
}
