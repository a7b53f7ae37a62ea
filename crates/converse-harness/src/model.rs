use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::HarnessError;

/// Provider family. Each kind maps to exactly one registered adapter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI Chat Completions.
    OpenAi,
    /// xAI, served through the OpenAI-compatible adapter.
    XAi,
    /// Anthropic Messages.
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::XAi => "xai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "xai" => Ok(Self::XAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(HarnessError::Validation(format!(
                "unknown provider kind: {other}"
            ))),
        }
    }
}

/// Model selection for a request.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelRef {
    pub provider: ProviderKind,
    /// Provider-specific model name (for example `gpt-4.1`).
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

/// Per-request model behavior.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelOptions {
    /// Stream the response; when false the adapter's `invoke` is used.
    pub stream: bool,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Optional per-request HTTP timeout.
    pub timeout: Option<Duration>,
    /// Ask the provider to enforce tool parameter schemas strictly.
    pub strict_tool_params: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            stream: true,
            max_tokens: 8192,
            temperature: None,
            timeout: None,
            strict_tool_params: false,
        }
    }
}

impl ModelOptions {
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn strict_tool_params(mut self, strict: bool) -> Self {
        self.strict_tool_params = strict;
        self
    }
}
