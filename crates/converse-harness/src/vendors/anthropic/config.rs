use std::time::Duration;

use crate::errors::HarnessError;

/// Messages API version sent with every request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic Messages client.
#[derive(Clone, Debug)]
pub struct AnthropicClientConfig {
    /// API key sent as `x-api-key`.
    pub api_key: String,
    pub base_url: String,
    /// Default HTTP timeout for requests.
    pub timeout: Duration,
}

impl AnthropicClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, HarnessError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "missing ANTHROPIC_API_KEY for anthropic provider".into(),
            ));
        }
        Ok(Self::new(api_key))
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_url_uses_base() {
        assert_eq!(
            AnthropicClientConfig::new("k").messages_url(),
            "https://api.anthropic.com/v1/messages"
        );
    }
}
