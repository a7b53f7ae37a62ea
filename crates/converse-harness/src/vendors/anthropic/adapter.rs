use tracing::debug;

use crate::errors::{HarnessError, ProviderError};
use crate::model::ProviderKind;
use crate::provider::{ProviderAdapter, ProviderRequest, ProviderResponse, ProviderStreamHandle};
use crate::sse::{ByteStream, event_stream};

use super::config::{ANTHROPIC_VERSION, AnthropicClientConfig};
use super::convert::{build_request_body, parse_response};
use super::transport::MessagesFrameMapper;

const PROVIDER: ProviderKind = ProviderKind::Anthropic;

/// Provider adapter for Anthropic's Messages API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicClientConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicClientConfig) -> Result<Self, HarnessError> {
        if config.api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "anthropic client config api_key must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a provider using `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::new(AnthropicClientConfig::from_env()?)
    }

    async fn send(
        &self,
        req: &ProviderRequest,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut http_req = self
            .client
            .post(self.config.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body);
        if let Some(timeout) = req.options.timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::provider(
                PROVIDER,
                format!("messages request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    async fn start_stream(
        &self,
        mut req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError> {
        req.options.stream = true;
        let body = build_request_body(&req);
        debug!(
            run_id = %req.run_id,
            model = %req.model.model,
            tools = req.tools.len(),
            "starting anthropic messages stream"
        );

        let response = self.send(&req, &body).await?;
        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        let mut mapper = MessagesFrameMapper::default();
        let stream = event_stream(PROVIDER, bytes_stream, move |frame| mapper.map_frame(frame));
        Ok(ProviderStreamHandle {
            stream: Box::pin(stream),
        })
    }

    async fn invoke(&self, mut req: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        req.options.stream = false;
        let body = build_request_body(&req);
        debug!(run_id = %req.run_id, model = %req.model.model, "invoking anthropic messages");

        let response = self.send(&req, &body).await?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::protocol(PROVIDER, format!("invalid message body: {e}")))?;
        parse_response(&req.model.model, &value)
    }
}
