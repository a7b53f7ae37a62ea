use tracing::debug;

use crate::errors::{HarnessError, ProviderError};
use crate::model::ProviderKind;
use crate::provider::{ProviderAdapter, ProviderRequest, ProviderResponse, ProviderStreamHandle};
use crate::sse::{ByteStream, event_stream};

use super::config::OpenAiClientConfig;
use super::convert::{build_request_body, parse_response};
use super::transport::map_chat_frame_to_events;

/// Provider adapter for OpenAI-compatible Chat Completions endpoints.
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiClientConfig,
}

impl OpenAiProvider {
    /// Creates a provider from explicit client configuration.
    pub fn new(config: OpenAiClientConfig) -> Result<Self, HarnessError> {
        if config.api_key.trim().is_empty() {
            return Err(HarnessError::Config(format!(
                "{} client config api_key must not be empty",
                config.kind
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates an OpenAI provider using `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::new(OpenAiClientConfig::from_env()?)
    }

    /// Creates an xAI provider using `XAI_API_KEY`.
    pub fn xai_from_env() -> Result<Self, HarnessError> {
        Self::new(OpenAiClientConfig::xai_from_env()?)
    }

    async fn send(
        &self,
        req: &ProviderRequest,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let kind = self.config.kind;
        let mut http_req = self
            .client
            .post(self.config.chat_completions_url())
            .bearer_auth(&self.config.api_key)
            .json(body);
        if let Some(timeout) = req.options.timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| ProviderError::transport(kind, format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::provider(
                kind,
                format!("chat completions request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        self.config.kind
    }

    async fn start_stream(
        &self,
        mut req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError> {
        let kind = self.config.kind;
        req.options.stream = true;
        let body = build_request_body(&req);
        debug!(
            run_id = %req.run_id,
            provider = %kind,
            model = %req.model.model,
            tools = req.tools.len(),
            "starting chat completions stream"
        );

        let response = self.send(&req, &body).await?;
        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        let stream = event_stream(kind, bytes_stream, move |frame| {
            map_chat_frame_to_events(kind, frame)
        });
        Ok(ProviderStreamHandle {
            stream: Box::pin(stream),
        })
    }

    async fn invoke(&self, mut req: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let kind = self.config.kind;
        req.options.stream = false;
        let body = build_request_body(&req);
        debug!(run_id = %req.run_id, provider = %kind, model = %req.model.model, "invoking chat completions");

        let response = self.send(&req, &body).await?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::protocol(kind, format!("invalid completion body: {e}")))?;
        parse_response(kind, &req.model.model, &value)
    }
}
