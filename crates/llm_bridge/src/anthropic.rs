//! Anthropic adapter, reached through the local backend proxy
//!
//! The backend holds the Anthropic credential and protocol version header;
//! this side only sends `{prompt, imageData, mediaType, context}` to
//! `{backend_url}/api/anthropic` and reads back the vendor response.

use crate::config::{trim_base, BridgeConfig};
use crate::error::{ErrorKind, ProviderError, Result};
use crate::http;
use crate::provider::ProviderAdapter;
use async_trait::async_trait;
use capture_core::{detect_mime_type, strip_data_url_prefix, LogicalRequest, LogicalResponse, ProviderId};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Adapter for Anthropic via the backend proxy
pub struct AnthropicProxyAdapter {
    endpoint: String,
    client: reqwest::Client,
}

impl AnthropicProxyAdapter {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Ok(Self {
            endpoint: format!("{}/api/anthropic", trim_base(&config.backend_url)),
            client: http::client(config.generation_timeout())?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Translate a logical request into the proxy's body
    pub fn build_request(request: &LogicalRequest) -> ProxyRequest {
        let image = request.image_data.as_deref().filter(|_| request.has_image());
        ProxyRequest {
            prompt: request.prompt.clone(),
            image_data: image.map(|data| strip_data_url_prefix(data).to_string()),
            media_type: image.map(|data| detect_mime_type(Some(data)).to_string()),
            context: request.context.clone(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProxyAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    async fn invoke(&self, request: &LogicalRequest) -> Result<LogicalResponse> {
        let body = Self::build_request(request);
        debug!(
            endpoint = %self.endpoint,
            has_image = body.image_data.is_some(),
            "sending Anthropic request via backend"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                http::send_error(
                    &e,
                    "the backend server",
                    "Make sure it is running and BACKEND_URL points at it (e.g. http://host.docker.internal:5000 when using Docker).",
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = http::error_text(response).await;
            return Err(status_error(status, detail));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            ProviderError::bad_response("Anthropic returned an unexpected response.")
                .with_detail(e.to_string())
        })?;

        let text = parsed
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| ProviderError::bad_response("Anthropic response contained no text."))?;

        info!(chars = text.len(), "Anthropic response received");
        Ok(LogicalResponse::new(text))
    }
}

fn status_error(status: StatusCode, detail: String) -> ProviderError {
    let err = match status.as_u16() {
        400 => ProviderError::not_configured(
            "Anthropic API key is not configured. Add ANTHROPIC_API_KEY to the backend's .env file, or switch to the GPT or Ollama models.",
        ),
        429 => ProviderError::new(
            ErrorKind::RateLimited,
            "Anthropic rate limit exceeded. Please try again in a few moments.",
        ),
        529 => ProviderError::new(
            ErrorKind::Overloaded,
            "Anthropic API is currently overloaded. Please try again in a few moments.",
        ),
        500 => ProviderError::new(
            ErrorKind::Unknown,
            "Backend server error. If running in Docker, make sure BACKEND_URL is set correctly (e.g. http://host.docker.internal:5000 or http://backend:5000).",
        ),
        _ => ProviderError::new(
            ErrorKind::Unknown,
            format!("Anthropic request failed ({})", status),
        ),
    };
    err.with_detail(detail)
}

/// Body accepted by the backend's `/api/anthropic` route
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub prompt: String,
    /// Raw base64, header stripped
    pub image_data: Option<String>,
    /// MIME type sniffed from the data URL header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub context: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}
