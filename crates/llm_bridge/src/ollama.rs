//! Ollama HTTP API adapter
//!
//! Requests go to the configured proxy base URL first and, if that attempt
//! cannot be completed, once more to the default local Ollama address.

use crate::config::BridgeConfig;
use crate::error::{ErrorKind, ProviderError, Result};
use crate::http;
use crate::provider::ProviderAdapter;
use async_trait::async_trait;
use capture_core::types::with_context;
use capture_core::{is_image_capable, strip_data_url_prefix, LogicalRequest, LogicalResponse, ProviderId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Adapter for Ollama's `/api/generate`
pub struct OllamaAdapter {
    /// Base URLs in attempt order: proxy, then direct
    endpoints: Vec<String>,
    image_model: String,
    client: reqwest::Client,
}

/// Failure of a single endpoint attempt
enum AttemptError {
    /// The endpoint could not serve the request; the next one may
    Retryable(ProviderError),
    /// The endpoint answered; retrying elsewhere will not help
    Final(ProviderError),
}

impl OllamaAdapter {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Ok(Self {
            endpoints: config.ollama_endpoints(),
            image_model: config.ollama_image_model.clone(),
            client: http::client(config.generation_timeout())?,
        })
    }

    /// Base URLs tried, in order
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Pick the model to send, substituting a vision model for images
    pub fn resolve_model(&self, request: &LogicalRequest) -> Result<String> {
        let chosen = request.local_model.as_deref().map(str::trim);

        if request.has_image() {
            return Ok(match chosen {
                Some(model) if is_image_capable(model) => model.to_string(),
                Some(model) => {
                    warn!(
                        requested = model,
                        substitute = %self.image_model,
                        "model does not support images, using default vision model"
                    );
                    self.image_model.clone()
                }
                None => self.image_model.clone(),
            });
        }

        chosen.map(str::to_string).ok_or_else(|| {
            ProviderError::not_configured(
                "No Ollama model specified for chat. Select one of the installed models.",
            )
        })
    }

    /// Translate a logical request into the `/api/generate` body
    pub fn build_request(&self, request: &LogicalRequest) -> Result<GenerateRequest> {
        let model = self.resolve_model(request)?;

        let (prompt, images) = if request.has_image() {
            let image = request.image_data.as_deref().unwrap_or_default();
            (
                with_context(&request.context, &request.prompt),
                Some(vec![strip_data_url_prefix(image).to_string()]),
            )
        } else {
            // Bias the model toward a single-turn completion
            let turn = format!("Human: {}\n\nAssistant:", request.prompt);
            (with_context(&request.context, &turn), None)
        };

        Ok(GenerateRequest {
            model,
            prompt,
            stream: false,
            images,
        })
    }

    async fn generate_at(
        &self,
        base: &str,
        body: &GenerateRequest,
    ) -> std::result::Result<String, AttemptError> {
        let url = format!("{}/api/generate", base);
        debug!(%url, model = %body.model, has_images = body.images.is_some(), "sending Ollama request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AttemptError::Retryable(http::send_error(
                    &e,
                    &format!("Ollama at {}", base),
                    "Make sure Ollama is running (ollama serve).",
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = http::extract_error_message(&raw);
            let err = if message.as_deref().is_some_and(is_missing_model) {
                ProviderError::not_configured(format!(
                    "Model '{}' not found. Run 'ollama pull {}' to download it.",
                    body.model, body.model
                ))
            } else {
                ProviderError::new(
                    ErrorKind::Unknown,
                    format!("Ollama API error ({}) from {}", status, base),
                )
            };
            return Err(AttemptError::Retryable(err.with_detail(message.unwrap_or(raw))));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            AttemptError::Final(
                ProviderError::bad_response("Ollama returned an unexpected response.")
                    .with_detail(e.to_string()),
            )
        })?;

        parsed.response.ok_or_else(|| {
            AttemptError::Final(ProviderError::bad_response(
                "Ollama response contained no 'response' field.",
            ))
        })
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    async fn invoke(&self, request: &LogicalRequest) -> Result<LogicalResponse> {
        let body = self.build_request(request)?;

        let mut last_error = None;
        for (attempt, base) in self.endpoints.iter().enumerate() {
            match self.generate_at(base, &body).await {
                Ok(text) => {
                    info!(model = %body.model, endpoint = %base, chars = text.len(), "Ollama response received");
                    return Ok(LogicalResponse::new(text));
                }
                Err(AttemptError::Final(err)) => return Err(err),
                Err(AttemptError::Retryable(err)) => {
                    if attempt + 1 < self.endpoints.len() {
                        warn!(endpoint = %base, error = %err, "Ollama proxy failed, trying direct connection");
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::not_configured("No Ollama endpoint configured.")
        }))
    }
}

/// Ollama's JSON error for an unpulled model, e.g. `model 'x' not found`
fn is_missing_model(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("model") && message.contains("not found")
}

/// Body of `POST /api/generate`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> OllamaAdapter {
        OllamaAdapter::new(&BridgeConfig::default()).unwrap()
    }

    #[test]
    fn test_endpoints_in_order() {
        assert_eq!(
            adapter().endpoints(),
            ["http://localhost:5000/ollama", "http://localhost:11434"]
        );
    }

    #[test]
    fn test_chat_prompt_format() {
        let request = LogicalRequest::new(ProviderId::Ollama, "How are you?")
            .with_context("user: hi\nassistant: hello")
            .with_local_model("mistral");
        let body = adapter().build_request(&request).unwrap();

        assert_eq!(body.model, "mistral");
        assert_eq!(
            body.prompt,
            "user: hi\nassistant: hello\n\nHuman: How are you?\n\nAssistant:"
        );
        assert!(!body.stream);
        assert!(body.images.is_none());
    }

    #[test]
    fn test_chat_prompt_without_context() {
        let request = LogicalRequest::new(ProviderId::Ollama, "Hi").with_local_model("llama3");
        let body = adapter().build_request(&request).unwrap();
        assert_eq!(body.prompt, "Human: Hi\n\nAssistant:");
    }

    #[test]
    fn test_image_request_strips_prefix() {
        let request = LogicalRequest::new(ProviderId::Ollama, "Describe")
            .with_context("user: earlier")
            .with_image("data:image/png;base64,AAAA")
            .with_local_model("llava:13b");
        let body = adapter().build_request(&request).unwrap();

        assert_eq!(body.model, "llava:13b");
        assert_eq!(body.prompt, "user: earlier\n\nDescribe");
        assert_eq!(body.images, Some(vec!["AAAA".to_string()]));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["images"][0], "AAAA");
    }

    #[test]
    fn test_text_model_substituted_for_images() {
        let request = LogicalRequest::new(ProviderId::Ollama, "Describe")
            .with_image("AAAA")
            .with_local_model("mistral");
        assert_eq!(adapter().resolve_model(&request).unwrap(), "llava");
    }

    #[test]
    fn test_default_vision_model_when_unspecified() {
        let request = LogicalRequest::new(ProviderId::Ollama, "Describe").with_image("AAAA");
        assert_eq!(adapter().resolve_model(&request).unwrap(), "llava");
    }

    #[test]
    fn test_chat_requires_model() {
        let request = LogicalRequest::new(ProviderId::Ollama, "Hi");
        let err = adapter().build_request(&request).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotConfigured);
    }

    #[test]
    fn test_is_missing_model() {
        assert!(is_missing_model("model 'phi9' not found, try pulling it first"));
        assert!(is_missing_model("Model \"llava\" Not Found"));
        assert!(!is_missing_model("404 page not found"));
        assert!(!is_missing_model("internal error"));
    }
}
