//! OpenAI chat completions adapter
//!
//! Calls the cloud API directly with a bearer credential. The model switches
//! between a vision-capable and a lighter text model depending on whether an
//! image is attached.

use crate::config::BridgeConfig;
use crate::error::{ErrorKind, ProviderError, Result};
use crate::http;
use crate::provider::ProviderAdapter;
use async_trait::async_trait;
use capture_core::decoder::to_data_url;
use capture_core::{LogicalRequest, LogicalResponse, ProviderId};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that can analyze images and respond to queries about them.";

/// Adapter for the OpenAI chat completions API
pub struct OpenAiAdapter {
    api_key: Option<String>,
    api_url: String,
    vision_model: String,
    text_model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Ok(Self {
            api_key: config.openai_key().map(str::to_string),
            api_url: config.openai_api_url.clone(),
            vision_model: config.openai_vision_model.clone(),
            text_model: config.openai_text_model.clone(),
            max_tokens: config.openai_max_tokens,
            client: http::client(config.generation_timeout())?,
        })
    }

    /// Translate a logical request into the chat completions body
    pub fn build_request(&self, request: &LogicalRequest) -> ChatCompletionRequest {
        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
        }];

        if !request.context.trim().is_empty() {
            messages.push(ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Text(request.context.clone()),
            });
        }

        let mut parts = vec![ContentPart::Text {
            text: request.prompt.clone(),
        }];
        let image = request.image_data.as_deref().filter(|_| request.has_image());
        if let Some(image) = image {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: to_data_url(image),
                },
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        });

        let model = if image.is_some() {
            &self.vision_model
        } else {
            &self.text_model
        };

        ChatCompletionRequest {
            model: model.clone(),
            messages,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    async fn invoke(&self, request: &LogicalRequest) -> Result<LogicalResponse> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::not_configured(
                "OpenAI API key is not configured. Set OPENAI_API_KEY, or switch to the Claude or Ollama models.",
            )
        })?;

        let body = self.build_request(request);
        debug!(model = %body.model, messages = body.messages.len(), "sending OpenAI request");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                http::send_error(
                    &e,
                    "the OpenAI API",
                    "Check your network connection, or switch to the Claude or Ollama models.",
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = http::error_text(response).await;
            return Err(status_error(status, detail));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            ProviderError::bad_response("OpenAI returned an unexpected response.")
                .with_detail(e.to_string())
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::bad_response("OpenAI response contained no message."))?;

        info!(model = %body.model, chars = text.len(), "OpenAI response received");
        Ok(LogicalResponse::new(text))
    }
}

fn status_error(status: StatusCode, detail: String) -> ProviderError {
    let err = match status.as_u16() {
        401 | 403 => ProviderError::not_configured(
            "OpenAI rejected the API key. Check OPENAI_API_KEY, or switch to the Claude or Ollama models.",
        ),
        429 => ProviderError::new(
            ErrorKind::RateLimited,
            "OpenAI rate limit exceeded. Please try again in a few moments.",
        ),
        503 | 529 => ProviderError::new(
            ErrorKind::Overloaded,
            "OpenAI is currently overloaded. Please try again in a few moments.",
        ),
        _ => ProviderError::new(ErrorKind::Unknown, format!("OpenAI API error ({})", status)),
    };
    err.with_detail(detail)
}

/// Chat completions request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Plain text or a list of typed parts
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
