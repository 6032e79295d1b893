//! Core types for the screenchat request pipeline
//!
//! A single logical request (prompt, optional image, conversation context)
//! is built per user action and handed to whichever provider the user
//! selected. Every provider's answer collapses into one logical response.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a logical request, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The AI backend a request is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    /// Cloud text/vision API called directly with a bearer credential
    #[serde(rename = "openai")]
    OpenAi,
    /// Cloud vision API reached through the local backend proxy
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Locally hosted Ollama model server
    #[serde(rename = "ollama")]
    Ollama,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::OpenAi, ProviderId::Anthropic, ProviderId::Ollama];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a provider identifier names no known backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider '{0}' (expected one of: openai, anthropic, ollama)")]
pub struct ParseProviderError(pub String);

impl FromStr for ProviderId {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderId::OpenAi),
            "anthropic" => Ok(ProviderId::Anthropic),
            "ollama" => Ok(ProviderId::Ollama),
            _ => Err(ParseProviderError(s.to_string())),
        }
    }
}

/// One prior turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Speaker role, e.g. "user" or "assistant"
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Serialize conversation history as newline-joined `role: content` lines
pub fn compose_context(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prepend a non-empty context block to a prompt, separated by a blank line
pub fn with_context(context: &str, prompt: &str) -> String {
    if context.trim().is_empty() {
        prompt.to_string()
    } else {
        format!("{}\n\n{}", context, prompt)
    }
}

/// A provider-independent request built from one user action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalRequest {
    /// Correlation id for logging
    pub id: RequestId,
    /// The user's prompt
    pub prompt: String,
    /// Attached image, either a base64 data URL or raw base64
    pub image_data: Option<String>,
    /// Prior conversation serialized with [`compose_context`]
    pub context: String,
    /// Backend selected by the user
    pub provider: ProviderId,
    /// Local model name, only meaningful for [`ProviderId::Ollama`]
    pub local_model: Option<String>,
}

impl LogicalRequest {
    pub fn new(provider: ProviderId, prompt: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            prompt: prompt.into(),
            image_data: None,
            context: String::new(),
            provider,
            local_model: None,
        }
    }

    pub fn with_image(mut self, image_data: impl Into<String>) -> Self {
        self.image_data = Some(image_data.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_history(self, history: &[ChatTurn]) -> Self {
        self.with_context(compose_context(history))
    }

    pub fn with_local_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.local_model = if model.trim().is_empty() {
            None
        } else {
            Some(model)
        };
        self
    }

    /// True if an image is attached (empty strings do not count)
    pub fn has_image(&self) -> bool {
        self.image_data
            .as_deref()
            .is_some_and(|data| !data.trim().is_empty())
    }
}

/// The single field every provider response is reduced to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalResponse {
    pub text: String,
}

impl LogicalResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A model advertised by the local model server
///
/// Only `name` is guaranteed; everything else the server reported is kept
/// verbatim in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Build a descriptor from a JSON object, taking `name` out of it
    ///
    /// Returns `None` unless the object carries a non-empty string `name`.
    pub fn from_object(mut object: serde_json::Map<String, serde_json::Value>) -> Option<Self> {
        let name = match object.remove("name") {
            Some(serde_json::Value::String(name)) if !name.trim().is_empty() => name,
            _ => return None,
        };
        Some(Self {
            name,
            metadata: object,
        })
    }
}
