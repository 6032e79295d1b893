//! Model directory for the local Ollama server
//!
//! Listing never fails: endpoints are tried in order (proxy, then direct)
//! and if none yields a usable list a fixed placeholder list is returned so
//! the caller always has something to render.

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::http;
use capture_core::{is_image_capable, ModelDescriptor};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// Payload shapes returned by `/api/tags` across Ollama versions and proxies
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TagsPayload {
    /// `{"models": [{"name": ...}, ...]}`
    Listed { models: Vec<Value> },
    /// `{"models": {"<name>": {...}, ...}}`
    Keyed { models: Map<String, Value> },
    /// `[{"name": ...}, ...]`
    Bare(Vec<Value>),
    /// Anything else
    Unrecognized(Value),
}

impl TagsPayload {
    /// Reduce the payload to descriptors; unrecognized shapes yield none
    pub fn normalize(self) -> Vec<ModelDescriptor> {
        match self {
            TagsPayload::Listed { models } | TagsPayload::Bare(models) => models
                .into_iter()
                .filter_map(|entry| match entry {
                    Value::Object(object) => ModelDescriptor::from_object(object),
                    _ => None,
                })
                .collect(),
            TagsPayload::Keyed { models } => models
                .into_iter()
                .filter(|(name, _)| !name.trim().is_empty())
                .map(|(name, details)| {
                    let mut metadata = match details {
                        Value::Object(object) => object,
                        _ => Map::new(),
                    };
                    metadata.remove("name");
                    ModelDescriptor { name, metadata }
                })
                .collect(),
            TagsPayload::Unrecognized(_) => Vec::new(),
        }
    }
}

/// Parse and normalize a raw `/api/tags` body
pub fn normalize_models(body: Value) -> Vec<ModelDescriptor> {
    serde_json::from_value::<TagsPayload>(body)
        .map(TagsPayload::normalize)
        .unwrap_or_default()
}

/// Representative models returned when no server could be reached
pub fn placeholder_models() -> Vec<ModelDescriptor> {
    [
        ("llama3", "2023-10-10T10:10:10Z", 4_200_000_000u64),
        ("mistral", "2023-09-15T08:30:00Z", 3_800_000_000),
        ("llava", "2023-11-20T14:20:00Z", 4_800_000_000),
    ]
    .into_iter()
    .map(|(name, modified_at, size)| {
        let mut descriptor = ModelDescriptor::new(name);
        descriptor
            .metadata
            .insert("modified_at".to_string(), json!(modified_at));
        descriptor.metadata.insert("size".to_string(), json!(size));
        descriptor
            .metadata
            .insert("placeholder".to_string(), json!(true));
        descriptor
    })
    .collect()
}

/// Lists models installed on the local Ollama server
pub struct ModelDirectory {
    endpoints: Vec<String>,
    client: reqwest::Client,
}

impl ModelDirectory {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Ok(Self {
            endpoints: config
                .ollama_endpoints()
                .into_iter()
                .map(|base| format!("{}/api/tags", base))
                .collect(),
            client: http::client(config.directory_timeout())?,
        })
    }

    /// Tag URLs tried, in order
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Fetch the model list; falls back to [`placeholder_models`]
    pub async fn list_models(&self) -> Vec<ModelDescriptor> {
        for endpoint in &self.endpoints {
            debug!(%endpoint, "fetching Ollama models");
            match self.fetch(endpoint).await {
                Ok(models) if !models.is_empty() => {
                    info!(%endpoint, count = models.len(), "fetched Ollama models");
                    return models;
                }
                Ok(_) => warn!(%endpoint, "no models in response"),
                Err(reason) => warn!(%endpoint, %reason, "failed to fetch Ollama models"),
            }
        }

        warn!("using placeholder model list, could not reach Ollama");
        placeholder_models()
    }

    /// Only the models that accept image input
    pub async fn vision_models(&self) -> Vec<ModelDescriptor> {
        self.list_models()
            .await
            .into_iter()
            .filter(|model| is_image_capable(&model.name))
            .collect()
    }

    async fn fetch(&self, endpoint: &str) -> std::result::Result<Vec<ModelDescriptor>, String> {
        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {}", status));
        }
        let body: Value = response.json().await.map_err(|e| e.to_string())?;
        Ok(normalize_models(body))
    }
}
