//! Configuration for the provider adapters
//!
//! All endpoints, credentials and default model names live in one explicit
//! struct handed to the router and adapters at construction time.

use std::time::Duration;

/// OpenAI chat completions endpoint
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
/// Address of the local backend proxy
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
/// Default address of a locally running Ollama server
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Vision model substituted when an image is sent to a text-only model
pub const DEFAULT_OLLAMA_IMAGE_MODEL: &str = "llava";

/// Configuration shared by the router, adapters and model directory
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bearer credential for OpenAI (requests fail fast without it)
    pub openai_api_key: Option<String>,
    /// OpenAI chat completions URL
    pub openai_api_url: String,
    /// Model used when an image is attached (default: gpt-4o)
    pub openai_vision_model: String,
    /// Model used for text-only prompts (default: gpt-4o-mini)
    pub openai_text_model: String,
    /// `max_tokens` sent to OpenAI (default: 2000)
    pub openai_max_tokens: u32,
    /// Base URL of the backend proxy that holds the Anthropic credential
    pub backend_url: String,
    /// Ollama base URL tried first (usually the backend's `/ollama` mount)
    pub ollama_proxy_url: String,
    /// Ollama base URL tried when the proxy fails (default: http://localhost:11434)
    pub ollama_direct_url: String,
    /// Vision model used for images when the chosen model cannot see (default: llava)
    pub ollama_image_model: String,
    /// Timeout for generation and cloud calls in seconds (default: 120)
    pub generation_timeout_secs: u64,
    /// Timeout for model listing in seconds (default: 5)
    pub directory_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_api_url: OPENAI_API_URL.to_string(),
            openai_vision_model: "gpt-4o".to_string(),
            openai_text_model: "gpt-4o-mini".to_string(),
            openai_max_tokens: 2000,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            ollama_proxy_url: format!("{}/ollama", DEFAULT_BACKEND_URL),
            ollama_direct_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_image_model: DEFAULT_OLLAMA_IMAGE_MODEL.to_string(),
            generation_timeout_secs: 120,
            directory_timeout_secs: 5,
        }
    }
}

impl BridgeConfig {
    /// Create config from environment variables
    ///
    /// Reads `OPENAI_API_KEY`, `OPENAI_API_URL`, `BACKEND_URL`,
    /// `OLLAMA_API_URL` and `OLLAMA_IMAGE_MODEL`; unset or blank values keep
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.openai_api_key = get("OPENAI_API_KEY");
        if let Some(url) = get("OPENAI_API_URL") {
            config.openai_api_url = url;
        }
        if let Some(url) = get("BACKEND_URL") {
            config.ollama_proxy_url = format!("{}/ollama", trim_base(&url));
            config.backend_url = url;
        }
        if let Some(url) = get("OLLAMA_API_URL") {
            config.ollama_proxy_url = url;
        }
        if let Some(model) = get("OLLAMA_IMAGE_MODEL") {
            config.ollama_image_model = model;
        }
        config
    }

    pub fn with_openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    pub fn with_openai_api_url(mut self, url: impl Into<String>) -> Self {
        self.openai_api_url = url.into();
        self
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn with_ollama_urls(mut self, proxy: impl Into<String>, direct: impl Into<String>) -> Self {
        self.ollama_proxy_url = proxy.into();
        self.ollama_direct_url = direct.into();
        self
    }

    /// OpenAI key if one is set and non-blank
    pub fn openai_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Ollama base URLs in attempt order, without duplicates
    pub fn ollama_endpoints(&self) -> Vec<String> {
        let proxy = trim_base(&self.ollama_proxy_url).to_string();
        let direct = trim_base(&self.ollama_direct_url).to_string();
        if proxy.is_empty() || proxy == direct {
            vec![direct]
        } else {
            vec![proxy, direct]
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_secs(self.directory_timeout_secs)
    }
}

/// Strip surrounding whitespace and trailing slashes from a base URL
pub fn trim_base(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}
