//! LLM Bridge for screenchat
//!
//! Routes a single logical request (prompt, optional image, conversation
//! context) to one of three AI backends and normalizes their answers:
//! - OpenAI chat completions, called directly
//! - Anthropic, reached through the local backend proxy
//! - Ollama, via a proxy base URL with fallback to the default local address
//!
//! Also lists the models installed on the local Ollama server.
//!
//! Copyright (c) 2025 Michael A Wright

pub mod anthropic;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod router;

pub use anthropic::AnthropicProxyAdapter;
pub use config::BridgeConfig;
pub use error::{ErrorKind, ProviderError, Result};
pub use models::ModelDirectory;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use provider::ProviderAdapter;
pub use router::RequestRouter;
