//! screenchat CLI
//!
//! Send prompts and screen captures to OpenAI, Anthropic (via the backend
//! proxy) or a local Ollama from the terminal.

use anyhow::{Context, Result};
use capture_core::decoder::encode_data_url;
use capture_core::{is_image_capable, ChatTurn, LogicalRequest, ProviderId, DEFAULT_MIME_TYPE};
use clap::{Args, Parser, Subcommand};
use llm_bridge::{BridgeConfig, ModelDirectory, RequestRouter};
use std::path::Path;
use tracing::debug;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const DEFAULT_ANALYZE_PROMPT: &str = "Describe what is shown in this screenshot.";

#[derive(Parser)]
#[command(name = "screenchat")]
#[command(about = "Chat with LLM providers about screen captures", long_about = None)]
struct Cli {
    #[command(flatten)]
    endpoints: EndpointArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EndpointArgs {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    /// Backend proxy base URL
    #[arg(long, env = "BACKEND_URL", global = true)]
    backend_url: Option<String>,

    /// Ollama base URL tried before the default local address
    #[arg(long, env = "OLLAMA_API_URL", global = true)]
    ollama_url: Option<String>,
}

impl EndpointArgs {
    fn bridge_config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::from_env();
        if let Some(key) = &self.openai_api_key {
            config = config.with_openai_api_key(key.clone());
        }
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        if let Some(url) = &self.ollama_url {
            config.ollama_proxy_url = url.clone();
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Send a text prompt to a provider
    Chat {
        /// Provider: openai, anthropic or ollama
        #[arg(short, long)]
        provider: String,

        /// Prompt text
        #[arg(short = 'm', long)]
        prompt: String,

        /// Local model name (ollama only)
        #[arg(long)]
        model: Option<String>,

        /// JSON file holding prior turns: [{"role": "...", "content": "..."}]
        #[arg(long)]
        history: Option<String>,
    },

    /// Ask a provider about an image file
    Analyze {
        /// Image file (png, jpeg, ...)
        #[arg(short, long)]
        image: String,

        /// Question to ask about the image
        #[arg(short = 'm', long, default_value = DEFAULT_ANALYZE_PROMPT)]
        prompt: String,

        /// Provider: openai, anthropic or ollama
        #[arg(short, long, default_value = "ollama")]
        provider: String,

        /// Local model name (ollama only)
        #[arg(long)]
        model: Option<String>,
    },

    /// List models known to the local Ollama
    Models,

    /// Check whether a model name belongs to a vision-capable family
    Capable {
        /// Model name, e.g. llava:13b
        name: String,
    },

    /// Print build information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            provider,
            prompt,
            model,
            history,
        } => {
            let provider: ProviderId = provider.parse()?;
            let mut request = LogicalRequest::new(provider, prompt);
            if let Some(path) = history {
                request = request.with_history(&load_history(Path::new(&path))?);
            }
            if let Some(model) = model {
                request = request.with_local_model(model);
            }

            let router = RequestRouter::from_config(&cli.endpoints.bridge_config())?;
            let response = router.route(&request).await?;
            println!("{}", response.text);
            Ok(())
        }
        Commands::Analyze {
            image,
            prompt,
            provider,
            model,
        } => {
            let provider: ProviderId = provider.parse()?;
            let mut request =
                LogicalRequest::new(provider, prompt).with_image(image_data_url(Path::new(&image))?);
            if let Some(model) = model {
                request = request.with_local_model(model);
            }

            let router = RequestRouter::from_config(&cli.endpoints.bridge_config())?;
            let response = router.analyze(request).await?;
            println!("{}", response.text);
            Ok(())
        }
        Commands::Models => {
            let directory = ModelDirectory::new(&cli.endpoints.bridge_config())?;
            for model in directory.list_models().await {
                println!("{}", describe_model(&model.name));
            }
            Ok(())
        }
        Commands::Capable { name } => {
            println!("{}", describe_model(&name));
            Ok(())
        }
        Commands::Version => {
            println!("{}", version_report());
            Ok(())
        }
    }
}

fn version_report() -> String {
    [
        format!("screenchat {}", built_info::PKG_VERSION),
        format!("Target: {} ({})", built_info::TARGET, built_info::PROFILE),
        format!("Rustc: {}", built_info::RUSTC_VERSION),
        format!("Commit: {}", env!("SCREENCHAT_GIT_COMMIT")),
        format!("Built on {} at {}", env!("SCREENCHAT_BUILD_HOST"), env!("SCREENCHAT_BUILD_TIME")),
    ]
    .join("\n")
}

fn load_history(path: &Path) -> Result<Vec<ChatTurn>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("History file {} is not a JSON list of turns", path.display()))
}

/// Reads an image file into a data URL, sniffing the MIME type from its bytes.
fn image_data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let mime = match image::guess_format(&bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => DEFAULT_MIME_TYPE,
    };
    debug!(path = %path.display(), mime, bytes = bytes.len(), "loaded image");
    Ok(encode_data_url(mime, &bytes))
}

fn describe_model(name: &str) -> String {
    if is_image_capable(name) {
        format!("{}\t(vision)", name)
    } else {
        format!("{}\t(text)", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Write;

    #[test]
    fn test_load_history() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"role": "user", "content": "hi"}}, {{"role": "assistant", "content": "hello"}}]"#
        )
        .unwrap();

        let turns = load_history(file.path()).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1], ChatTurn::new("assistant", "hello"));
    }

    #[test]
    fn test_load_history_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"role\": \"user\"}}").unwrap();
        assert!(load_history(file.path()).is_err());
    }

    #[test]
    fn test_image_data_url_sniffs_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.png");
        ImageBuffer::from_pixel(4, 4, Rgb([10u8, 20, 30]))
            .save(&path)
            .unwrap();

        let url = image_data_url(&path).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(capture_core::detect_mime_type(Some(&url)), "image/png");
    }

    #[test]
    fn test_image_data_url_unknown_bytes_default_to_jpeg() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not an image").unwrap();

        let url = image_data_url(file.path()).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_missing_image_is_error() {
        assert!(image_data_url(Path::new("/nonexistent/capture.png")).is_err());
    }

    #[test]
    fn test_describe_model() {
        assert_eq!(describe_model("llava:13b"), "llava:13b\t(vision)");
        assert_eq!(describe_model("mistral"), "mistral\t(text)");
    }

    #[test]
    fn test_version_report() {
        let report = version_report();
        let first = report.lines().next().unwrap();
        assert_eq!(first, format!("screenchat {}", env!("CARGO_PKG_VERSION")));
        assert!(report.contains("Commit: "));
        assert!(report.contains("Built on "));
    }

    #[test]
    fn test_cli_parses_chat() {
        let cli = Cli::try_parse_from([
            "screenchat", "chat", "--provider", "ollama", "--prompt", "hi", "--model", "llama3",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat { provider, model, .. } => {
                assert_eq!(provider, "ollama");
                assert_eq!(model.as_deref(), Some("llama3"));
            }
            _ => panic!("expected chat command"),
        }
    }
}
