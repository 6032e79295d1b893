//! Request router
//!
//! Dispatches a logical request to the adapter registered for its provider.
//! There is no default provider and no retry here; the only automatic retry
//! in the system is the Ollama adapter's proxy-to-direct fallback.

use crate::anthropic::AnthropicProxyAdapter;
use crate::config::BridgeConfig;
use crate::error::{ProviderError, Result};
use crate::ollama::OllamaAdapter;
use crate::openai::OpenAiAdapter;
use crate::provider::ProviderAdapter;
use capture_core::preprocess::Preparation;
use capture_core::{ImagePreparator, LogicalRequest, LogicalResponse, ProviderId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};

/// Routes logical requests to provider adapters
#[derive(Clone)]
pub struct RequestRouter {
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
    preparator: ImagePreparator,
}

impl RequestRouter {
    /// Router with no adapters registered
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
            preparator: ImagePreparator::default(),
        }
    }

    /// Router with all three built-in adapters
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        Ok(Self::empty()
            .register(OpenAiAdapter::new(config)?)
            .register(AnthropicProxyAdapter::new(config)?)
            .register(OllamaAdapter::new(config)?))
    }

    /// Register (or replace) the adapter for its provider
    pub fn register<A>(mut self, adapter: A) -> Self
    where
        A: ProviderAdapter + 'static,
    {
        self.adapters.insert(adapter.id(), Arc::new(adapter));
        self
    }

    pub fn with_preparator(mut self, preparator: ImagePreparator) -> Self {
        self.preparator = preparator;
        self
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .into_iter()
            .filter(|id| self.adapters.contains_key(id))
            .collect()
    }

    /// Send a request to its provider, exactly as given
    pub async fn route(&self, request: &LogicalRequest) -> Result<LogicalResponse> {
        let span = info_span!("route", request_id = %request.id, provider = %request.provider);
        async {
            let adapter = self.adapters.get(&request.provider).ok_or_else(|| {
                ProviderError::not_configured(format!(
                    "Provider '{}' is not configured.",
                    request.provider
                ))
            })?;
            debug!(has_image = request.has_image(), "dispatching request");
            adapter.invoke(request).await
        }
        .instrument(span)
        .await
    }

    /// Prepare the attached image, then route
    ///
    /// Preparation always completes before the adapter is invoked.
    pub async fn analyze(&self, mut request: LogicalRequest) -> Result<LogicalResponse> {
        if let Some(image) = request.image_data.take() {
            request.image_data = Some(self.prepare_image(image).await);
        }
        self.route(&request).await
    }

    /// Run the image preparator on a blocking worker
    pub async fn prepare_image(&self, image: String) -> String {
        let preparator = self.preparator.clone();
        let original = image.clone();
        let outcome = tokio::task::spawn_blocking(move || preparator.try_prepare(&image)).await;

        match outcome {
            Ok(Ok(Preparation::Upscaled {
                data_url,
                width,
                height,
            })) => {
                debug!(width, height, "image upscaled for analysis");
                data_url
            }
            Ok(Ok(_)) => original,
            Ok(Err(err)) => {
                warn!(error = %err, "image preparation failed, sending original");
                original
            }
            Err(err) => {
                warn!(error = %err, "image preparation task failed, sending original");
                original
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records what it was asked and echoes the prompt
    struct EchoAdapter {
        id: ProviderId,
        seen: Arc<Mutex<Vec<LogicalRequest>>>,
    }

    #[async_trait]
    impl ProviderAdapter for EchoAdapter {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn invoke(&self, request: &LogicalRequest) -> Result<LogicalResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(LogicalResponse::new(format!("{}: {}", self.id, request.prompt)))
        }
    }

    fn echo(id: ProviderId) -> (EchoAdapter, Arc<Mutex<Vec<LogicalRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            EchoAdapter {
                id,
                seen: seen.clone(),
            },
            seen,
        )
    }

    #[tokio::test]
    async fn test_dispatch_by_provider() {
        let (openai, openai_seen) = echo(ProviderId::OpenAi);
        let (ollama, ollama_seen) = echo(ProviderId::Ollama);
        let router = RequestRouter::empty().register(openai).register(ollama);

        let response = router
            .route(&LogicalRequest::new(ProviderId::Ollama, "hi"))
            .await
            .unwrap();

        assert_eq!(response.text, "ollama: hi");
        assert_eq!(ollama_seen.lock().unwrap().len(), 1);
        assert!(openai_seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_provider_not_configured() {
        let (openai, _) = echo(ProviderId::OpenAi);
        let router = RequestRouter::empty().register(openai);

        let err = router
            .route(&LogicalRequest::new(ProviderId::Anthropic, "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotConfigured);
        assert_eq!(router.providers(), vec![ProviderId::OpenAi]);
    }

    #[tokio::test]
    async fn test_analyze_prepares_image_before_dispatch() {
        use capture_core::decoder::encode_data_url;
        use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};

        let img = ImageBuffer::from_pixel(40, 30, Rgb([10u8, 20u8, 30u8]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let small = encode_data_url("image/png", &bytes);

        let (anthropic, seen) = echo(ProviderId::Anthropic);
        let router = RequestRouter::empty().register(anthropic);
        router
            .analyze(LogicalRequest::new(ProviderId::Anthropic, "describe").with_image(small.clone()))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let sent = seen[0].image_data.as_deref().unwrap();
        assert_ne!(sent, small);
        assert!(sent.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_prepare_image_keeps_invalid_payload() {
        let router = RequestRouter::empty();
        assert_eq!(router.prepare_image("garbage".to_string()).await, "garbage");
    }

    #[test]
    fn test_from_config_registers_all_providers() {
        let router = RequestRouter::from_config(&BridgeConfig::default()).unwrap();
        assert_eq!(router.providers(), ProviderId::ALL.to_vec());
    }
}
