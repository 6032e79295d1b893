//! screenchat REST API server
//!
//! Thin HTTP front door onto the request router so the browser UI can send
//! chat messages and screen captures to any provider and list local models.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use capture_core::{is_image_capable, ChatTurn, LogicalRequest, ProviderId};
use clap::Parser;
use llm_bridge::{BridgeConfig, ErrorKind, ModelDirectory, ProviderError, RequestRouter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Full-screen captures arrive as base64 data URLs inside the JSON body
const DEFAULT_BODY_LIMIT_MB: usize = 50;

#[derive(Debug, Parser)]
#[command(name = "screenchat-server", version, about = "HTTP API for the screenchat provider router", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "SCREENCHAT_BIND", default_value = "127.0.0.1:3000")]
    bind: String,

    /// Backend proxy base URL (Anthropic credential holder)
    #[arg(long, env = "BACKEND_URL")]
    backend_url: Option<String>,

    /// Ollama base URL tried before the default local address
    #[arg(long, env = "OLLAMA_API_URL")]
    ollama_url: Option<String>,

    /// Largest accepted request body, in megabytes
    #[arg(long, env = "SCREENCHAT_BODY_LIMIT_MB", default_value_t = DEFAULT_BODY_LIMIT_MB)]
    body_limit_mb: usize,
}

impl Args {
    fn bridge_config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::from_env();
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        if let Some(url) = &self.ollama_url {
            config.ollama_proxy_url = url.clone();
        }
        config
    }
}

struct AppState {
    router: RequestRouter,
    directory: ModelDirectory,
}

impl AppState {
    fn new(config: &BridgeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            router: RequestRouter::from_config(config).context("Failed to build request router")?,
            directory: ModelDirectory::new(config).context("Failed to build model directory")?,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.bridge_config();
    info!(
        backend = %config.backend_url,
        ollama = ?config.ollama_endpoints(),
        openai_key = config.openai_key().is_some(),
        "starting screenchat server"
    );

    let state = Arc::new(AppState::new(&config)?);
    let app = app(state, args.body_limit_mb * 1024 * 1024);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("Server listening on {}", args.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: Arc<AppState>, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        .route("/api/chat", post(chat))
        .route("/api/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let models = state
        .directory
        .list_models()
        .await
        .into_iter()
        .map(|model| ModelInfo {
            image_capable: is_image_capable(&model.name),
            name: model.name,
            metadata: model.metadata,
        })
        .collect();
    Json(ModelsResponse { models })
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = payload?;
    let request = body.into_request()?;
    let provider = request.provider;
    let response = state.router.route(&request).await?;
    Ok(Json(ChatResponse {
        text: response.text,
        provider,
    }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = payload?;
    let request = body.into_request()?;
    if !request.has_image() {
        return Err(ApiError::BadRequest(
            "image_data is required for analysis".to_string(),
        ));
    }
    let provider = request.provider;
    let response = state.router.analyze(request).await?;
    Ok(Json(ChatResponse {
        text: response.text,
        provider,
    }))
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    provider: String,
    prompt: String,
    /// Pre-serialized context; takes precedence over `history`
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    history: Vec<ChatTurn>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    image_data: Option<String>,
}

impl ChatBody {
    fn into_request(self) -> Result<LogicalRequest, ProviderError> {
        let provider: ProviderId = self.provider.parse()?;
        let mut request = LogicalRequest::new(provider, self.prompt);
        request = match self.context {
            Some(context) => request.with_context(context),
            None => request.with_history(&self.history),
        };
        if let Some(image) = self.image_data {
            request = request.with_image(image);
        }
        if let Some(model) = self.model {
            request = request.with_local_model(model);
        }
        Ok(request)
    }
}

#[derive(Serialize)]
struct ChatResponse {
    text: String,
    provider: ProviderId,
}

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Serialize)]
struct ModelInfo {
    name: String,
    image_capable: bool,
    #[serde(flatten)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

enum ApiError {
    Provider(ProviderError),
    BadRequest(String),
    PayloadTooLarge(String),
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        ApiError::Provider(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Provider(err) => {
                let status = match err.kind {
                    ErrorKind::NotConfigured => StatusCode::BAD_REQUEST,
                    ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                    ErrorKind::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorKind::TransportFailure | ErrorKind::BadResponse => StatusCode::BAD_GATEWAY,
                    ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let body = serde_json::json!({
                    "error": err.message,
                    "kind": err.kind,
                    "details": err.detail,
                });
                (status, Json(body)).into_response()
            }
            ApiError::BadRequest(message) => {
                let body = serde_json::json!({ "error": message, "kind": "bad_request" });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::PayloadTooLarge(message) => {
                let body = serde_json::json!({ "error": message, "kind": "payload_too_large" });
                (StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::net::TcpListener;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    fn test_app(config: BridgeConfig) -> Router {
        app(
            Arc::new(AppState::new(&config).unwrap()),
            DEFAULT_BODY_LIMIT_MB * 1024 * 1024,
        )
    }

    fn offline_config() -> BridgeConfig {
        BridgeConfig::default()
            .with_backend_url(closed_port_url())
            .with_ollama_urls(closed_port_url(), closed_port_url())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app(offline_config());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let (status, body) = send(
            test_app(offline_config()),
            post_json("/api/chat", json!({ "provider": "gemini", "prompt": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "not_configured");
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let (status, body) = send(
            test_app(offline_config()),
            post_json("/api/chat", json!({ "provider": "ollama" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "bad_request");
    }

    #[tokio::test]
    async fn test_openai_without_key_is_bad_request() {
        let (status, body) = send(
            test_app(offline_config()),
            post_json("/api/chat", json!({ "provider": "openai", "prompt": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_chat_with_ollama() {
        let ollama = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "Hi there" })))
            .expect(1)
            .mount(&ollama)
            .await;

        let config = offline_config().with_ollama_urls(closed_port_url(), ollama.uri());
        let (status, body) = send(
            test_app(config),
            post_json(
                "/api/chat",
                json!({
                    "provider": "ollama",
                    "prompt": "hello",
                    "model": "llama3",
                    "history": [{ "role": "user", "content": "earlier" }]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "Hi there");
        assert_eq!(body["provider"], "ollama");
    }

    #[tokio::test]
    async fn test_ollama_unreachable_is_bad_gateway() {
        let (status, body) = send(
            test_app(offline_config()),
            post_json(
                "/api/chat",
                json!({ "provider": "ollama", "prompt": "hello", "model": "llama3" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "transport_failure");
    }

    #[tokio::test]
    async fn test_analyze_requires_image() {
        let (status, body) = send(
            test_app(offline_config()),
            post_json("/api/analyze", json!({ "provider": "anthropic", "prompt": "what?" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "bad_request");
    }

    #[tokio::test]
    async fn test_models_fall_back_to_placeholders() {
        let app = test_app(offline_config());
        let (status, body) = send(
            app,
            Request::builder().uri("/api/models").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let models = body["models"].as_array().unwrap();
        assert_eq!(models.len(), 3);
        let llava = models.iter().find(|m| m["name"] == "llava").unwrap();
        assert_eq!(llava["image_capable"], true);
        let mistral = models.iter().find(|m| m["name"] == "mistral").unwrap();
        assert_eq!(mistral["image_capable"], false);
    }

    #[tokio::test]
    async fn test_full_screen_capture_accepted() {
        let ollama = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "A terminal" })))
            .expect(1)
            .mount(&ollama)
            .await;

        // Well past axum's 2 MB default
        let capture = format!("data:image/png;base64,{}", "A".repeat(3 * 1024 * 1024));
        let config = offline_config().with_ollama_urls(ollama.uri(), ollama.uri());
        let (status, body) = send(
            test_app(config),
            post_json(
                "/api/chat",
                json!({
                    "provider": "ollama",
                    "prompt": "what is on screen?",
                    "model": "llava",
                    "image_data": capture
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "A terminal");
    }

    #[tokio::test]
    async fn test_body_over_limit_is_payload_too_large() {
        let app = app(Arc::new(AppState::new(&offline_config()).unwrap()), 1024);
        let (status, body) = send(
            app,
            post_json(
                "/api/analyze",
                json!({
                    "provider": "ollama",
                    "prompt": "describe",
                    "image_data": "A".repeat(4096)
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["kind"], "payload_too_large");
    }
}
