//! Shared HTTP helpers for the adapters

use crate::error::{ErrorKind, ProviderError, Result};
use std::time::Duration;

/// Build a reqwest client with the given request timeout
pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(format!("screenchat/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            ProviderError::new(ErrorKind::Unknown, "Failed to create HTTP client")
                .with_detail(e.to_string())
        })
}

/// Reclassify a failed send as a transport failure with guidance
pub fn send_error(err: &reqwest::Error, target: &str, guidance: &str) -> ProviderError {
    let message = if err.is_timeout() {
        format!("Request to {} timed out. {}", target, guidance)
    } else if err.is_connect() {
        format!("Cannot connect to {}. {}", target, guidance)
    } else {
        format!("Request to {} failed. {}", target, guidance)
    };
    ProviderError::transport(message.trim_end().to_string()).with_detail(err.to_string())
}

/// Read an error body and pull out the most useful message it carries
///
/// Understands `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"details": "..."}`; otherwise returns the raw text.
pub async fn error_text(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    extract_error_message(&body).unwrap_or(body)
}

pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value["error"]["message"]
        .as_str()
        .or_else(|| value["error"].as_str());
    let details = value["details"]
        .as_str()
        .or_else(|| value["message"].as_str());
    match (error, details) {
        (Some(error), Some(details)) => Some(format!("{}: {}", error, details)),
        (Some(text), None) | (None, Some(text)) => Some(text.to_string()),
        (None, None) => None,
    }
}
