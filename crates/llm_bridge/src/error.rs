//! Error taxonomy shared by all provider adapters
//!
//! Adapters never leak raw transport errors: every failure is reclassified
//! into an [`ErrorKind`] with a message the UI can show as-is. The original
//! error text, when there is one, survives in `detail`.

use capture_core::ParseProviderError;
use serde::Serialize;
use std::fmt;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing credential, model or provider registration
    NotConfigured,
    /// Network or connection level failure
    TransportFailure,
    /// Upstream rate limit hit
    RateLimited,
    /// Upstream temporarily overloaded
    Overloaded,
    /// Upstream answered with an unexpected shape
    BadResponse,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::TransportFailure => "transport_failure",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Overloaded => "overloaded",
            ErrorKind::BadResponse => "bad_response",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified provider failure with a human readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotConfigured, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportFailure, message)
    }

    pub fn bad_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadResponse, message)
    }

    pub fn is_transport(&self) -> bool {
        self.kind == ErrorKind::TransportFailure
    }
}

impl From<ParseProviderError> for ProviderError {
    fn from(err: ParseProviderError) -> Self {
        ProviderError::not_configured(format!(
            "Unknown provider '{}'. Choose openai, anthropic or ollama.",
            err.0
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_human_message() {
        let err = ProviderError::transport("Cannot connect").with_detail("connection refused");
        assert_eq!(err.to_string(), "Cannot connect");
        assert_eq!(err.detail.as_deref(), Some("connection refused"));
        assert!(err.is_transport());
    }

    #[test]
    fn test_unknown_provider_is_not_configured() {
        let err: ProviderError = "gemini".parse::<capture_core::ProviderId>().unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::NotConfigured);
        assert!(err.message.contains("gemini"));
    }

    #[test]
    fn test_error_serialization() {
        let err = ProviderError::new(ErrorKind::RateLimited, "slow down");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "rate_limited");
        assert_eq!(json["message"], "slow down");
        assert!(json.get("detail").is_none());
    }
}
