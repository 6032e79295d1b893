//! Decoder module for image payloads
//!
//! Captured images travel either as base64 data URLs
//! (`data:image/png;base64,...`) or as bare base64. This module handles:
//! - MIME type detection from the data URL header
//! - Stripping the header before transmission
//! - Base64 decoding to raw bytes and re-encoding as a data URL

use base64::{engine::general_purpose, Engine as _};
use regex::Regex;
use std::sync::LazyLock;

/// MIME type assumed when a payload carries no usable header
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

static DATA_URL_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:([a-zA-Z0-9]+/[a-zA-Z0-9.+-]+);base64,").expect("valid data URL pattern")
});

/// Errors produced while turning a payload back into bytes
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("image payload is empty")]
    Empty,
    #[error("invalid base64 image payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Extract the MIME type from a `data:<mime>;base64,` header
///
/// Falls back to [`DEFAULT_MIME_TYPE`] when the payload is absent, raw
/// base64, or has a malformed header.
pub fn detect_mime_type(data_url: Option<&str>) -> &str {
    data_url
        .and_then(|url| DATA_URL_HEADER.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Remove any `data:...;base64,` header, leaving the raw base64 body
pub fn strip_data_url_prefix(payload: &str) -> &str {
    let trimmed = payload.trim();
    if trimmed.starts_with("data:") {
        if let Some(idx) = trimmed.find(";base64,") {
            return &trimmed[idx + ";base64,".len()..];
        }
    }
    trimmed
}

/// Decode a data URL or raw base64 payload into image bytes
pub fn decode_base64_image(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let body = strip_data_url_prefix(payload);
    if body.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(general_purpose::STANDARD.decode(body)?)
}

/// Encode raw bytes as a base64 data URL
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Normalize a payload into a data URL, keeping a sniffed MIME type
///
/// Raw base64 input is labelled with [`DEFAULT_MIME_TYPE`].
pub fn to_data_url(payload: &str) -> String {
    let mime = detect_mime_type(Some(payload));
    format!("data:{};base64,{}", mime, strip_data_url_prefix(payload))
}
