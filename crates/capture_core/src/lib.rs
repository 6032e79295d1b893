//! Core data model for screenchat
//!
//! This crate provides the provider-independent pieces of the chat client:
//! the logical request/response types shared by every AI backend, data URL
//! decoding, the image preparator run before analysis, and the static
//! vision capability table for local models.
//!
//! Everything here is synchronous and performs no network I/O.

pub mod capability;
pub mod decoder;
pub mod preprocess;
pub mod types;

pub use capability::is_image_capable;
pub use decoder::{detect_mime_type, strip_data_url_prefix, DEFAULT_MIME_TYPE};
pub use preprocess::ImagePreparator;
pub use types::*;
