//! Common contract implemented by every backend adapter

use crate::error::Result;
use async_trait::async_trait;
use capture_core::{LogicalRequest, LogicalResponse, ProviderId};

/// Translates a logical request into one provider's wire format and back
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider this adapter serves
    fn id(&self) -> ProviderId;

    /// Send the request and reduce the provider's answer to text
    async fn invoke(&self, request: &LogicalRequest) -> Result<LogicalResponse>;
}
