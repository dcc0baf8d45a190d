use async_trait::async_trait;
use domain::protocol::{PushRequest, PushResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("could not build request: {0}")]
    Build(String),
}

/// Delivers one push to one destination endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn push(&self, url: &str, request: &PushRequest) -> Result<PushResponse, TransportError>;
}
