use crate::traits::{PushTransport, TransportError};
use async_trait::async_trait;
use domain::protocol::{PushRequest, PushResponse};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// JSON-over-HTTP pushes with a per-request timeout.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("comment-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushTransport for HttpTransport {
    async fn push(&self, url: &str, request: &PushRequest) -> Result<PushResponse, TransportError> {
        let resp = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| classify(url, e))?;
        debug!(url, status, "push answered");

        // destinations answer JSON, but a proxy in between may not
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(PushResponse { status, body })
    }
}

fn classify(url: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Network {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
