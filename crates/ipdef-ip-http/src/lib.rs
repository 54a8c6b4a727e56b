// # HTTP Transport
//
// This crate provides the reqwest-backed `HttpTransport` used by the public
// IP detector.
//
// ## Architecture
//
// Each `fetch` is a single GET with a per-request timeout. The transport
// only moves bytes: it does not trim, parse, retry or cache. Those concerns
// belong to `PublicIpDetector` in `ipdef-core`.
//
// ## Error Mapping
//
// - Request deadline exceeded → `TransportError::Timeout`
// - Connect failures and non-2xx statuses → `TransportError::Connection`
// - Undecodable bodies → `TransportError::MalformedResponse`

use ipdef_core::traits::{HttpTransport, TransportError};

use std::time::Duration;

use tracing::debug;

/// HTTP transport built on a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestHttpTransport {
    /// HTTP client
    client: reqwest::Client,
}

impl ReqwestHttpTransport {
    /// Create a transport with a default client
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("ipdef/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create a transport around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_decode() || e.is_body() {
        TransportError::malformed(format!("Failed to read response: {}", e))
    } else {
        TransportError::connection(format!("Request failed: {}", e))
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, TransportError> {
        debug!("GET {} (timeout {:?})", url, timeout);

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_error)?;

        if !response.status().is_success() {
            return Err(TransportError::connection(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        response.text().await.map_err(map_error)
    }
}
