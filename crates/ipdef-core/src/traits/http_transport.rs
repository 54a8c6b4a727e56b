// # HTTP Transport Trait
//
// Defines the interface for fetching the body of a public-IP echo service.
//
// ## Implementations
//
// - reqwest: `ipdef-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ipdef_core::HttpTransport;
// use std::time::Duration;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let transport = /* HttpTransport implementation */;
//
//     let body = transport
//         .fetch("https://api.ipify.org", Duration::from_secs(10))
//         .await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::time::Duration;

use super::TransportError;

/// Trait for HTTP fetch implementations
///
/// [`crate::PublicIpDetector`] calls this once per endpoint attempt and
/// handles parsing, fallback and caching itself.
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `url` and return the response body as text
    ///
    /// The URL is used verbatim. Implementations must give up after
    /// `timeout` and report [`TransportError::Timeout`].
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The raw (untrimmed) body of a successful response
    /// - `Err(TransportError)`: On timeout, connection failure or a
    ///   non-success status
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, TransportError>;
}
