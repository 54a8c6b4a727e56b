// # DNS Transport Trait
//
// Defines the interface for performing raw DNS lookups.
//
// ## Implementations
//
// - hickory-resolver: `ipdef-dns-hickory` crate
//
// ## Usage
//
// ```rust,ignore
// use ipdef_core::DnsTransport;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let transport = /* DnsTransport implementation */;
//
//     let addrs = transport.lookup_host("example.com").await?;
//     let names = transport.lookup_addr("93.184.216.34".parse()?).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use super::TransportError;

/// Trait for DNS lookup implementations
///
/// A transport answers exactly one query per call. It does not cache,
/// retry or enforce deadlines; [`crate::DnsResolver`] wraps every call in
/// its own timeout and owns the cache.
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Answer Order
///
/// Answers are returned in the order the upstream resolver produced them.
/// The resolver preserves that order in its results.
#[async_trait]
pub trait DnsTransport: Send + Sync {
    /// Resolve a hostname to its addresses (A and AAAA)
    ///
    /// `hostname` is already validated and normalized (lowercase, no
    /// trailing dot).
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<IpAddr>)`: Addresses in upstream order, possibly empty
    /// - `Err(TransportError)`: If the lookup could not be completed
    async fn lookup_host(&self, hostname: &str) -> Result<Vec<IpAddr>, TransportError>;

    /// Resolve an address to its hostnames (PTR)
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Hostnames in upstream order, possibly empty
    /// - `Err(TransportError)`: If the lookup could not be completed
    async fn lookup_addr(&self, addr: IpAddr) -> Result<Vec<String>, TransportError>;

    /// Short name recorded as the `source` of every result
    fn transport_name(&self) -> &'static str;
}
