// # hickory DNS Transport
//
// This crate provides the `DnsTransport` implementation backed by
// `hickory-resolver`.
//
// ## Architecture
//
// The transport forwards one query per call to a `TokioResolver` and maps
// its answers and errors onto the core's types. Deadlines and caching are
// enforced by `DnsResolver` in `ipdef-core`; this layer adds neither.
//
// ## Upstreams
//
// - `system`: nameservers from the host configuration (`/etc/resolv.conf`)
// - `cloudflare`, `google`, `quad9`: well-known public resolvers

use ipdef_core::traits::{DnsTransport, TransportError};

use std::net::IpAddr;
use std::str::FromStr;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::{ResolveError, ResolveErrorKind, Resolver, TokioResolver};
use tracing::{debug, warn};

/// Which nameservers to query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    System,
    Cloudflare,
    Google,
    Quad9,
}

impl FromStr for Upstream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(Upstream::System),
            "cloudflare" => Ok(Upstream::Cloudflare),
            "google" => Ok(Upstream::Google),
            "quad9" => Ok(Upstream::Quad9),
            other => Err(format!("Unknown DNS upstream '{}'", other)),
        }
    }
}

/// DNS transport built on hickory's tokio resolver
pub struct HickoryDnsTransport {
    resolver: TokioResolver,
}

impl HickoryDnsTransport {
    /// Create a transport for the given upstream
    ///
    /// `Upstream::System` falls back to Cloudflare when the host
    /// configuration cannot be read.
    pub fn new(upstream: Upstream) -> Self {
        let config = match upstream {
            Upstream::System => return Self::from_system_conf(),
            Upstream::Cloudflare => ResolverConfig::cloudflare(),
            Upstream::Google => ResolverConfig::google(),
            Upstream::Quad9 => ResolverConfig::quad9(),
        };
        Self::with_config(config, ResolverOpts::default())
    }

    /// Create a transport from an explicit resolver configuration
    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        let resolver = Resolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(opts)
            .build();
        Self { resolver }
    }

    fn from_system_conf() -> Self {
        match TokioResolver::builder_tokio() {
            Ok(builder) => Self {
                resolver: builder.build(),
            },
            Err(e) => {
                warn!("Failed to read system DNS configuration, using Cloudflare: {}", e);
                Self::with_config(ResolverConfig::cloudflare(), ResolverOpts::default())
            }
        }
    }
}

fn map_error(e: ResolveError) -> TransportError {
    if e.is_no_records_found() {
        return TransportError::not_found(e.to_string());
    }
    match e.kind() {
        ResolveErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => {
            TransportError::Timeout
        }
        _ => TransportError::connection(e.to_string()),
    }
}

/// PTR targets are fully qualified; drop the root label
fn ptr_to_hostname(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_string()
}

#[async_trait::async_trait]
impl DnsTransport for HickoryDnsTransport {
    async fn lookup_host(&self, hostname: &str) -> Result<Vec<IpAddr>, TransportError> {
        let lookup = self.resolver.lookup_ip(hostname).await.map_err(map_error)?;
        let addrs: Vec<IpAddr> = lookup.iter().collect();
        debug!("hickory answered {} with {} address(es)", hostname, addrs.len());
        Ok(addrs)
    }

    async fn lookup_addr(&self, addr: IpAddr) -> Result<Vec<String>, TransportError> {
        let lookup = self.resolver.reverse_lookup(addr).await.map_err(map_error)?;
        let names: Vec<String> = lookup
            .iter()
            .map(|ptr| ptr_to_hostname(&ptr.to_string()))
            .collect();
        debug!("hickory answered {} with {} name(s)", addr, names.len());
        Ok(names)
    }

    fn transport_name(&self) -> &'static str {
        "hickory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_from_str() {
        assert_eq!("system".parse::<Upstream>(), Ok(Upstream::System));
        assert_eq!("Cloudflare".parse::<Upstream>(), Ok(Upstream::Cloudflare));
        assert_eq!("QUAD9".parse::<Upstream>(), Ok(Upstream::Quad9));
        assert!("8.8.8.8".parse::<Upstream>().is_err());
    }

    #[test]
    fn test_ptr_to_hostname() {
        assert_eq!(ptr_to_hostname("dns.google."), "dns.google");
        assert_eq!(ptr_to_hostname("localhost"), "localhost");
    }

    #[tokio::test]
    async fn test_transport_construction() {
        let transport = HickoryDnsTransport::new(Upstream::Google);
        assert_eq!(transport.transport_name(), "hickory");

        let system = HickoryDnsTransport::new(Upstream::System);
        assert_eq!(system.transport_name(), "hickory");
    }
}
