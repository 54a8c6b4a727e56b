//! Caller-facing entry points
//!
//! Adapters (CLI, GUI, REST) talk to the core through the free functions
//! here and the [`IpAnalyzer`] facade. Every call returns a structured
//! value or a typed [`Error`]; nothing panics across this boundary.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::address::{Address, AddressInfo};
use crate::cache::ResolutionCache;
use crate::config::IpdefConfig;
use crate::detector::{PublicAddress, PublicIpDetector};
use crate::error::Result;
use crate::network::{NetworkBlock, NetworkInfo};
use crate::resolver::{DnsResolver, ResolutionResult};
use crate::traits::{DnsTransport, HttpTransport};

/// Parse an IPv4 or IPv6 literal
pub fn parse_address(text: &str) -> Result<Address> {
    Address::parse(text)
}

/// Parse an address literal and summarize its classification
pub fn classify_address(text: &str) -> Result<AddressInfo> {
    Address::parse(text).map(|address| address.to_info())
}

/// Parse `address/prefix` and summarize the block
pub fn compute_network(cidr: &str) -> Result<NetworkInfo> {
    NetworkBlock::from_cidr(cidr).map(|block| block.to_info())
}

/// Facade over the resolver and the detector
///
/// # Example
///
/// ```rust,ignore
/// use ipdef_core::{IpAnalyzer, IpdefConfig};
///
/// let analyzer = IpAnalyzer::from_config(&IpdefConfig::default(), dns, http)?;
/// let public = analyzer.detect_public_ip().await?;
/// let names = analyzer.resolve_reverse(&public.address.to_string()).await?;
/// ```
#[derive(Clone)]
pub struct IpAnalyzer {
    resolver: DnsResolver,
    detector: PublicIpDetector,
    dns_cache: ResolutionCache<ResolutionResult>,
    detector_cache: ResolutionCache<PublicAddress>,
    sweep_interval: Option<Duration>,
}

impl IpAnalyzer {
    /// Build the resolver and detector from validated configuration
    pub fn from_config(
        config: &IpdefConfig,
        dns: Arc<dyn DnsTransport>,
        http: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let dns_cache = config.cache.build_cache();
        let detector_cache = config.cache.build_cache();

        Ok(Self {
            resolver: DnsResolver::new(dns, dns_cache.clone(), config.dns.clone()),
            detector: PublicIpDetector::new(http, detector_cache.clone(), config.detector.clone()),
            dns_cache,
            detector_cache,
            sweep_interval: config.cache.sweep_interval(),
        })
    }

    /// Spawn background sweepers for both caches, if configured
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_sweepers(&self) -> Vec<JoinHandle<()>> {
        match self.sweep_interval {
            Some(period) => {
                debug!("Starting cache sweepers every {:?}", period);
                vec![
                    self.dns_cache.spawn_sweeper(period),
                    self.detector_cache.spawn_sweeper(period),
                ]
            }
            None => Vec::new(),
        }
    }

    pub fn resolver(&self) -> &DnsResolver {
        &self.resolver
    }

    pub fn detector(&self) -> &PublicIpDetector {
        &self.detector
    }

    /// Resolve a hostname to its addresses
    pub async fn resolve_forward(&self, hostname: &str) -> Result<ResolutionResult> {
        self.resolver.resolve_forward(hostname).await
    }

    /// Parse an address literal and resolve it to hostnames
    pub async fn resolve_reverse(&self, address: &str) -> Result<ResolutionResult> {
        let address = Address::parse(address)?;
        self.resolver.resolve_reverse(&address).await
    }

    /// Detect the public address through the configured endpoints
    pub async fn detect_public_ip(&self) -> Result<PublicAddress> {
        self.detector.detect().await
    }
}
