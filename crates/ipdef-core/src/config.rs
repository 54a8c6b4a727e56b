//! Configuration types for the analysis core
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::address::Family;
use crate::cache::ResolutionCache;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpdefConfig {
    /// DNS resolver settings
    #[serde(default)]
    pub dns: DnsConfig,

    /// Public IP detector settings
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Shared cache settings
    #[serde(default)]
    pub cache: CacheConfig,
}

impl IpdefConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.dns.validate()?;
        self.detector.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

/// DNS resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// How long successful answers stay cached (in seconds)
    #[serde(default = "default_dns_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Per-query deadline (in milliseconds)
    #[serde(default = "default_dns_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether answers are cached at all
    #[serde(default = "default_enabled")]
    pub enable_cache: bool,

    /// Maximum number of lookups in flight during a batch
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl DnsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate the DNS configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_ms == 0 {
            return Err(crate::Error::config("DNS timeout must be > 0"));
        }
        if self.max_concurrent == 0 {
            return Err(crate::Error::config("DNS max_concurrent must be > 0"));
        }
        Ok(())
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_dns_cache_ttl_secs(),
            timeout_ms: default_dns_timeout_ms(),
            enable_cache: default_enabled(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Public IP detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Endpoints tried in order until one answers
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<ServiceEndpoint>,

    /// How long a detected address stays cached (in seconds)
    #[serde(default = "default_detector_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Only accept answers of this family
    #[serde(default)]
    pub family: Option<Family>,
}

impl DetectorConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Parse a JSON array of endpoints
    ///
    /// Fields left out take their defaults (`enabled = true`,
    /// `timeout_secs = 10`).
    pub fn endpoints_from_json(json: &str) -> Result<Vec<ServiceEndpoint>, crate::Error> {
        let endpoints: Vec<ServiceEndpoint> = serde_json::from_str(json)
            .map_err(|e| crate::Error::config(format!("Invalid endpoint list: {}", e)))?;
        for endpoint in &endpoints {
            endpoint.validate()?;
        }
        Ok(endpoints)
    }

    /// Validate the detector configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let mut names = HashSet::new();
        for endpoint in &self.endpoints {
            endpoint.validate()?;
            if !names.insert(endpoint.name.as_str()) {
                return Err(crate::Error::config(format!(
                    "Duplicate endpoint name '{}'",
                    endpoint.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            cache_ttl_secs: default_detector_cache_ttl_secs(),
            family: None,
        }
    }
}

/// A public-IP echo service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Short identifier (e.g., "ipify")
    pub name: String,

    /// URL fetched verbatim
    pub url: String,

    /// Whether this endpoint takes part in detection
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Request timeout (in seconds)
    #[serde(default = "default_endpoint_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServiceEndpoint {
    /// Create a new enabled endpoint with the default timeout
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
            timeout_secs: default_endpoint_timeout_secs(),
        }
    }

    /// Enable or disable the endpoint
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the endpoint
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::config("Endpoint name cannot be empty"));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(crate::Error::config(format!(
                "Endpoint '{}' URL must start with http:// or https://",
                self.name
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config(format!(
                "Endpoint '{}' timeout must be > 0",
                self.name
            )));
        }
        Ok(())
    }
}

/// Shared cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on stored entries (unbounded when absent)
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Period of the background sweeper (in seconds); no sweeper when absent
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

impl CacheConfig {
    /// Construct a cache honoring `max_entries`
    pub fn build_cache<V: Clone + Send + Sync + 'static>(&self) -> ResolutionCache<V> {
        match self.max_entries {
            Some(max_entries) => ResolutionCache::with_capacity(max_entries),
            None => ResolutionCache::new(),
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs.map(Duration::from_secs)
    }

    /// Validate the cache configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_entries == Some(0) {
            return Err(crate::Error::config("Cache max_entries must be > 0"));
        }
        if self.sweep_interval_secs == Some(0) {
            return Err(crate::Error::config("Cache sweep interval must be > 0"));
        }
        Ok(())
    }
}

/// Services queried when no endpoint list is configured
pub fn default_endpoints() -> Vec<ServiceEndpoint> {
    vec![
        ServiceEndpoint::new("ipify", "https://api.ipify.org"),
        ServiceEndpoint::new("ipinfo", "https://ipinfo.io/ip"),
        ServiceEndpoint::new("ifconfig", "https://ifconfig.me/ip"),
        ServiceEndpoint::new("icanhazip", "https://icanhazip.com"),
    ]
}

fn default_enabled() -> bool {
    true
}

fn default_dns_cache_ttl_secs() -> u64 {
    300
}

fn default_dns_timeout_ms() -> u64 {
    5000
}

fn default_max_concurrent() -> usize {
    5
}

fn default_detector_cache_ttl_secs() -> u64 {
    60
}

fn default_endpoint_timeout_secs() -> u64 {
    10
}
