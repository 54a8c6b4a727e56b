// # Public IP Detector
//
// Determines the externally visible address by asking public echo services
// through an injected `HttpTransport`.
//
// ## Fallback
//
// Enabled endpoints are tried strictly in configured order, each under its
// own timeout. The first endpoint whose trimmed body parses as an address
// (of the preferred family, if one is set) wins; later endpoints are not
// contacted. When every endpoint fails, the per-endpoint causes are
// returned together.
//
// ## Caching
//
// A successful answer is cached for `DetectorConfig::cache_ttl_secs`.
// Concurrent callers on a cold cache wait on a refresh lock and re-check
// the cache, so only one of them performs the fallback walk.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::address::{Address, Family};
use crate::cache::ResolutionCache;
use crate::config::{DetectorConfig, ServiceEndpoint};
use crate::error::{Error, Result};
use crate::traits::{HttpTransport, TransportError};

/// Longest slice of a bad body echoed back in an error
const MAX_ECHOED_BODY: usize = 64;

/// A detected public address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicAddress {
    pub address: Address,
    /// Name of the endpoint that answered
    pub source: String,
    pub detected_at: DateTime<Utc>,
}

/// Why one endpoint could not provide an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    /// Endpoint name
    pub endpoint: String,
    pub cause: TransportError,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.cause)
    }
}

/// Public IP detector with ordered endpoint fallback
///
/// Cheap to clone; clones share the transport, cache, endpoint list and
/// refresh lock.
#[derive(Clone)]
pub struct PublicIpDetector {
    transport: Arc<dyn HttpTransport>,
    cache: ResolutionCache<PublicAddress>,
    endpoints: Arc<RwLock<Vec<ServiceEndpoint>>>,
    cache_ttl: Duration,
    family: Option<Family>,
    refresh: Arc<Mutex<()>>,
    last_source: Arc<RwLock<Option<String>>>,
}

impl PublicIpDetector {
    /// Create a detector over `transport`, caching into `cache`
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: ResolutionCache<PublicAddress>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            transport,
            cache,
            cache_ttl: config.cache_ttl(),
            family: config.family,
            endpoints: Arc::new(RwLock::new(config.endpoints)),
            refresh: Arc::new(Mutex::new(())),
            last_source: Arc::new(RwLock::new(None)),
        }
    }

    fn cache_key(&self) -> &'static str {
        match self.family {
            None => "public:any",
            Some(Family::V4) => "public:v4",
            Some(Family::V6) => "public:v6",
        }
    }

    /// Detect the public address
    ///
    /// # Returns
    ///
    /// - `Ok(PublicAddress)`: From cache, or from the first endpoint that
    ///   answered with a valid address
    /// - `Err(Error::AllServicesUnavailable)`: Every enabled endpoint failed
    ///   (the attempt list is empty when no endpoint is enabled)
    pub async fn detect(&self) -> Result<PublicAddress> {
        let key = self.cache_key();
        if let Some(hit) = self.cache.get(key).await {
            debug!("Public IP cache hit ({})", hit.address);
            return Ok(hit);
        }

        let _refresh = self.refresh.lock().await;
        if let Some(hit) = self.cache.get(key).await {
            debug!("Public IP refreshed by a concurrent caller ({})", hit.address);
            return Ok(hit);
        }

        let endpoints = self.endpoints.read().await.clone();
        let mut attempts = Vec::new();

        for endpoint in endpoints.iter().filter(|e| e.enabled) {
            match self.query_endpoint(endpoint).await {
                Ok(address) => {
                    let detected = PublicAddress {
                        address,
                        source: endpoint.name.clone(),
                        detected_at: Utc::now(),
                    };
                    info!("Detected public IP {} via {}", detected.address, detected.source);

                    self.cache.put(key, detected.clone(), self.cache_ttl).await;
                    *self.last_source.write().await = Some(endpoint.name.clone());
                    return Ok(detected);
                }
                Err(cause) => {
                    warn!("Public IP endpoint {} failed: {}", endpoint.name, cause);
                    attempts.push(EndpointFailure {
                        endpoint: endpoint.name.clone(),
                        cause,
                    });
                }
            }
        }

        error!("All public IP endpoints failed ({} attempted)", attempts.len());
        Err(Error::AllServicesUnavailable { attempts })
    }

    /// Like [`PublicIpDetector::detect`], abandoned after `deadline`
    ///
    /// Abandoning leaves the cache untouched.
    pub async fn detect_with_deadline(&self, deadline: Duration) -> Result<PublicAddress> {
        tokio::time::timeout(deadline, self.detect())
            .await
            .map_err(|_| Error::timeout("public ip", deadline))?
    }

    /// Query one endpoint by name, bypassing the cache
    ///
    /// Disabled endpoints can be probed too. The cache is not updated.
    pub async fn probe_endpoint(&self, name: &str) -> Result<PublicAddress> {
        let endpoint = self
            .endpoints
            .read()
            .await
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown endpoint '{}'", name)))?;

        match self.query_endpoint(&endpoint).await {
            Ok(address) => Ok(PublicAddress {
                address,
                source: endpoint.name,
                detected_at: Utc::now(),
            }),
            Err(cause) => Err(Error::AllServicesUnavailable {
                attempts: vec![EndpointFailure {
                    endpoint: endpoint.name,
                    cause,
                }],
            }),
        }
    }

    /// Drop the cached address so the next `detect` queries endpoints
    pub async fn invalidate(&self) -> bool {
        self.cache.invalidate(self.cache_key()).await
    }

    /// Current endpoint list, in fallback order
    pub async fn endpoints(&self) -> Vec<ServiceEndpoint> {
        self.endpoints.read().await.clone()
    }

    /// Replace the endpoint list
    ///
    /// Takes effect for the next `detect`; the cached address is dropped.
    pub async fn reload_endpoints(&self, endpoints: Vec<ServiceEndpoint>) -> Result<()> {
        for endpoint in &endpoints {
            endpoint.validate()?;
        }
        *self.endpoints.write().await = endpoints;
        self.invalidate().await;
        Ok(())
    }

    /// Name of the endpoint that produced the most recent detection
    pub async fn last_source(&self) -> Option<String> {
        self.last_source.read().await.clone()
    }

    async fn query_endpoint(
        &self,
        endpoint: &ServiceEndpoint,
    ) -> std::result::Result<Address, TransportError> {
        let timeout = endpoint.timeout();
        let body = tokio::time::timeout(timeout, self.transport.fetch(&endpoint.url, timeout))
            .await
            .map_err(|_| TransportError::Timeout)??;

        let text = body.trim();
        let address = Address::parse(text).map_err(|_| {
            let echoed: String = text.chars().take(MAX_ECHOED_BODY).collect();
            TransportError::malformed(format!("Invalid IP address: {}", echoed))
        })?;

        if let Some(family) = self.family
            && address.family() != family
        {
            return Err(TransportError::malformed(format!(
                "Expected {}, got: {}",
                family, address
            )));
        }

        Ok(address)
    }
}
