// # DNS Resolver
//
// Forward and reverse lookups through an injected `DnsTransport`, backed by
// the shared `ResolutionCache`.
//
// ## Query Flow
//
// 1. Validate and normalize the query locally (no I/O on bad input)
// 2. Return the cached result if a live entry exists
// 3. Otherwise ask the transport under the configured deadline
// 4. Cache successful, non-empty answers; never cache failures
//
// ## Concurrency
//
// Each query is independent. `resolve_batch` fans queries out as separate
// tokio tasks bounded by `DnsConfig::max_concurrent`.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::error::Elapsed;
use tracing::{debug, info, warn};

use crate::address::{Address, Family};
use crate::cache::{CacheStats, ResolutionCache};
use crate::config::DnsConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsTransport, TransportError};
use crate::validators;

/// Direction of a DNS query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Hostname to addresses
    Forward,
    /// Address to hostnames
    Reverse,
}

/// A single answer record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Answer {
    Address(Address),
    Hostname(String),
}

impl Answer {
    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Answer::Address(address) => Some(address),
            Answer::Hostname(_) => None,
        }
    }

    pub fn as_hostname(&self) -> Option<&str> {
        match self {
            Answer::Address(_) => None,
            Answer::Hostname(name) => Some(name),
        }
    }
}

/// Outcome of a successful lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    /// Normalized query text
    pub query: String,
    pub query_type: QueryType,
    /// Answers in the order the transport returned them
    pub answers: Vec<Answer>,
    /// Name of the transport that produced the answers
    pub source: String,
    /// When the transport answered (cached results keep the original time)
    pub timestamp: DateTime<Utc>,
}

impl ResolutionResult {
    pub fn addresses(&self) -> Vec<Address> {
        self.answers.iter().filter_map(Answer::as_address).copied().collect()
    }

    pub fn hostnames(&self) -> Vec<&str> {
        self.answers.iter().filter_map(Answer::as_hostname).collect()
    }
}

/// Lowercase, strip one trailing dot and validate
fn normalize_hostname(hostname: &str) -> Result<String> {
    validators::validate_hostname(hostname).map_err(|violation| Error::InvalidHostname {
        input: hostname.to_string(),
        violation,
    })?;
    let trimmed = hostname.strip_suffix('.').unwrap_or(hostname);
    Ok(trimmed.to_ascii_lowercase())
}

/// Caching DNS resolver
///
/// Cheap to clone; clones share the transport and the cache.
///
/// # Example
///
/// ```rust,ignore
/// use ipdef_core::{DnsConfig, DnsResolver, ResolutionCache};
/// use std::sync::Arc;
///
/// let cache = ResolutionCache::new();
/// let resolver = DnsResolver::new(Arc::new(transport), cache, DnsConfig::default());
/// let result = resolver.resolve_forward("example.com").await?;
/// for address in result.addresses() {
///     println!("{}", address);
/// }
/// ```
#[derive(Clone)]
pub struct DnsResolver {
    transport: Arc<dyn DnsTransport>,
    cache: ResolutionCache<ResolutionResult>,
    config: DnsConfig,
}

impl DnsResolver {
    /// Create a resolver over `transport`, caching into `cache`
    pub fn new(
        transport: Arc<dyn DnsTransport>,
        cache: ResolutionCache<ResolutionResult>,
        config: DnsConfig,
    ) -> Self {
        Self {
            transport,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &DnsConfig {
        &self.config
    }

    /// Resolve a hostname to its addresses
    ///
    /// # Returns
    ///
    /// - `Ok(ResolutionResult)`: Address answers, possibly from cache
    /// - `Err(Error::InvalidHostname)`: Rejected before any I/O
    /// - `Err(Error::ResolutionTimeout)`: The configured deadline passed
    /// - `Err(Error::ResolutionFailed)`: Transport error or no records
    pub async fn resolve_forward(&self, hostname: &str) -> Result<ResolutionResult> {
        self.forward(hostname, self.config.timeout()).await
    }

    /// Like [`DnsResolver::resolve_forward`], with a caller deadline
    ///
    /// The effective deadline is the shorter of `deadline` and the
    /// configured timeout.
    pub async fn resolve_forward_with_deadline(
        &self,
        hostname: &str,
        deadline: Duration,
    ) -> Result<ResolutionResult> {
        self.forward(hostname, deadline.min(self.config.timeout())).await
    }

    /// Resolve a hostname, keeping only answers of `family`
    ///
    /// Fails with `ResolutionFailed` (`NotFound`) if no answer matches.
    pub async fn resolve_forward_family(
        &self,
        hostname: &str,
        family: Family,
    ) -> Result<ResolutionResult> {
        let mut result = self.resolve_forward(hostname).await?;
        result
            .answers
            .retain(|answer| answer.as_address().is_some_and(|a| a.family() == family));

        if result.answers.is_empty() {
            return Err(Error::resolution_failed(
                result.query,
                TransportError::not_found(format!("no {} records", family)),
            ));
        }
        Ok(result)
    }

    /// Resolve an address to its hostnames
    pub async fn resolve_reverse(&self, address: &Address) -> Result<ResolutionResult> {
        self.reverse(address, self.config.timeout()).await
    }

    /// Like [`DnsResolver::resolve_reverse`], with a caller deadline
    pub async fn resolve_reverse_with_deadline(
        &self,
        address: &Address,
        deadline: Duration,
    ) -> Result<ResolutionResult> {
        self.reverse(address, deadline.min(self.config.timeout())).await
    }

    /// Resolve many hostnames concurrently
    ///
    /// Each hostname is an independent task; one failure does not affect
    /// the others. Results are returned in input order.
    pub async fn resolve_batch<I, S>(&self, hostnames: I) -> Vec<Result<ResolutionResult>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = hostnames.into_iter().map(Into::into).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for (index, name) in names.iter().cloned().enumerate() {
            let resolver = self.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, resolver.resolve_forward(&name).await)
            });
        }

        let mut slots: Vec<Option<Result<ResolutionResult>>> = names.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!("DNS batch task failed: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(names)
            .map(|(slot, name)| {
                slot.unwrap_or_else(|| {
                    Err(Error::resolution_failed(
                        name,
                        TransportError::connection("lookup task did not complete"),
                    ))
                })
            })
            .collect()
    }

    /// Drop every cached answer
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn forward(&self, hostname: &str, timeout: Duration) -> Result<ResolutionResult> {
        let query = normalize_hostname(hostname)?;
        let key = format!("forward:{}", query);

        if let Some(hit) = self.cached(&key).await {
            return Ok(hit);
        }

        let outcome = tokio::time::timeout(timeout, self.transport.lookup_host(&query)).await;
        let addrs: Vec<IpAddr> = self.settle(&query, timeout, outcome)?;
        if addrs.is_empty() {
            warn!("No address records for {}", query);
            return Err(Error::resolution_failed(
                query,
                TransportError::not_found("no address records"),
            ));
        }

        let result = ResolutionResult {
            answers: addrs.into_iter().map(|ip| Answer::Address(ip.into())).collect(),
            query,
            query_type: QueryType::Forward,
            source: self.transport.transport_name().to_string(),
            timestamp: Utc::now(),
        };
        info!(
            "Resolved {} to {} address(es) via {}",
            result.query,
            result.answers.len(),
            result.source
        );

        self.store(key, &result).await;
        Ok(result)
    }

    async fn reverse(&self, address: &Address, timeout: Duration) -> Result<ResolutionResult> {
        let query = address.text_form();
        let key = format!("reverse:{}", query);

        if let Some(hit) = self.cached(&key).await {
            return Ok(hit);
        }

        let outcome =
            tokio::time::timeout(timeout, self.transport.lookup_addr((*address).into())).await;
        let names: Vec<String> = self.settle(&query, timeout, outcome)?;
        if names.is_empty() {
            warn!("No PTR records for {}", query);
            return Err(Error::resolution_failed(
                query,
                TransportError::not_found("no PTR records"),
            ));
        }

        let result = ResolutionResult {
            answers: names.into_iter().map(Answer::Hostname).collect(),
            query,
            query_type: QueryType::Reverse,
            source: self.transport.transport_name().to_string(),
            timestamp: Utc::now(),
        };
        info!(
            "Reverse-resolved {} to {} hostname(s) via {}",
            result.query,
            result.answers.len(),
            result.source
        );

        self.store(key, &result).await;
        Ok(result)
    }

    async fn cached(&self, key: &str) -> Option<ResolutionResult> {
        if !self.config.enable_cache {
            return None;
        }
        let hit = self.cache.get(key).await;
        if hit.is_some() {
            debug!("Cache hit for {}", key);
        } else {
            debug!("Cache miss for {}", key);
        }
        hit
    }

    async fn store(&self, key: String, result: &ResolutionResult) {
        if self.config.enable_cache {
            self.cache.put(key, result.clone(), self.config.cache_ttl()).await;
        }
    }

    /// Map a timed transport call onto the core error kinds
    fn settle<T>(
        &self,
        query: &str,
        timeout: Duration,
        outcome: std::result::Result<std::result::Result<T, TransportError>, Elapsed>,
    ) -> Result<T> {
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(TransportError::Timeout)) | Err(_) => {
                warn!("DNS query for {} timed out after {:?}", query, timeout);
                Err(Error::timeout(query, timeout))
            }
            Ok(Err(cause)) => {
                warn!("DNS query for {} failed: {}", query, cause);
                Err(Error::resolution_failed(query, cause))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DnsTransport for StaticTransport {
        async fn lookup_host(
            &self,
            hostname: &str,
        ) -> std::result::Result<Vec<IpAddr>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match hostname {
                "dual.example" => Ok(vec![
                    "192.0.2.1".parse().unwrap(),
                    "2001:db8::1".parse().unwrap(),
                ]),
                "empty.example" => Ok(vec![]),
                _ => Err(TransportError::not_found(hostname)),
            }
        }

        async fn lookup_addr(
            &self,
            _addr: IpAddr,
        ) -> std::result::Result<Vec<String>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["host.example".to_string()])
        }

        fn transport_name(&self) -> &'static str {
            "static"
        }
    }

    fn setup(config: DnsConfig) -> (DnsResolver, Arc<StaticTransport>) {
        let transport = Arc::new(StaticTransport {
            calls: AtomicUsize::new(0),
        });
        let resolver = DnsResolver::new(transport.clone(), ResolutionCache::new(), config);
        (resolver, transport)
    }

    #[test]
    fn test_normalize_hostname() {
        assert_eq!(normalize_hostname("Example.COM.").unwrap(), "example.com");
        assert!(matches!(
            normalize_hostname("bad_host.example"),
            Err(Error::InvalidHostname { .. })
        ));
        assert!(normalize_hostname("").is_err());
    }

    #[tokio::test]
    async fn test_forward_preserves_order_and_caches() {
        let (resolver, transport) = setup(DnsConfig::default());

        let first = resolver.resolve_forward("Dual.Example.").await.unwrap();
        assert_eq!(first.query, "dual.example");
        assert_eq!(first.query_type, QueryType::Forward);
        assert_eq!(first.source, "static");
        assert_eq!(
            first.addresses(),
            vec![Address::parse("192.0.2.1").unwrap(), Address::parse("2001:db8::1").unwrap()]
        );

        let second = resolver.resolve_forward("dual.example").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_queries() {
        let config = DnsConfig {
            enable_cache: false,
            ..DnsConfig::default()
        };
        let (resolver, transport) = setup(config);

        resolver.resolve_forward("dual.example").await.unwrap();
        resolver.resolve_forward("dual.example").await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cache_stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_empty_answer_is_not_found_and_not_cached() {
        let (resolver, transport) = setup(DnsConfig::default());

        for _ in 0..2 {
            let err = resolver.resolve_forward("empty.example").await.unwrap_err();
            assert!(matches!(
                err,
                Error::ResolutionFailed {
                    cause: TransportError::NotFound(_),
                    ..
                }
            ));
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_family_filter() {
        let (resolver, _) = setup(DnsConfig::default());

        let v6 = resolver.resolve_forward_family("dual.example", Family::V6).await.unwrap();
        assert_eq!(v6.addresses(), vec![Address::parse("2001:db8::1").unwrap()]);
    }

    #[tokio::test]
    async fn test_reverse_uses_text_form_key() {
        let (resolver, transport) = setup(DnsConfig::default());
        let address = Address::parse("2001:0db8::0001").unwrap();

        let result = resolver.resolve_reverse(&address).await.unwrap();
        assert_eq!(result.query, "2001:db8::1");
        assert_eq!(result.hostnames(), vec!["host.example"]);

        resolver.resolve_reverse(&address).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        resolver.clear_cache().await;
        resolver.resolve_reverse(&address).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_result_serializes() {
        let (resolver, _) = setup(DnsConfig::default());
        let result = resolver.resolve_forward("dual.example").await.unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["query_type"], "forward");
        assert_eq!(json["answers"][0]["type"], "address");
        assert_eq!(json["answers"][0]["value"], "192.0.2.1");
    }
}
