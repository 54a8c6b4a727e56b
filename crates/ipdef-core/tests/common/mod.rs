//! Test doubles and common utilities for contract tests
//!
//! The transports here answer from scripted tables and count every call,
//! so tests can assert exactly when the core touches the network.

#![allow(dead_code)]

use async_trait::async_trait;
use ipdef_core::traits::{DnsTransport, HttpTransport, TransportError};
use ipdef_core::{Address, ServiceEndpoint};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Scripted<T> = Result<T, TransportError>;

/// A DnsTransport answering from fixed tables
pub struct ScriptedDnsTransport {
    hosts: HashMap<String, Scripted<Vec<IpAddr>>>,
    ptrs: HashMap<IpAddr, Scripted<Vec<String>>>,
    /// Simulated network latency for every lookup
    delay: Option<Duration>,
    /// Call counter for lookup_host() and lookup_addr()
    lookup_call_count: Arc<AtomicUsize>,
    /// Lookups currently in progress
    in_flight: Arc<AtomicUsize>,
    /// Highest value `in_flight` ever reached
    peak_in_flight: Arc<AtomicUsize>,
}

impl ScriptedDnsTransport {
    pub fn new() -> Self {
        Self {
            hosts: HashMap::new(),
            ptrs: HashMap::new(),
            delay: None,
            lookup_call_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer `hostname` with the given addresses
    pub fn with_host(mut self, hostname: &str, addrs: &[&str]) -> Self {
        let addrs = addrs.iter().map(|a| a.parse().unwrap()).collect();
        self.hosts.insert(hostname.to_string(), Ok(addrs));
        self
    }

    /// Fail lookups of `hostname` with `error`
    pub fn with_host_error(mut self, hostname: &str, error: TransportError) -> Self {
        self.hosts.insert(hostname.to_string(), Err(error));
        self
    }

    /// Answer reverse lookups of `addr` with the given names
    pub fn with_ptr(mut self, addr: &str, names: &[&str]) -> Self {
        let names = names.iter().map(|n| n.to_string()).collect();
        self.ptrs.insert(addr.parse().unwrap(), Ok(names));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of lookups performed
    pub fn lookup_call_count(&self) -> usize {
        self.lookup_call_count.load(Ordering::SeqCst)
    }

    /// Get the highest number of concurrent lookups observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.lookup_call_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DnsTransport for ScriptedDnsTransport {
    async fn lookup_host(&self, hostname: &str) -> Result<Vec<IpAddr>, TransportError> {
        self.enter().await;
        let answer = self
            .hosts
            .get(hostname)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::not_found(hostname)));
        self.leave();
        answer
    }

    async fn lookup_addr(&self, addr: IpAddr) -> Result<Vec<String>, TransportError> {
        self.enter().await;
        let answer = self
            .ptrs
            .get(&addr)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::not_found(addr.to_string())));
        self.leave();
        answer
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// An HttpTransport answering from a URL table
pub struct ScriptedHttpTransport {
    bodies: HashMap<String, Scripted<String>>,
    delays: HashMap<String, Duration>,
    /// URLs requested, in order
    requested: Arc<Mutex<Vec<String>>>,
}

impl ScriptedHttpTransport {
    pub fn new() -> Self {
        Self {
            bodies: HashMap::new(),
            delays: HashMap::new(),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make the endpoint named `name` answer with `body`
    pub fn with_body(mut self, name: &str, body: &str) -> Self {
        self.bodies.insert(url_for(name), Ok(body.to_string()));
        self
    }

    /// Make the endpoint named `name` fail with `error`
    pub fn with_error(mut self, name: &str, error: TransportError) -> Self {
        self.bodies.insert(url_for(name), Err(error));
        self
    }

    /// Delay responses from the endpoint named `name`
    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(url_for(name), delay);
        self
    }

    /// Get the URLs requested so far
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    /// Get the number of fetches performed
    pub fn fetch_call_count(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedHttpTransport {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, TransportError> {
        self.requested.lock().unwrap().push(url.to_string());

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        self.bodies
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::connection("connection refused")))
    }
}

/// URL the scripted transport uses for endpoint `name`
pub fn url_for(name: &str) -> String {
    format!("https://{}.test/ip", name)
}

/// Enabled endpoint named `name` with the default timeout
pub fn endpoint(name: &str) -> ServiceEndpoint {
    ServiceEndpoint::new(name, url_for(name))
}

pub fn addr(text: &str) -> Address {
    Address::parse(text).unwrap()
}
