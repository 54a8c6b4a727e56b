// # ipdef-core
//
// Core library for IP address analysis and resolution.
//
// ## Architecture Overview
//
// This library provides:
// - **Address**: Parsed IPv4/IPv6 value with classification predicates
// - **NetworkBlock**: CIDR block arithmetic (ranges, masks, subnet splits)
// - **validators**: Pure syntax and range checks used by the models
// - **ResolutionCache**: Shared TTL cache consulted before any network I/O
// - **DnsResolver**: Forward/reverse lookups through an injected `DnsTransport`
// - **PublicIpDetector**: Ordered endpoint fallback through an injected `HttpTransport`
// - **IpAnalyzer**: Caller-facing facade used by CLI/GUI/REST adapters
//
// ## Design Principles
//
// 1. **Pure models**: Address and network types never perform I/O
// 2. **Injected transports**: All DNS/HTTP traffic goes through traits so it can be faked
// 3. **Explicit cache ownership**: Caches are constructed by the caller and passed in
// 4. **Typed failures**: Every operation returns `Result<_, Error>`; nothing panics

pub mod address;
pub mod api;
pub mod cache;
pub mod config;
pub mod detector;
pub mod error;
pub mod network;
pub mod resolver;
pub mod traits;
pub mod validators;

// Re-export core types for convenience
pub use address::{Address, AddressInfo, Family, Ipv4Address, Ipv6Address, Ipv6Scope};
pub use api::{IpAnalyzer, classify_address, compute_network, parse_address};
pub use cache::{CacheStats, ResolutionCache};
pub use config::{CacheConfig, DetectorConfig, DnsConfig, IpdefConfig, ServiceEndpoint};
pub use detector::{EndpointFailure, PublicAddress, PublicIpDetector};
pub use error::{Error, Result};
pub use network::{NetworkBlock, NetworkInfo, Subnets};
pub use resolver::{Answer, DnsResolver, QueryType, ResolutionResult};
pub use traits::{DnsTransport, HttpTransport, TransportError};
pub use validators::Violation;
