//! Core traits for the analysis core
//!
//! These are the seams through which all network traffic flows, so the
//! resolver and detector can be exercised against fakes.
//!
//! - [`DnsTransport`]: Forward and reverse DNS lookups
//! - [`HttpTransport`]: Plain-text GETs against public-IP echo services
//! - [`TransportError`]: Failure kinds shared by both transports

pub mod dns_transport;
pub mod http_transport;
pub mod transport_error;

pub use dns_transport::DnsTransport;
pub use http_transport::HttpTransport;
pub use transport_error::TransportError;
