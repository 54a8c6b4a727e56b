//! Error types for the IP analysis core
//!
//! This module defines all error types used throughout the crate.

use std::time::Duration;

use thiserror::Error;

use crate::address::Family;
use crate::detector::EndpointFailure;
use crate::traits::TransportError;
use crate::validators::Violation;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for address analysis and resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Text could not be parsed as an IPv4 or IPv6 literal
    #[error("Invalid address format '{input}': {violation}")]
    InvalidAddressFormat {
        /// The rejected input
        input: String,
        /// The specific rule that was violated
        violation: Violation,
    },

    /// Text could not be parsed as `address/prefix`
    #[error("Invalid CIDR format '{input}': {reason}")]
    InvalidCidrFormat {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Prefix length outside the family bounds or not valid for the operation
    #[error("Invalid prefix /{prefix}: {reason}")]
    InvalidPrefix {
        /// The offending prefix length
        prefix: u8,
        /// Why it was rejected
        reason: String,
    },

    /// Operation mixed an IPv4 and an IPv6 value
    #[error("Incompatible address family: expected {expected}, got {found}")]
    IncompatibleFamily {
        /// Family of the receiver
        expected: Family,
        /// Family of the argument
        found: Family,
    },

    /// Hostname rejected before any lookup was attempted
    #[error("Invalid hostname '{input}': {violation}")]
    InvalidHostname {
        /// The rejected hostname
        input: String,
        /// The specific rule that was violated
        violation: Violation,
    },

    /// The underlying transport failed to answer the query
    #[error("Resolution of '{query}' failed: {cause}")]
    ResolutionFailed {
        /// The query that failed
        query: String,
        /// Transport-level cause
        cause: TransportError,
    },

    /// The query did not complete before its deadline
    #[error("Resolution of '{query}' timed out after {timeout:?}")]
    ResolutionTimeout {
        /// The query that timed out
        query: String,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// Every enabled public-IP endpoint failed
    #[error("All public IP services unavailable ({} attempted)", attempts.len())]
    AllServicesUnavailable {
        /// Per-endpoint failure, in the order endpoints were tried
        attempts: Vec<EndpointFailure>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid address error
    pub fn invalid_address(input: impl Into<String>, violation: Violation) -> Self {
        Self::InvalidAddressFormat {
            input: input.into(),
            violation,
        }
    }

    /// Create an invalid CIDR error
    pub fn invalid_cidr(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCidrFormat {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid prefix error
    pub fn invalid_prefix(prefix: u8, reason: impl Into<String>) -> Self {
        Self::InvalidPrefix {
            prefix,
            reason: reason.into(),
        }
    }

    /// Create an incompatible family error
    pub fn incompatible(expected: Family, found: Family) -> Self {
        Self::IncompatibleFamily { expected, found }
    }

    /// Create a resolution failure
    pub fn resolution_failed(query: impl Into<String>, cause: TransportError) -> Self {
        Self::ResolutionFailed {
            query: query.into(),
            cause,
        }
    }

    /// Create a resolution timeout
    pub fn timeout(query: impl Into<String>, timeout: Duration) -> Self {
        Self::ResolutionTimeout {
            query: query.into(),
            timeout,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error came from malformed caller input rather than I/O
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddressFormat { .. }
                | Self::InvalidCidrFormat { .. }
                | Self::InvalidPrefix { .. }
                | Self::IncompatibleFamily { .. }
                | Self::InvalidHostname { .. }
        )
    }
}
