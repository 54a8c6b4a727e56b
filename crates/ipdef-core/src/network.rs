//! CIDR network blocks
//!
//! A [`NetworkBlock`] wraps a truncated [`ipnet::IpNet`]: the base address
//! with its host bits zeroed plus a prefix length. Masks, ranges,
//! containment and subnet splits come from `ipnet`; this module adds the
//! family checks, the error mapping and the counts.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::{IpAddrRange, IpNet, IpSubnets};
use serde::{Deserialize, Serialize};

use crate::address::{Address, Family};
use crate::error::{Error, Result};
use crate::validators;

/// A CIDR block such as `10.0.0.0/24` or `2001:db8::/32`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkBlock {
    net: IpNet,
}

impl NetworkBlock {
    /// Build a block from any address inside it
    ///
    /// Host bits of `address` are zeroed.
    ///
    /// # Returns
    ///
    /// - `Ok(NetworkBlock)`: The normalized block
    /// - `Err(Error::InvalidPrefix)`: If `prefix` exceeds the family width
    pub fn new(address: Address, prefix: u8) -> Result<Self> {
        validators::validate_prefix(prefix, address.family())
            .map_err(|violation| Error::invalid_prefix(prefix, violation.to_string()))?;

        let net = IpNet::new(IpAddr::from(address), prefix)
            .map_err(|e| Error::invalid_prefix(prefix, e.to_string()))?;
        Ok(Self { net: net.trunc() })
    }

    /// Parse `address/prefix` text
    ///
    /// Every syntax problem, including a prefix outside the family bounds,
    /// is reported as [`Error::InvalidCidrFormat`].
    pub fn from_cidr(text: &str) -> Result<Self> {
        let (address_text, prefix_text) = text
            .split_once('/')
            .ok_or_else(|| Error::invalid_cidr(text, "missing '/' separator"))?;

        if prefix_text.contains('/') {
            return Err(Error::invalid_cidr(text, "more than one '/' separator"));
        }

        let address = Address::parse(address_text)
            .map_err(|e| Error::invalid_cidr(text, e.to_string()))?;

        let prefix = validators::parse_prefix(prefix_text, address.family())
            .map_err(|violation| Error::invalid_cidr(text, violation.to_string()))?;

        Self::new(address, prefix).map_err(|e| Error::invalid_cidr(text, e.to_string()))
    }

    pub fn family(&self) -> Family {
        match self.net {
            IpNet::V4(_) => Family::V4,
            IpNet::V6(_) => Family::V6,
        }
    }

    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    fn host_bits(&self) -> u32 {
        u32::from(self.net.max_prefix_len() - self.net.prefix_len())
    }

    fn is_v4_with_broadcast(&self) -> bool {
        self.family() == Family::V4 && self.prefix_len() < 31
    }

    pub fn network_address(&self) -> Address {
        self.net.network().into()
    }

    /// Highest address in the block; only defined for IPv4
    pub fn broadcast_address(&self) -> Option<Address> {
        match self.family() {
            Family::V4 => Some(self.last_address()),
            Family::V6 => None,
        }
    }

    /// Highest address in the block, for either family
    pub fn last_address(&self) -> Address {
        self.net.broadcast().into()
    }

    pub fn netmask(&self) -> Address {
        self.net.netmask().into()
    }

    pub fn hostmask(&self) -> Address {
        self.net.hostmask().into()
    }

    /// Total number of addresses, `None` when it does not fit in a `u128`
    pub fn address_count(&self) -> Option<u128> {
        1u128.checked_shl(self.host_bits())
    }

    /// Number of usable host addresses
    ///
    /// IPv4 blocks shorter than /31 exclude the network and broadcast
    /// addresses. An IPv6 /0 saturates at `u128::MAX`.
    pub fn host_count(&self) -> u128 {
        let total = self.address_count().unwrap_or(u128::MAX);
        if self.is_v4_with_broadcast() {
            total - 2
        } else {
            total
        }
    }

    pub fn first_host(&self) -> Address {
        self.net
            .hosts()
            .next()
            .map_or_else(|| self.network_address(), Address::from)
    }

    pub fn last_host(&self) -> Address {
        self.net
            .hosts()
            .next_back()
            .map_or_else(|| self.last_address(), Address::from)
    }

    /// Lazily iterate over usable host addresses
    pub fn hosts(&self) -> Hosts {
        Hosts {
            range: self.net.hosts(),
        }
    }

    fn ensure_family(&self, other: Family) -> Result<()> {
        if self.family() != other {
            return Err(Error::incompatible(self.family(), other));
        }
        Ok(())
    }

    pub fn contains_address(&self, address: &Address) -> Result<bool> {
        self.ensure_family(address.family())?;
        Ok(self.net.contains(&IpAddr::from(*address)))
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains_network(&self, other: &NetworkBlock) -> Result<bool> {
        self.ensure_family(other.family())?;
        Ok(self.net.contains(&other.net))
    }

    /// Whether the two blocks share at least one address
    pub fn overlaps(&self, other: &NetworkBlock) -> Result<bool> {
        self.ensure_family(other.family())?;
        Ok(self.net.contains(&other.net) || other.net.contains(&self.net))
    }

    /// Split into children of `new_prefix`
    ///
    /// The returned [`Subnets`] is lazy and can be iterated any number of
    /// times; each pass yields `2^(new_prefix - prefix_len)` disjoint blocks
    /// in ascending order that together cover this block.
    ///
    /// # Returns
    ///
    /// - `Ok(Subnets)`: The child sequence
    /// - `Err(Error::InvalidPrefix)`: If `new_prefix` is not longer than the
    ///   current prefix or exceeds the family width
    pub fn subdivide(&self, new_prefix: u8) -> Result<Subnets> {
        if new_prefix <= self.prefix_len() {
            return Err(Error::invalid_prefix(
                new_prefix,
                format!("must be longer than /{}", self.prefix_len()),
            ));
        }
        if new_prefix > self.net.max_prefix_len() {
            return Err(Error::invalid_prefix(
                new_prefix,
                format!(
                    "exceeds maximum /{} for {}",
                    self.net.max_prefix_len(),
                    self.family()
                ),
            ));
        }

        let children = self
            .net
            .subnets(new_prefix)
            .map_err(|e| Error::invalid_prefix(new_prefix, e.to_string()))?;

        Ok(Subnets {
            children,
            parent_prefix: self.prefix_len(),
            new_prefix,
        })
    }

    /// The enclosing block of `new_prefix`
    pub fn supernet(&self, new_prefix: u8) -> Result<NetworkBlock> {
        if new_prefix >= self.prefix_len() {
            return Err(Error::invalid_prefix(
                new_prefix,
                format!("must be shorter than /{}", self.prefix_len()),
            ));
        }
        Self::new(self.network_address(), new_prefix)
    }

    /// Summary of the block, for adapters
    pub fn to_info(&self) -> NetworkInfo {
        let network_address = self.network_address();
        NetworkInfo {
            network: self.to_string(),
            version: self.family().version(),
            prefix_len: self.prefix_len(),
            network_address: network_address.text_form(),
            broadcast_address: self.broadcast_address().map(|a| a.text_form()),
            netmask: self.netmask().text_form(),
            hostmask: self.hostmask().text_form(),
            first_host: self.first_host().text_form(),
            last_host: self.last_host().text_form(),
            host_count: self.host_count(),
            is_private: network_address.is_private(),
        }
    }
}

impl fmt::Display for NetworkBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network_address(), self.prefix_len())
    }
}

impl FromStr for NetworkBlock {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_cidr(s)
    }
}

impl TryFrom<String> for NetworkBlock {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_cidr(&value)
    }
}

impl From<NetworkBlock> for String {
    fn from(block: NetworkBlock) -> Self {
        block.to_string()
    }
}

/// Iterator over the usable hosts of a block
#[derive(Debug, Clone)]
pub struct Hosts {
    range: IpAddrRange,
}

impl Iterator for Hosts {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        self.range.next().map(Address::from)
    }
}

/// Restartable sequence of child blocks produced by [`NetworkBlock::subdivide`]
#[derive(Debug, Clone)]
pub struct Subnets {
    children: IpSubnets,
    parent_prefix: u8,
    new_prefix: u8,
}

impl Subnets {
    pub fn new_prefix(&self) -> u8 {
        self.new_prefix
    }

    /// Number of children, `None` when it does not fit in a `u128`
    pub fn count(&self) -> Option<u128> {
        1u128.checked_shl(u32::from(self.new_prefix - self.parent_prefix))
    }

    /// Start a fresh pass from the first child
    pub fn iter(&self) -> SubnetIter {
        SubnetIter {
            children: self.children.clone(),
        }
    }
}

impl IntoIterator for Subnets {
    type Item = NetworkBlock;
    type IntoIter = SubnetIter;

    fn into_iter(self) -> SubnetIter {
        SubnetIter {
            children: self.children,
        }
    }
}

impl IntoIterator for &Subnets {
    type Item = NetworkBlock;
    type IntoIter = SubnetIter;

    fn into_iter(self) -> SubnetIter {
        self.iter()
    }
}

/// One pass over a [`Subnets`] sequence
#[derive(Debug, Clone)]
pub struct SubnetIter {
    children: IpSubnets,
}

impl Iterator for SubnetIter {
    type Item = NetworkBlock;

    fn next(&mut self) -> Option<NetworkBlock> {
        self.children.next().map(|net| NetworkBlock { net })
    }
}

/// Network summary, for adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub network: String,
    pub version: u8,
    pub prefix_len: u8,
    pub network_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_address: Option<String>,
    pub netmask: String,
    pub hostmask: String,
    pub first_host: String,
    pub last_host: String,
    /// Emitted as a JSON number when it fits in a `u64`, otherwise as a
    /// decimal string
    #[serde(serialize_with = "serialize_count")]
    pub host_count: u128,
    pub is_private: bool,
}

fn serialize_count<S: serde::Serializer>(
    count: &u128,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match u64::try_from(*count) {
        Ok(small) => serializer.serialize_u64(small),
        Err(_) => serializer.collect_str(count),
    }
}
