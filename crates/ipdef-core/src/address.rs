//! IPv4 and IPv6 address values
//!
//! [`Address`] is a closed tagged union over [`Ipv4Address`] and
//! [`Ipv6Address`], selected at parse time from the literal's syntax.
//! Values are immutable; every predicate is a pure function of the stored
//! bits.
//!
//! ## Usage
//!
//! ```rust
//! use ipdef_core::Address;
//!
//! let addr = Address::parse("fe80::1").unwrap();
//! assert!(addr.is_link_local());
//! assert_eq!(addr.version(), 6);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::NetworkBlock;
use crate::validators::{self, Violation};

/// Address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    V4,
    V6,
}

impl Family {
    /// Number of bits in an address of this family
    pub fn bit_width(self) -> u8 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }

    /// IP version number (4 or 6)
    pub fn version(self) -> u8 {
        match self {
            Family::V4 => 4,
            Family::V6 => 6,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::V4 => f.write_str("IPv4"),
            Family::V6 => f.write_str("IPv6"),
        }
    }
}

/// Scope of an IPv6 unicast address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ipv6Scope {
    LinkLocal,
    UniqueLocal,
    Global,
}

/// Whether `bits` falls inside `net/prefix` (IPv4)
fn in_v4(bits: u32, net: u32, prefix: u32) -> bool {
    let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    bits & mask == net
}

/// An IPv4 address stored as four octets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv4Address {
    octets: [u8; 4],
}

impl Ipv4Address {
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self {
            octets: [a, b, c, d],
        }
    }

    pub const fn from_octets(octets: [u8; 4]) -> Self {
        Self { octets }
    }

    /// Parse a dotted-quad literal
    pub fn parse(text: &str) -> Result<Self> {
        validators::validate_ipv4(text)
            .map(Self::from_octets)
            .map_err(|violation| Error::invalid_address(text, violation))
    }

    pub fn octets(&self) -> [u8; 4] {
        self.octets
    }

    pub fn to_bits(&self) -> u32 {
        u32::from_be_bytes(self.octets)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self::from_octets(bits.to_be_bytes())
    }

    /// RFC 1918 private ranges
    pub fn is_private(&self) -> bool {
        let bits = self.to_bits();
        in_v4(bits, 0x0a00_0000, 8) || in_v4(bits, 0xac10_0000, 12) || in_v4(bits, 0xc0a8_0000, 16)
    }

    pub fn is_loopback(&self) -> bool {
        self.octets[0] == 127
    }

    pub fn is_multicast(&self) -> bool {
        in_v4(self.to_bits(), 0xe000_0000, 4)
    }

    pub fn is_link_local(&self) -> bool {
        in_v4(self.to_bits(), 0xa9fe_0000, 16)
    }

    pub fn is_unspecified(&self) -> bool {
        self.to_bits() == 0
    }

    pub fn is_broadcast(&self) -> bool {
        self.to_bits() == u32::MAX
    }

    /// TEST-NET-1/2/3 (RFC 5737)
    pub fn is_documentation(&self) -> bool {
        let bits = self.to_bits();
        in_v4(bits, 0xc000_0200, 24) || in_v4(bits, 0xc633_6400, 24) || in_v4(bits, 0xcb00_7100, 24)
    }

    /// Carrier-grade NAT space 100.64.0.0/10 (RFC 6598)
    pub fn is_shared(&self) -> bool {
        in_v4(self.to_bits(), 0x6440_0000, 10)
    }

    /// 198.18.0.0/15 (RFC 2544)
    pub fn is_benchmarking(&self) -> bool {
        in_v4(self.to_bits(), 0xc612_0000, 15)
    }

    /// 240.0.0.0/4, including the limited broadcast address
    pub fn is_reserved(&self) -> bool {
        in_v4(self.to_bits(), 0xf000_0000, 4)
    }

    /// Not inside any special-purpose block
    pub fn is_global_unicast(&self) -> bool {
        let bits = self.to_bits();
        !(in_v4(bits, 0, 8)
            || self.is_private()
            || self.is_shared()
            || self.is_loopback()
            || self.is_link_local()
            || in_v4(bits, 0xc000_0000, 24)
            || self.is_documentation()
            || self.is_benchmarking()
            || self.is_multicast()
            || self.is_reserved())
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets;
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl FromStr for Ipv4Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Self::from_octets(addr.octets())
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(addr: Ipv4Address) -> Self {
        Ipv4Addr::from(addr.octets)
    }
}

/// An IPv6 address stored as eight 16-bit groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv6Address {
    groups: [u16; 8],
}

impl Ipv6Address {
    pub const fn new(groups: [u16; 8]) -> Self {
        Self { groups }
    }

    /// Parse a colon-hextet literal
    pub fn parse(text: &str) -> Result<Self> {
        validators::validate_ipv6(text)
            .map(Self::new)
            .map_err(|violation| Error::invalid_address(text, violation))
    }

    pub fn groups(&self) -> [u16; 8] {
        self.groups
    }

    pub fn octets(&self) -> [u8; 16] {
        self.to_bits().to_be_bytes()
    }

    pub fn to_bits(&self) -> u128 {
        self.groups
            .iter()
            .fold(0u128, |acc, group| (acc << 16) | u128::from(*group))
    }

    pub fn from_bits(bits: u128) -> Self {
        let mut groups = [0u16; 8];
        for (i, group) in groups.iter_mut().enumerate() {
            *group = (bits >> (112 - 16 * i)) as u16;
        }
        Self::new(groups)
    }

    pub fn is_unspecified(&self) -> bool {
        self.groups == [0; 8]
    }

    pub fn is_loopback(&self) -> bool {
        self.groups == [0, 0, 0, 0, 0, 0, 0, 1]
    }

    /// ff00::/8
    pub fn is_multicast(&self) -> bool {
        self.groups[0] & 0xff00 == 0xff00
    }

    /// fe80::/10
    pub fn is_link_local(&self) -> bool {
        self.groups[0] & 0xffc0 == 0xfe80
    }

    /// Unique local addresses, fc00::/7
    pub fn is_private(&self) -> bool {
        self.groups[0] & 0xfe00 == 0xfc00
    }

    /// 2001:db8::/32 (RFC 3849)
    pub fn is_documentation(&self) -> bool {
        self.groups[0] == 0x2001 && self.groups[1] == 0x0db8
    }

    /// ::ffff:0:0/96
    pub fn is_ipv4_mapped(&self) -> bool {
        self.groups[..5] == [0; 5] && self.groups[5] == 0xffff
    }

    /// ::/8 outside the unspecified, loopback and IPv4-mapped addresses
    pub fn is_reserved(&self) -> bool {
        self.groups[0] & 0xff00 == 0
            && !self.is_unspecified()
            && !self.is_loopback()
            && !self.is_ipv4_mapped()
    }

    /// Inside 2000::/3 and not documentation space
    pub fn is_global_unicast(&self) -> bool {
        self.groups[0] & 0xe000 == 0x2000 && !self.is_documentation()
    }

    pub fn scope(&self) -> Option<Ipv6Scope> {
        if self.is_link_local() {
            Some(Ipv6Scope::LinkLocal)
        } else if self.is_private() {
            Some(Ipv6Scope::UniqueLocal)
        } else if self.is_global_unicast() {
            Some(Ipv6Scope::Global)
        } else {
            None
        }
    }

    /// The embedded IPv4 address of an IPv4-mapped address
    pub fn to_ipv4_mapped(&self) -> Option<Ipv4Address> {
        if !self.is_ipv4_mapped() {
            return None;
        }
        let [a, b] = self.groups[6].to_be_bytes();
        let [c, d] = self.groups[7].to_be_bytes();
        Some(Ipv4Address::new(a, b, c, d))
    }

    /// Full form: eight groups of four hex digits
    pub fn exploded(&self) -> String {
        self.groups
            .iter()
            .map(|group| format!("{group:04x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Start and length of the leftmost longest run of zero groups
fn longest_zero_run(groups: &[u16; 8]) -> (usize, usize) {
    let mut best = (0, 0);
    let mut run_start = 0;
    let mut run_len = 0;

    for (i, group) in groups.iter().enumerate() {
        if *group == 0 {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
            if run_len > best.1 {
                best = (run_start, run_len);
            }
        } else {
            run_len = 0;
        }
    }

    best
}

fn write_groups(f: &mut fmt::Formatter<'_>, groups: &[u16]) -> fmt::Result {
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            f.write_str(":")?;
        }
        write!(f, "{group:x}")?;
    }
    Ok(())
}

/// RFC 5952 text form
impl fmt::Display for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v4) = self.to_ipv4_mapped() {
            return write!(f, "::ffff:{v4}");
        }

        let (start, len) = longest_zero_run(&self.groups);
        if len < 2 {
            return write_groups(f, &self.groups);
        }

        write_groups(f, &self.groups[..start])?;
        f.write_str("::")?;
        write_groups(f, &self.groups[start + len..])
    }
}

impl FromStr for Ipv6Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Ipv6Addr> for Ipv6Address {
    fn from(addr: Ipv6Addr) -> Self {
        Self::new(addr.segments())
    }
}

impl From<Ipv6Address> for Ipv6Addr {
    fn from(addr: Ipv6Address) -> Self {
        Ipv6Addr::from(addr.groups)
    }
}

/// A parsed IPv4 or IPv6 address
///
/// Equality and hashing are byte-wise; addresses of different families are
/// never equal. Ordering is only defined within a family: `partial_cmp`
/// returns `None` across families and [`Address::try_cmp`] reports
/// [`Error::IncompatibleFamily`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Address {
    V4(Ipv4Address),
    V6(Ipv6Address),
}

impl Address {
    /// Parse an IPv4 or IPv6 literal
    ///
    /// A `:` anywhere in the text selects IPv6 parsing, otherwise IPv4.
    ///
    /// # Returns
    ///
    /// - `Ok(Address)`: The parsed address
    /// - `Err(Error::InvalidAddressFormat)`: With the violated rule
    pub fn parse(text: &str) -> Result<Self> {
        if text.contains(':') {
            Ipv6Address::parse(text).map(Self::V6)
        } else {
            Ipv4Address::parse(text).map(Self::V4)
        }
    }

    /// Build an address from its unsigned integer representation
    pub fn from_bits(family: Family, bits: u128) -> Result<Self> {
        match family {
            Family::V4 => u32::try_from(bits)
                .map(|bits| Self::V4(Ipv4Address::from_bits(bits)))
                .map_err(|_| Error::invalid_address(bits.to_string(), Violation::OutOfRange)),
            Family::V6 => Ok(Self::V6(Ipv6Address::from_bits(bits))),
        }
    }

    pub fn family(&self) -> Family {
        match self {
            Self::V4(_) => Family::V4,
            Self::V6(_) => Family::V6,
        }
    }

    pub fn version(&self) -> u8 {
        self.family().version()
    }

    pub fn to_bits(&self) -> u128 {
        match self {
            Self::V4(v4) => u128::from(v4.to_bits()),
            Self::V6(v6) => v6.to_bits(),
        }
    }

    /// Normalized text form (dotted quad, or RFC 5952 compressed IPv6)
    pub fn text_form(&self) -> String {
        self.to_string()
    }

    /// Expanded text form; identical to `text_form` for IPv4
    pub fn exploded(&self) -> String {
        match self {
            Self::V4(v4) => v4.to_string(),
            Self::V6(v6) => v6.exploded(),
        }
    }

    pub fn as_v4(&self) -> Option<&Ipv4Address> {
        match self {
            Self::V4(v4) => Some(v4),
            Self::V6(_) => None,
        }
    }

    pub fn as_v6(&self) -> Option<&Ipv6Address> {
        match self {
            Self::V4(_) => None,
            Self::V6(v6) => Some(v6),
        }
    }

    pub fn is_private(&self) -> bool {
        match self {
            Self::V4(v4) => v4.is_private(),
            Self::V6(v6) => v6.is_private(),
        }
    }

    pub fn is_loopback(&self) -> bool {
        match self {
            Self::V4(v4) => v4.is_loopback(),
            Self::V6(v6) => v6.is_loopback(),
        }
    }

    pub fn is_multicast(&self) -> bool {
        match self {
            Self::V4(v4) => v4.is_multicast(),
            Self::V6(v6) => v6.is_multicast(),
        }
    }

    pub fn is_link_local(&self) -> bool {
        match self {
            Self::V4(v4) => v4.is_link_local(),
            Self::V6(v6) => v6.is_link_local(),
        }
    }

    pub fn is_global_unicast(&self) -> bool {
        match self {
            Self::V4(v4) => v4.is_global_unicast(),
            Self::V6(v6) => v6.is_global_unicast(),
        }
    }

    pub fn is_unspecified(&self) -> bool {
        match self {
            Self::V4(v4) => v4.is_unspecified(),
            Self::V6(v6) => v6.is_unspecified(),
        }
    }

    pub fn is_documentation(&self) -> bool {
        match self {
            Self::V4(v4) => v4.is_documentation(),
            Self::V6(v6) => v6.is_documentation(),
        }
    }

    pub fn is_reserved(&self) -> bool {
        match self {
            Self::V4(v4) => v4.is_reserved(),
            Self::V6(v6) => v6.is_reserved(),
        }
    }

    /// Compare two addresses of the same family
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering> {
        if self.family() != other.family() {
            return Err(Error::incompatible(self.family(), other.family()));
        }
        Ok(self.to_bits().cmp(&other.to_bits()))
    }

    /// Whether this address lies inside `network`
    pub fn in_network(&self, network: &NetworkBlock) -> Result<bool> {
        network.contains_address(self)
    }

    /// Summary of every classification, for adapters
    pub fn to_info(&self) -> AddressInfo {
        AddressInfo {
            address: self.text_form(),
            version: self.version(),
            exploded: self.exploded(),
            is_private: self.is_private(),
            is_loopback: self.is_loopback(),
            is_link_local: self.is_link_local(),
            is_multicast: self.is_multicast(),
            is_unspecified: self.is_unspecified(),
            is_reserved: self.is_reserved(),
            is_documentation: self.is_documentation(),
            is_global_unicast: self.is_global_unicast(),
            scope: self.as_v6().and_then(Ipv6Address::scope),
        }
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other).ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4(v4) => fmt::Display::fmt(v4, f),
            Self::V6(v6) => fmt::Display::fmt(v6, f),
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.text_form()
    }
}

impl From<IpAddr> for Address {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Self::V4(v4.into()),
            IpAddr::V6(v6) => Self::V6(v6.into()),
        }
    }
}

impl From<Address> for IpAddr {
    fn from(addr: Address) -> Self {
        match addr {
            Address::V4(v4) => IpAddr::V4(v4.into()),
            Address::V6(v6) => IpAddr::V6(v6.into()),
        }
    }
}

/// Classification summary of a single address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressInfo {
    pub address: String,
    pub version: u8,
    pub exploded: String,
    pub is_private: bool,
    pub is_loopback: bool,
    pub is_link_local: bool,
    pub is_multicast: bool,
    pub is_unspecified: bool,
    pub is_reserved: bool,
    pub is_documentation: bool,
    pub is_global_unicast: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Ipv6Scope>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(text: &str) -> Address {
        Address::parse(text).unwrap()
    }

    #[test]
    fn test_dotted_quad_round_trip() {
        for text in ["0.0.0.0", "10.0.0.1", "192.168.1.1", "255.255.255.255", "8.8.4.4"] {
            assert_eq!(addr(text).text_form(), text);
        }
    }

    #[test]
    fn test_ipv6_text_form_is_compressed() {
        assert_eq!(addr("0:0:0:0:0:0:0:1").text_form(), "::1");
        assert_eq!(addr("2001:DB8:0:0:1:0:0:1").text_form(), "2001:db8::1:0:0:1");
        assert_eq!(addr("2001:db8:0:1:1:1:1:1").text_form(), "2001:db8:0:1:1:1:1:1");
        assert_eq!(addr("fe80:0000::0001").text_form(), "fe80::1");
        assert_eq!(addr("::ffff:c000:0201").text_form(), "::ffff:192.0.2.1");
        assert_eq!(
            addr("2001:db8::1").exploded(),
            "2001:0db8:0000:0000:0000:0000:0000:0001"
        );
    }

    #[test]
    fn test_dispatch_on_syntax() {
        assert_eq!(addr("1.2.3.4").family(), Family::V4);
        assert_eq!(addr("::").family(), Family::V6);
        assert!(matches!(
            Address::parse("1.2.3.04"),
            Err(Error::InvalidAddressFormat {
                violation: Violation::LeadingZero,
                ..
            })
        ));
        assert!(Address::parse("").is_err());
    }

    #[test]
    fn test_classification() {
        assert!(addr("::1").is_loopback());
        assert!(addr("fe80::1").is_link_local());
        assert!(addr("192.168.1.1").is_private());
        assert!(addr("172.31.255.255").is_private());
        assert!(!addr("172.32.0.0").is_private());
        assert!(addr("127.0.0.53").is_loopback());
        assert!(addr("224.0.0.251").is_multicast());
        assert!(addr("ff02::fb").is_multicast());
        assert!(addr("169.254.10.1").is_link_local());
        assert!(addr("fd12:3456::1").is_private());
        assert!(addr("8.8.8.8").is_global_unicast());
        assert!(addr("2606:4700::1111").is_global_unicast());
        assert!(!addr("203.0.113.5").is_global_unicast());
        assert!(!addr("2001:db8::1").is_global_unicast());
        assert!(!addr("100.64.0.1").is_global_unicast());
        assert!(addr("240.0.0.1").is_reserved());
        assert!(addr("0.0.0.0").is_unspecified());
    }

    #[test]
    fn test_ipv6_scope() {
        assert_eq!(addr("fe80::1").as_v6().unwrap().scope(), Some(Ipv6Scope::LinkLocal));
        assert_eq!(addr("fd00::1").as_v6().unwrap().scope(), Some(Ipv6Scope::UniqueLocal));
        assert_eq!(addr("2a00::1").as_v6().unwrap().scope(), Some(Ipv6Scope::Global));
        assert_eq!(addr("::1").as_v6().unwrap().scope(), None);
    }

    #[test]
    fn test_ordering_within_family() {
        assert!(addr("10.0.0.1") < addr("10.0.0.2"));
        assert!(addr("::2") > addr("::1"));
        assert_eq!(addr("1.2.3.4").try_cmp(&addr("1.2.3.4")), Ok(Ordering::Equal));
    }

    #[test]
    fn test_cross_family_comparison_fails() {
        let v4 = addr("0.0.0.1");
        let v6 = addr("::1");
        assert_ne!(v4, v6);
        assert_eq!(v4.partial_cmp(&v6), None);
        assert_eq!(
            v4.try_cmp(&v6),
            Err(Error::IncompatibleFamily {
                expected: Family::V4,
                found: Family::V6,
            })
        );
    }

    #[test]
    fn test_bits_and_std_conversions() {
        let v6 = addr("2001:db8::ff");
        assert_eq!(Address::from_bits(Family::V6, v6.to_bits()), Ok(v6));
        assert!(Address::from_bits(Family::V4, 1u128 << 32).is_err());

        let std_addr: IpAddr = addr("192.0.2.7").into();
        assert_eq!(std_addr, IpAddr::from([192, 0, 2, 7]));
        assert_eq!(Address::from(std_addr), addr("192.0.2.7"));
    }

    #[test]
    fn test_info_serializes_as_json() {
        let info = addr("fe80::1").to_info();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["address"], "fe80::1");
        assert_eq!(json["version"], 6);
        assert_eq!(json["is_link_local"], true);
        assert_eq!(json["scope"], "link-local");

        let v4_json = serde_json::to_value(addr("10.1.1.1").to_info()).unwrap();
        assert!(v4_json.get("scope").is_none());
    }
}
