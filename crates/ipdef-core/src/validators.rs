//! Pure syntax and range checks for address, prefix and hostname text
//!
//! Nothing in this module allocates state or performs I/O. The `validate_*`
//! functions return the decoded components or the specific [`Violation`];
//! the `is_valid_*` functions are boolean conveniences over them.

use thiserror::Error;

use crate::address::Family;

/// Maximum total length of a hostname (RFC 1035)
const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length of a single hostname label (RFC 1035)
const MAX_LABEL_LEN: usize = 63;

/// A specific rule broken by a literal
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    #[error("input is empty")]
    Empty,

    #[error("expected {expected} groups, found {found}")]
    GroupCount { expected: usize, found: usize },

    #[error("empty group")]
    EmptyGroup,

    #[error("invalid digit")]
    InvalidDigit,

    #[error("leading zero is ambiguous")]
    LeadingZero,

    #[error("hextet longer than 4 digits")]
    GroupTooLong,

    #[error("component out of range")]
    OutOfRange,

    #[error("'::' may appear only once")]
    MultipleCompression,

    #[error("'::' must stand for at least one group")]
    RedundantCompression,

    #[error("embedded IPv4 is only allowed as the final group")]
    MisplacedIpv4Tail,

    #[error("prefix /{prefix} exceeds maximum /{max}")]
    PrefixOutOfRange { prefix: u16, max: u8 },

    #[error("hostname longer than 253 characters")]
    HostnameTooLong,

    #[error("empty label")]
    EmptyLabel,

    #[error("label longer than 63 characters")]
    LabelTooLong,

    #[error("label contains characters other than letters, digits and '-'")]
    InvalidLabelChar,

    #[error("label starts or ends with '-'")]
    LabelHyphen,
}

/// Validate a dotted-quad literal and return its octets
pub fn validate_ipv4(text: &str) -> Result<[u8; 4], Violation> {
    if text.is_empty() {
        return Err(Violation::Empty);
    }

    let groups: Vec<&str> = text.split('.').collect();
    if groups.len() != 4 {
        return Err(Violation::GroupCount {
            expected: 4,
            found: groups.len(),
        });
    }

    let mut octets = [0u8; 4];
    for (slot, group) in octets.iter_mut().zip(groups) {
        *slot = parse_octet(group)?;
    }
    Ok(octets)
}

fn parse_octet(group: &str) -> Result<u8, Violation> {
    if group.is_empty() {
        return Err(Violation::EmptyGroup);
    }
    if !group.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Violation::InvalidDigit);
    }
    if group.len() > 1 && group.starts_with('0') {
        return Err(Violation::LeadingZero);
    }
    if group.len() > 3 {
        return Err(Violation::OutOfRange);
    }
    group.parse::<u8>().map_err(|_| Violation::OutOfRange)
}

/// Validate a colon-hextet literal and return its eight groups
///
/// Accepts a single `::` compression and an IPv4 tail in the last position
/// (e.g. `::ffff:192.0.2.1`). Zone identifiers are not accepted.
pub fn validate_ipv6(text: &str) -> Result<[u16; 8], Violation> {
    if text.is_empty() {
        return Err(Violation::Empty);
    }
    if text.matches("::").count() > 1 {
        return Err(Violation::MultipleCompression);
    }

    let mut groups = [0u16; 8];

    match text.split_once("::") {
        None => {
            let parsed = parse_hextets(text, true)?;
            if parsed.len() != 8 {
                return Err(Violation::GroupCount {
                    expected: 8,
                    found: parsed.len(),
                });
            }
            groups.copy_from_slice(&parsed);
        }
        Some((head, tail)) => {
            let left = parse_hextets(head, false)?;
            let right = parse_hextets(tail, true)?;
            let total = left.len() + right.len();
            if total == 8 {
                return Err(Violation::RedundantCompression);
            }
            if total > 8 {
                return Err(Violation::GroupCount {
                    expected: 8,
                    found: total,
                });
            }
            groups[..left.len()].copy_from_slice(&left);
            groups[8 - right.len()..].copy_from_slice(&right);
        }
    }

    Ok(groups)
}

/// Parse one side of a (possibly compressed) IPv6 literal
fn parse_hextets(side: &str, allow_ipv4_tail: bool) -> Result<Vec<u16>, Violation> {
    if side.is_empty() {
        return Ok(Vec::new());
    }

    let parts: Vec<&str> = side.split(':').collect();
    let last = parts.len() - 1;
    let mut groups = Vec::with_capacity(8);

    for (i, part) in parts.into_iter().enumerate() {
        if part.is_empty() {
            return Err(Violation::EmptyGroup);
        }

        if part.contains('.') {
            if !allow_ipv4_tail || i != last {
                return Err(Violation::MisplacedIpv4Tail);
            }
            let [a, b, c, d] = validate_ipv4(part)?;
            groups.push(u16::from_be_bytes([a, b]));
            groups.push(u16::from_be_bytes([c, d]));
            continue;
        }

        if !part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Violation::InvalidDigit);
        }
        if part.len() > 4 {
            return Err(Violation::GroupTooLong);
        }
        let value = u16::from_str_radix(part, 16).map_err(|_| Violation::InvalidDigit)?;
        groups.push(value);
    }

    Ok(groups)
}

/// Check a numeric prefix length against the family bit width
pub fn validate_prefix(prefix: u8, family: Family) -> Result<u8, Violation> {
    let max = family.bit_width();
    if prefix > max {
        return Err(Violation::PrefixOutOfRange {
            prefix: u16::from(prefix),
            max,
        });
    }
    Ok(prefix)
}

/// Parse the decimal prefix part of a CIDR literal
pub fn parse_prefix(text: &str, family: Family) -> Result<u8, Violation> {
    if text.is_empty() {
        return Err(Violation::Empty);
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Violation::InvalidDigit);
    }
    if text.len() > 1 && text.starts_with('0') {
        return Err(Violation::LeadingZero);
    }
    if text.len() > 3 {
        return Err(Violation::OutOfRange);
    }

    let value: u16 = text.parse().map_err(|_| Violation::OutOfRange)?;
    let max = family.bit_width();
    if value > u16::from(max) {
        return Err(Violation::PrefixOutOfRange { prefix: value, max });
    }
    Ok(value as u8)
}

/// Check that a string is a valid DNS hostname
///
/// Basic RFC 1035 validation: total length, label length, allowed
/// characters and hyphen placement. A single trailing dot is accepted.
pub fn validate_hostname(name: &str) -> Result<(), Violation> {
    let name = name.strip_suffix('.').unwrap_or(name);

    if name.is_empty() {
        return Err(Violation::Empty);
    }
    if name.len() > MAX_HOSTNAME_LEN {
        return Err(Violation::HostnameTooLong);
    }

    for label in name.split('.') {
        if label.is_empty() {
            return Err(Violation::EmptyLabel);
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(Violation::LabelTooLong);
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(Violation::InvalidLabelChar);
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(Violation::LabelHyphen);
        }
    }

    Ok(())
}

pub fn is_valid_ipv4(text: &str) -> bool {
    validate_ipv4(text).is_ok()
}

pub fn is_valid_ipv6(text: &str) -> bool {
    validate_ipv6(text).is_ok()
}

pub fn is_valid_ip(text: &str) -> bool {
    is_valid_ipv4(text) || is_valid_ipv6(text)
}

/// Whether `text` parses as `address/prefix`
pub fn is_valid_cidr(text: &str) -> bool {
    crate::network::NetworkBlock::from_cidr(text).is_ok()
}

/// IP version (4 or 6) of a literal, or `None` if it is not valid
pub fn ip_version(text: &str) -> Option<u8> {
    if is_valid_ipv4(text) {
        Some(4)
    } else if is_valid_ipv6(text) {
        Some(6)
    } else {
        None
    }
}

pub fn is_valid_port(port: u32) -> bool {
    (1..=65535).contains(&port)
}

/// Check a port or an inclusive `start-end` port range
pub fn is_valid_port_range(range: &str) -> bool {
    let parse = |s: &str| s.trim().parse::<u32>().ok().filter(|p| is_valid_port(*p));

    match range.split_once('-') {
        Some((start, end)) => match (parse(start), parse(end)) {
            (Some(start), Some(end)) => start <= end,
            _ => false,
        },
        None => parse(range).is_some(),
    }
}
