//! IP prefix type with safe parsing.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family of an IP address or prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Returns the family of the given address.
    pub const fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Maximum prefix length for this family.
    pub const fn max_prefix_len(&self) -> u8 {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("ipv4"),
            AddressFamily::V6 => f.write_str("ipv6"),
        }
    }
}

/// An IP prefix in CIDR notation (e.g., 10.0.0.0/24 or 2001:db8::/32).
///
/// The stored address is always the network address: host bits beyond the
/// prefix length are cleared on construction, so `10.1.2.3/8` and
/// `10.0.0.0/8` are the same prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddr,
    prefix_len: u8,
}

impl IpPrefix {
    /// Creates a new IP prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length is invalid for the address type
    /// (>32 for IPv4, >128 for IPv6).
    pub fn new(address: IpAddr, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = AddressFamily::of(&address).max_prefix_len();
        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for address type",
                prefix_len, max_len
            )));
        }

        Ok(IpPrefix {
            address: mask(address, prefix_len),
            prefix_len,
        })
    }

    /// Returns the network address of this prefix.
    pub const fn address(&self) -> &IpAddr {
        &self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub const fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.address)
    }

    pub const fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    pub const fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }

    /// Returns true if this is the default route (0.0.0.0/0 or ::/0).
    pub fn is_default(&self) -> bool {
        self.prefix_len == 0
    }

    /// Returns true if `addr` lies inside this prefix.
    pub fn contains_addr(&self, addr: &IpAddr) -> bool {
        AddressFamily::of(addr) == self.family() && mask(*addr, self.prefix_len) == self.address
    }

    /// Returns true if `other` is equal to or more specific than this prefix.
    pub fn contains(&self, other: &IpPrefix) -> bool {
        other.family() == self.family()
            && other.prefix_len >= self.prefix_len
            && mask(other.address, self.prefix_len) == self.address
    }
}

fn mask(address: IpAddr, prefix_len: u8) -> IpAddr {
    match address {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let mask = match prefix_len {
                0 => 0,
                len => u32::MAX << (32 - u32::from(len)),
            };
            IpAddr::V4(Ipv4Addr::from(bits & mask))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let mask = match prefix_len {
                0 => 0,
                len => u128::MAX << (128 - u32::from(len)),
            };
            IpAddr::V6(Ipv6Addr::from(bits & mask))
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: IpAddr = addr_str
            .parse()
            .map_err(|_| ParseError::InvalidIpAddress(addr_str.to_string()))?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> Self {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ip_prefix_parse() {
        let prefix: IpPrefix = "192.168.100.0/24".parse().unwrap();
        assert!(prefix.is_ipv4());
        assert_eq!(prefix.family(), AddressFamily::V4);
        assert_eq!(prefix.prefix_len(), 24);

        let v6_prefix: IpPrefix = "2001:db8:2::/48".parse().unwrap();
        assert!(v6_prefix.is_ipv6());
        assert_eq!(v6_prefix.family(), AddressFamily::V6);
        assert_eq!(v6_prefix.prefix_len(), 48);
    }

    #[test]
    fn test_ip_prefix_host_bits_cleared() {
        let prefix: IpPrefix = "10.1.2.3/8".parse().unwrap();
        assert_eq!(prefix.to_string(), "10.0.0.0/8");
        assert_eq!(prefix, "10.0.0.0/8".parse().unwrap());

        let v6: IpPrefix = "2001:db8:2::1/48".parse().unwrap();
        assert_eq!(v6.to_string(), "2001:db8:2::/48");
    }

    #[test]
    fn test_ip_prefix_default() {
        let default_v4: IpPrefix = "0.0.0.0/0".parse().unwrap();
        assert!(default_v4.is_default());

        let default_v6: IpPrefix = "::/0".parse().unwrap();
        assert!(default_v6.is_default());
    }

    #[test]
    fn test_invalid_prefix() {
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("2001:db8::/129".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0".parse::<IpPrefix>().is_err());
        assert_eq!(
            "10.0.0.300/8".parse::<IpPrefix>(),
            Err(ParseError::InvalidIpAddress("10.0.0.300".to_string()))
        );
    }

    #[test]
    fn test_contains() {
        let wide: IpPrefix = "10.0.0.0/8".parse().unwrap();
        let narrow: IpPrefix = "10.20.0.0/16".parse().unwrap();
        let other: IpPrefix = "11.0.0.0/16".parse().unwrap();
        let v6: IpPrefix = "::/0".parse().unwrap();

        assert!(wide.contains(&narrow));
        assert!(wide.contains(&wide));
        assert!(!narrow.contains(&wide));
        assert!(!wide.contains(&other));
        assert!(!v6.contains(&wide));

        let default_v4: IpPrefix = "0.0.0.0/0".parse().unwrap();
        assert!(default_v4.contains(&other));
    }

    #[test]
    fn test_contains_addr() {
        let prefix: IpPrefix = "2001:db8:2::/48".parse().unwrap();
        assert!(prefix.contains_addr(&"2001:db8:2:ffff::1".parse().unwrap()));
        assert!(!prefix.contains_addr(&"2001:db8:3::1".parse().unwrap()));
        assert!(!prefix.contains_addr(&"10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_serde_as_string() {
        let prefix: IpPrefix = serde_json::from_str("\"192.168.0.0/16\"").unwrap();
        assert_eq!(prefix.to_string(), "192.168.0.0/16");
        assert_eq!(serde_json::to_string(&prefix).unwrap(), "\"192.168.0.0/16\"");

        assert!(serde_json::from_str::<IpPrefix>("\"192.168.0.0/40\"").is_err());
    }
}
