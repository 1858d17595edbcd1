use std::{fmt::Display, net::Ipv4Addr, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed dotted-quad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected 4 octets in {0:?}, found {1}")]
    OctetCount(String, usize),
    #[error("octet {octet:?} in {input:?} is not a number between 0 and 255")]
    InvalidOctet { input: String, octet: String },
    #[error("prefix length {0} is larger than 32")]
    PrefixLength(u8),
}

fn parse_octets(input: &str) -> Result<u32, ParseError> {
    let octets: Vec<&str> = input.trim().split('.').collect();
    if octets.len() != 4 {
        return Err(ParseError::OctetCount(input.to_string(), octets.len()));
    }
    octets.iter().try_fold(0u32, |acc, octet| {
        let invalid = || ParseError::InvalidOctet {
            input: input.to_string(),
            octet: octet.to_string(),
        };
        // `u8::from_str` would also take a leading '+'
        if octet.is_empty() || !octet.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u8 = octet.parse().map_err(|_| invalid())?;
        Ok((acc << 8) | u32::from(value))
    })
}

fn format_octets(value: u32, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let [a, b, c, d] = value.to_be_bytes();
    write!(f, "{a}.{b}.{c}.{d}")
}

/// An IPv4 address stored as its 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u32);

impl Address {
    pub const UNSPECIFIED: Address = Address(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Clears the host bits of `self` under `mask`.
    pub fn network_address(self, mask: Mask) -> Address {
        Address(self.0 & mask.to_bits())
    }

    pub fn is_unspecified(self) -> bool {
        self.0 == 0
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_octets(s).map(Address)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        format_octets(self.0, f)
    }
}

impl From<Ipv4Addr> for Address {
    fn from(value: Ipv4Addr) -> Self {
        Address(value.to_bits())
    }
}

impl From<Address> for Ipv4Addr {
    fn from(value: Address) -> Self {
        Ipv4Addr::from_bits(value.0)
    }
}

// Serialized as the dotted string so addresses read naturally in JSON dumps and can be map keys.

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Free-function form of [`Address::network_address`].
pub fn network_address(address: Address, mask: Mask) -> Address {
    address.network_address(mask)
}

/// A subnet mask together with its wildcard (the complement within 32 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mask {
    netmask: u32,
    wildcard: u32,
}

impl Mask {
    pub const HOST: Mask = Mask::from_bits(u32::MAX);
    pub const DEFAULT: Mask = Mask::from_bits(0);

    pub const fn from_bits(netmask: u32) -> Self {
        Self {
            netmask,
            wildcard: !netmask & u32::MAX,
        }
    }

    /// Contiguous mask for a prefix length.
    pub fn from_cidr(prefix: u8) -> Result<Self, ParseError> {
        match prefix {
            0 => Ok(Self::DEFAULT),
            1..=32 => Ok(Self::from_bits(u32::MAX << (32 - u32::from(prefix)))),
            _ => Err(ParseError::PrefixLength(prefix)),
        }
    }

    pub const fn to_bits(self) -> u32 {
        self.netmask
    }

    pub const fn wildcard(self) -> u32 {
        self.wildcard
    }

    pub fn wildcard_address(self) -> Address {
        Address::from_bits(self.wildcard)
    }

    pub fn to_cidr(self) -> u8 {
        self.netmask.count_ones() as u8
    }

    pub fn wildcard_cidr(self) -> u8 {
        self.wildcard.count_ones() as u8
    }

    pub fn is_host_mask(self) -> bool {
        self.netmask == u32::MAX
    }

    pub fn is_default_mask(self) -> bool {
        self.netmask == 0
    }

    /// Whether the set bits form a single leading run.
    pub fn is_contiguous(self) -> bool {
        self.wildcard & self.wildcard.wrapping_add(1) == 0
    }
}

impl FromStr for Mask {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_octets(s).map(Mask::from_bits)
    }
}

impl Display for Mask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        format_octets(self.netmask, f)
    }
}

impl From<Address> for Mask {
    fn from(value: Address) -> Self {
        Mask::from_bits(value.to_bits())
    }
}

impl From<Ipv4Addr> for Mask {
    fn from(value: Ipv4Addr) -> Self {
        Mask::from_bits(value.to_bits())
    }
}

impl From<Mask> for Ipv4Addr {
    fn from(value: Mask) -> Self {
        Ipv4Addr::from_bits(value.netmask)
    }
}

impl Serialize for Mask {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Mask {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn mask(s: &str) -> Mask {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_known_values() {
        assert_eq!(addr("0.0.0.0").to_bits(), 0);
        assert_eq!(addr("255.255.255.255").to_bits(), u32::MAX);
        assert_eq!(addr("192.168.1.1").to_bits(), 3232235777);
        assert_eq!(addr("127.0.0.1").to_bits(), 2130706433);
        assert_eq!(addr("8.8.8.8").to_bits(), 134744072);
    }

    #[test]
    fn test_format_is_inverse_of_parse() {
        for s in ["192.168.1.1", "0.0.0.0", "255.255.255.255", "10.0.12.1", "8.8.4.4"] {
            assert_eq!(addr(s).to_string(), s);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            "10.0.0".parse::<Address>(),
            Err(ParseError::OctetCount(_, 3))
        ));
        assert!(matches!(
            "10.0.0.0.1".parse::<Address>(),
            Err(ParseError::OctetCount(_, 5))
        ));
        assert!(matches!(
            "10.0.0.256".parse::<Address>(),
            Err(ParseError::InvalidOctet { .. })
        ));
        assert!(matches!(
            "10.a.0.1".parse::<Address>(),
            Err(ParseError::InvalidOctet { .. })
        ));
        assert!("".parse::<Address>().is_err());
    }

    #[test]
    fn test_parse_rejects_signs_and_empty_octets() {
        for input in ["+10.0.0.1", "10.+0.0.1", "10..0.1", "10.0.0.-1"] {
            assert!(
                matches!(input.parse::<Address>(), Err(ParseError::InvalidOctet { .. })),
                "{input} was accepted"
            );
        }
        assert!("+255.255.255.0".parse::<Mask>().is_err());
    }

    #[test]
    fn test_ordering_follows_value() {
        assert!(addr("192.168.1.1") < addr("192.168.1.2"));
        assert!(addr("0.0.0.0") < addr("255.255.255.255"));
        assert!(addr("8.8.4.4") < addr("8.8.8.8"));
        assert_eq!(addr("8.8.8.8"), addr("8.8.8.8"));
    }

    #[test]
    fn test_mask_cidr() {
        assert_eq!(mask("255.255.255.0").to_cidr(), 24);
        assert_eq!(mask("255.255.0.0").to_cidr(), 16);
        assert_eq!(mask("255.0.0.0").to_cidr(), 8);
        assert_eq!(mask("0.0.0.0").to_cidr(), 0);
        assert_eq!(mask("128.0.0.0").to_cidr(), 1);
        assert_eq!(Mask::from_cidr(24).unwrap(), mask("255.255.255.0"));
        assert_eq!(Mask::from_cidr(32).unwrap(), Mask::HOST);
        assert!(Mask::from_cidr(33).is_err());
    }

    #[test]
    fn test_wildcard_stays_within_32_bits() {
        assert_eq!(mask("255.255.255.0").wildcard_address().to_string(), "0.0.0.255");
        assert_eq!(mask("0.0.0.0").wildcard_address().to_string(), "255.255.255.255");
        assert_eq!(mask("128.0.0.0").wildcard_address().to_string(), "127.255.255.255");
        assert_eq!(mask("255.255.255.255").wildcard(), 0);
        assert_eq!(mask("128.0.0.0").wildcard_cidr(), 31);
        assert_eq!(mask("255.255.0.0").wildcard_cidr(), 16);
    }

    #[test]
    fn test_host_and_default_masks() {
        assert!(mask("255.255.255.255").is_host_mask());
        assert!(!mask("255.255.255.0").is_host_mask());
        assert!(mask("0.0.0.0").is_default_mask());
        assert!(!mask("255.255.255.255").is_default_mask());
    }

    #[test]
    fn test_contiguous_masks() {
        assert!(mask("255.255.255.252").is_contiguous());
        assert!(Mask::DEFAULT.is_contiguous());
        assert!(Mask::HOST.is_contiguous());
        assert!(!mask("255.0.255.0").is_contiguous());
    }

    #[test]
    fn test_network_address_clears_host_bits() {
        assert_eq!(
            network_address(addr("192.168.0.2"), mask("255.255.255.0")),
            addr("192.168.0.0")
        );
        assert_eq!(
            addr("10.1.2.3").network_address(mask("255.255.0.0")),
            addr("10.1.0.0")
        );
    }

    #[test]
    fn test_serde_uses_dotted_strings() {
        let json = serde_json::to_string(&addr("10.0.0.1")).unwrap();
        assert_eq!(json, "\"10.0.0.1\"");
        let back: Mask = serde_json::from_str("\"255.255.255.0\"").unwrap();
        assert_eq!(back.to_cidr(), 24);
        assert!(serde_json::from_str::<Address>("\"10.0.0\"").is_err());
    }
}
