//! CIDR network newtype.
//!
//! An [`IpPrefix`] is always stored in canonical form: host bits below the
//! prefix length are cleared at construction, so two spellings of the same
//! network compare equal and hash to the same KV key.

use core::fmt;
use core::str::FromStr;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{IPV4_MAX_PREFIX_LEN, IPV6_MAX_PREFIX_LEN};
use crate::error::PrefixError;

/// A canonical IPv4 or IPv6 network (`address/length`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[must_use]
pub struct IpPrefix {
    addr: IpAddr,
    len: u8,
}

impl IpPrefix {
    /// Build a prefix, masking off host bits.
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, PrefixError> {
        let addr = match addr {
            IpAddr::V4(v4) => {
                if len > IPV4_MAX_PREFIX_LEN {
                    return Err(PrefixError::InvalidLength {
                        len,
                        max: IPV4_MAX_PREFIX_LEN,
                    });
                }
                let mask = u32::MAX.checked_shl(u32::from(IPV4_MAX_PREFIX_LEN - len)).unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from(u32::from(v4) & mask))
            }
            IpAddr::V6(v6) => {
                if len > IPV6_MAX_PREFIX_LEN {
                    return Err(PrefixError::InvalidLength {
                        len,
                        max: IPV6_MAX_PREFIX_LEN,
                    });
                }
                let mask = u128::MAX.checked_shl(u32::from(IPV6_MAX_PREFIX_LEN - len)).unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from(u128::from(v6) & mask))
            }
        };
        Ok(Self { addr, len })
    }

    /// Network address (host bits cleared).
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    /// Whether this is a zero-length (default route) prefix.
    pub fn is_default_route(&self) -> bool {
        self.len == 0
    }

    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }
}

impl FromStr for IpPrefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| PrefixError::MissingLength(s.to_string()))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| PrefixError::InvalidAddress(addr.to_string()))?;
        let len: u8 = len
            .parse()
            .map_err(|_| PrefixError::InvalidLengthStr(len.to_string()))?;
        Self::new(addr, len)
    }
}

/// Decoded values go through [`IpPrefix::new`], so host bits are masked
/// and an oversized length is an error.
impl<'de> Deserialize<'de> for IpPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename = "IpPrefix")]
        struct Raw {
            addr: IpAddr,
            len: u8,
        }

        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.addr, raw.len).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

impl fmt::Debug for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IpPrefix({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ipv4() {
        let p: IpPrefix = "10.1.1.0/24".parse().unwrap();
        assert_eq!(p.prefix_len(), 24);
        assert!(p.is_ipv4());
        assert_eq!(p.to_string(), "10.1.1.0/24");
    }

    #[test]
    fn parse_ipv6() {
        let p: IpPrefix = "ffff:10:1:5::/64".parse().unwrap();
        assert_eq!(p.prefix_len(), 64);
        assert!(!p.is_ipv4());
        assert_eq!(p.to_string(), "ffff:10:1:5::/64");
    }

    #[test]
    fn host_bits_are_masked() {
        let a: IpPrefix = "10.1.1.77/24".parse().unwrap();
        let b: IpPrefix = "10.1.1.0/24".parse().unwrap();
        assert_eq!(a, b);

        let c: IpPrefix = "ffff:10:3:7::1/64".parse().unwrap();
        assert_eq!(c.to_string(), "ffff:10:3:7::/64");
    }

    #[test]
    fn zero_length_prefix() {
        let p: IpPrefix = "192.168.1.1/0".parse().unwrap();
        assert!(p.is_default_route());
        assert_eq!(p.to_string(), "0.0.0.0/0");

        let p6: IpPrefix = "::1/0".parse().unwrap();
        assert_eq!(p6.to_string(), "::/0");
    }

    #[test]
    fn full_length_prefix_keeps_address() {
        let p: IpPrefix = "::ffff:10.1.1.1/128".parse().unwrap();
        assert_eq!(p.prefix_len(), 128);
        let p4: IpPrefix = "10.1.1.1/32".parse().unwrap();
        assert_eq!(p4.to_string(), "10.1.1.1/32");
    }

    #[test]
    fn rejects_oversized_length() {
        assert_eq!(
            "10.0.0.0/33".parse::<IpPrefix>(),
            Err(PrefixError::InvalidLength { len: 33, max: 32 })
        );
        assert!("::/129".parse::<IpPrefix>().is_err());
    }

    #[derive(Serialize)]
    struct Unchecked {
        addr: IpAddr,
        len: u8,
    }

    fn decode_unchecked(addr: &str, len: u8) -> Result<IpPrefix, postcard::Error> {
        let bytes = postcard::to_allocvec(&Unchecked {
            addr: addr.parse().unwrap(),
            len,
        })
        .unwrap();
        postcard::from_bytes(&bytes)
    }

    #[test]
    fn decoding_masks_host_bits() {
        let p = decode_unchecked("10.1.1.77", 24).unwrap();
        assert_eq!(p, "10.1.1.0/24".parse().unwrap());
        assert_eq!(p.addr(), "10.1.1.0".parse::<IpAddr>().unwrap());

        let p6 = decode_unchecked("ffff:10:3:7::1", 64).unwrap();
        assert_eq!(p6.to_string(), "ffff:10:3:7::/64");
    }

    #[test]
    fn decoding_rejects_oversized_length() {
        assert!(decode_unchecked("10.0.0.0", 33).is_err());
        assert!(decode_unchecked("::", 129).is_err());
    }

    #[test]
    fn encoding_keeps_field_layout() {
        let p: IpPrefix = "10.1.0.0/16".parse().unwrap();
        let ours = postcard::to_allocvec(&p).unwrap();
        let raw = postcard::to_allocvec(&Unchecked {
            addr: p.addr(),
            len: 16,
        })
        .unwrap();
        assert_eq!(ours, raw);
        assert_eq!(postcard::from_bytes::<IpPrefix>(&ours).unwrap(), p);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(matches!(
            "10.0.0.0".parse::<IpPrefix>(),
            Err(PrefixError::MissingLength(_))
        ));
        assert!(matches!(
            "10.0.0/8".parse::<IpPrefix>(),
            Err(PrefixError::InvalidAddress(_))
        ));
        assert!(matches!(
            "10.0.0.0/x".parse::<IpPrefix>(),
            Err(PrefixError::InvalidLengthStr(_))
        ));
        assert!("".parse::<IpPrefix>().is_err());
    }
}
