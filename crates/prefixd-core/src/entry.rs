//! Prefix entries and client types.
//!
//! A client type is a plain tag. The only thing that distinguishes one type
//! from another is its rank in [`PRIORITY_ORDER`]: when several clients claim
//! the same prefix, the entry whose type ranks highest is the winner.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::IpPrefix;

/// Local producer of prefix advertisements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum PrefixType {
    Loopback = 1,
    Default = 2,
    Bgp = 3,
    PrefixAllocator = 4,
    Breeze = 5,
    Rib = 6,
    SloPrefixAllocator = 7,
    Config = 8,
    Vip = 9,
}

/// Client types from most to least preferred.
pub const PRIORITY_ORDER: [PrefixType; 9] = [
    PrefixType::Loopback,
    PrefixType::Default,
    PrefixType::Bgp,
    PrefixType::PrefixAllocator,
    PrefixType::Breeze,
    PrefixType::Rib,
    PrefixType::SloPrefixAllocator,
    PrefixType::Config,
    PrefixType::Vip,
];

impl PrefixType {
    /// Convert from raw byte value.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(PrefixType::Loopback),
            2 => Some(PrefixType::Default),
            3 => Some(PrefixType::Bgp),
            4 => Some(PrefixType::PrefixAllocator),
            5 => Some(PrefixType::Breeze),
            6 => Some(PrefixType::Rib),
            7 => Some(PrefixType::SloPrefixAllocator),
            8 => Some(PrefixType::Config),
            9 => Some(PrefixType::Vip),
            _ => None,
        }
    }

    /// Priority rank; a higher rank wins.
    pub fn rank(self) -> usize {
        let pos = PRIORITY_ORDER
            .iter()
            .position(|t| *t == self)
            .unwrap_or(PRIORITY_ORDER.len());
        PRIORITY_ORDER.len() - pos
    }

    /// Upper-case name as used on the command queue and in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            PrefixType::Loopback => "LOOPBACK",
            PrefixType::Default => "DEFAULT",
            PrefixType::Bgp => "BGP",
            PrefixType::PrefixAllocator => "PREFIX_ALLOCATOR",
            PrefixType::Breeze => "BREEZE",
            PrefixType::Rib => "RIB",
            PrefixType::SloPrefixAllocator => "SLO_PREFIX_ALLOCATOR",
            PrefixType::Config => "CONFIG",
            PrefixType::Vip => "VIP",
        }
    }
}

impl fmt::Display for PrefixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrefixType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PRIORITY_ORDER
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown prefix type: {s}"))
    }
}

/// How packets towards the prefix are forwarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForwardingType {
    #[default]
    Ip,
    SrMpls,
}

impl FromStr for ForwardingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ip" => Ok(ForwardingType::Ip),
            "sr_mpls" | "srmpls" => Ok(ForwardingType::SrMpls),
            other => Err(format!("unknown forwarding type: {other}")),
        }
    }
}

/// Route computation algorithm requested for the prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForwardingAlgorithm {
    #[default]
    SpEcmp,
    Ksp2EdEcmp,
}

impl FromStr for ForwardingAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sp_ecmp" | "specmp" => Ok(ForwardingAlgorithm::SpEcmp),
            "ksp2_ed_ecmp" | "ksp2edecmp" => Ok(ForwardingAlgorithm::Ksp2EdEcmp),
            other => Err(format!("unknown forwarding algorithm: {other}")),
        }
    }
}

/// One client's claim on a prefix.
///
/// Identity for matching is `(prefix, prefix_type)`; every other field is
/// content that a re-advertisement may replace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefixEntry {
    pub prefix: IpPrefix,
    pub prefix_type: PrefixType,
    pub forwarding_type: ForwardingType,
    pub forwarding_algorithm: ForwardingAlgorithm,
    /// Ephemeral entries are never written to the Durable Store.
    pub ephemeral: bool,
    /// Opaque client data carried through to the published value.
    pub metadata: Vec<u8>,
}

impl PrefixEntry {
    /// Create a persistent IP/SP_ECMP entry with no metadata.
    pub fn new(prefix: IpPrefix, prefix_type: PrefixType) -> Self {
        Self {
            prefix,
            prefix_type,
            forwarding_type: ForwardingType::default(),
            forwarding_algorithm: ForwardingAlgorithm::default(),
            ephemeral: false,
            metadata: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    #[must_use]
    pub fn with_forwarding(
        mut self,
        forwarding_type: ForwardingType,
        forwarding_algorithm: ForwardingAlgorithm,
    ) -> Self {
        self.forwarding_type = forwarding_type;
        self.forwarding_algorithm = forwarding_algorithm;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Vec<u8>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether a change to or from this entry must reach the Durable Store.
    pub fn is_persistent(&self) -> bool {
        !self.ephemeral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[test]
    fn rank_follows_priority_order() {
        assert!(PrefixType::Loopback.rank() > PrefixType::Default.rank());
        assert!(PrefixType::Default.rank() > PrefixType::Bgp.rank());
        assert!(PrefixType::Bgp.rank() > PrefixType::PrefixAllocator.rank());
        assert_eq!(PrefixType::Loopback.rank(), PRIORITY_ORDER.len());
        assert_eq!(PrefixType::Vip.rank(), 1);
    }

    #[test]
    fn ranks_are_unique() {
        let mut ranks: Vec<usize> = PRIORITY_ORDER.iter().map(|t| t.rank()).collect();
        ranks.sort_unstable();
        ranks.dedup();
        assert_eq!(ranks.len(), PRIORITY_ORDER.len());
    }

    #[test]
    fn from_u8_matches_repr() {
        for t in PRIORITY_ORDER {
            assert_eq!(PrefixType::from_u8(t as u8), Some(t));
        }
        assert_eq!(PrefixType::from_u8(0), None);
        assert_eq!(PrefixType::from_u8(10), None);
    }

    #[test]
    fn prefix_type_string_roundtrip() {
        for t in PRIORITY_ORDER {
            assert_eq!(t.as_str().parse::<PrefixType>().unwrap(), t);
        }
        assert_eq!("bgp".parse::<PrefixType>().unwrap(), PrefixType::Bgp);
        assert!("OSPF".parse::<PrefixType>().is_err());
    }

    #[test]
    fn forwarding_parse() {
        assert_eq!("ip".parse::<ForwardingType>().unwrap(), ForwardingType::Ip);
        assert_eq!("SR_MPLS".parse::<ForwardingType>().unwrap(), ForwardingType::SrMpls);
        assert!("gre".parse::<ForwardingType>().is_err());
        assert_eq!(
            "ksp2_ed_ecmp".parse::<ForwardingAlgorithm>().unwrap(),
            ForwardingAlgorithm::Ksp2EdEcmp
        );
    }

    #[test]
    fn entry_builders() {
        let e = PrefixEntry::new(prefix("10.0.0.0/8"), PrefixType::Bgp)
            .with_ephemeral(true)
            .with_forwarding(ForwardingType::SrMpls, ForwardingAlgorithm::Ksp2EdEcmp)
            .with_metadata(vec![1, 2, 3]);
        assert!(e.ephemeral);
        assert!(!e.is_persistent());
        assert_eq!(e.forwarding_type, ForwardingType::SrMpls);
        assert_eq!(e.metadata, vec![1, 2, 3]);
    }

    #[test]
    fn ephemeral_flag_is_content() {
        let p = PrefixEntry::new(prefix("ffff:10:4:9::/64"), PrefixType::Bgp);
        let e = p.clone().with_ephemeral(true);
        assert_ne!(p, e);
    }
}
