//! Range model: CIDR blocks as inclusive integer intervals.
//!
//! An [`AddressRange`] covers `[start, end]` over the 32-bit address space,
//! with `start` being the network address and `end` the address with all host
//! bits set. Parsing of the `address/prefix` notation is delegated to `ipnet`.

use std::fmt;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;

use ipnet::Ipv4Net;

use crate::error::{ExpandError, Result};

/// An inclusive interval of IPv4 addresses derived from one CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    /// First address (network address) as an integer.
    pub start: u32,
    /// Last address (all host bits set) as an integer.
    pub end: u32,
    /// The block this range was built from. Only used for reporting.
    pub block: Ipv4Net,
}

impl AddressRange {
    /// Build the range covered by a CIDR block.
    ///
    /// Host bits in the block's address are ignored, so `10.0.0.5/24` covers
    /// `10.0.0.0` through `10.0.0.255`.
    pub fn from_block(block: Ipv4Net) -> Self {
        let mask = u32::from(block.netmask());
        let start = u32::from(block.addr()) & mask;
        let end = start | !mask;
        Self { start, end, block }
    }

    /// Number of addresses in the range. Always at least 1.
    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    /// A range is never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.start)
    }

    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end)
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.start <= addr && addr <= self.end
    }

    /// Whether the two ranges share at least one address.
    pub fn overlaps(&self, other: &AddressRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Every address in the range, in ascending order.
    pub fn addresses(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}, {}]", self.block, self.first(), self.last())
    }
}

/// Parse a single `address/prefix-length` block.
///
/// Surrounding whitespace is ignored; anything else that is not valid IPv4
/// CIDR notation (missing prefix, prefix above 32, IPv6) is rejected with an
/// error naming the block as given.
pub fn parse_block(block: &str) -> Result<Ipv4Net> {
    block
        .trim()
        .parse::<Ipv4Net>()
        .map_err(|source| ExpandError::Parse {
            block: block.to_string(),
            source,
        })
}

/// Convert a list of CIDR strings into address ranges.
///
/// Fails on the first malformed block; no partial result is returned.
pub fn build_ranges<S: AsRef<str>>(blocks: &[S]) -> Result<Vec<AddressRange>> {
    let ranges = blocks
        .iter()
        .map(|block| parse_block(block.as_ref()).map(AddressRange::from_block))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        ranges = ranges.len(),
        addresses = ranges.iter().map(AddressRange::len).sum::<u64>(),
        "Built address ranges"
    );

    Ok(ranges)
}

/// Split a comma-separated CIDR list as given on the command line.
///
/// Empty entries are kept so that `"10.0.0.0/8,"` fails parsing instead of
/// silently dropping the trailing item.
pub fn split_cidr_list(list: &str) -> Vec<&str> {
    list.split(',').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(block: &str) -> AddressRange {
        AddressRange::from_block(parse_block(block).unwrap())
    }

    #[test]
    fn test_from_block_bounds() {
        let r = range("10.0.0.0/30");
        assert_eq!(r.first(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(r.last(), Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(r.len(), 4);

        let r = range("192.168.1.0/32");
        assert_eq!(r.start, r.end);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_from_block_masks_host_bits() {
        let r = range("10.0.0.5/24");
        assert_eq!(r.first(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(r.last(), Ipv4Addr::new(10, 0, 0, 255));
    }

    #[test]
    fn test_len_is_inclusive() {
        for block in ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "1.2.3.0/31"] {
            let r = range(block);
            assert_eq!(r.len(), u64::from(r.end - r.start) + 1, "{block}");
            assert_eq!(r.len(), r.addresses().count() as u64, "{block}");
        }
    }

    #[test]
    fn test_whole_address_space() {
        let r = range("0.0.0.0/0");
        assert_eq!(r.start, 0);
        assert_eq!(r.end, u32::MAX);
        assert_eq!(r.len(), 1u64 << 32);
    }

    #[test]
    fn test_top_of_address_space_iterates_without_overflow() {
        let r = range("255.255.255.252/30");
        let addrs: Vec<u32> = r.addresses().collect();
        assert_eq!(addrs.len(), 4);
        assert_eq!(*addrs.last().unwrap(), u32::MAX);
    }

    #[test]
    fn test_overlaps_and_contains() {
        let a = range("10.0.0.0/24");
        let b = range("10.0.0.128/25");
        let c = range("10.0.1.0/24");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(a.contains(u32::from(Ipv4Addr::new(10, 0, 0, 200))));
        assert!(!a.contains(u32::from(Ipv4Addr::new(10, 0, 1, 0))));
    }

    #[test]
    fn test_display_names_block_and_bounds() {
        assert_eq!(
            range("10.0.0.128/25").to_string(),
            "10.0.0.128/25 [10.0.0.128, 10.0.0.255]"
        );
    }

    #[test]
    fn test_parse_rejects_bad_prefix() {
        let err = parse_block("10.0.0.0/33").unwrap_err();
        assert!(matches!(err, ExpandError::Parse { ref block, .. } if block == "10.0.0.0/33"));
        assert!(err.to_string().contains("10.0.0.0/33"));
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for bad in ["", "10.0.0.0", "10.0.0/8", "not-a-cidr", "::1/128", "256.0.0.0/8"] {
            assert!(parse_block(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse_block(" 10.0.0.0/8 ").unwrap().to_string(), "10.0.0.0/8");
    }

    #[test]
    fn test_build_ranges_is_fail_fast() {
        let err = build_ranges(&["10.0.0.0/24", "10.0.1.0/33", "bogus"]).unwrap_err();
        match err {
            ExpandError::Parse { block, .. } => assert_eq!(block, "10.0.1.0/33"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_ranges_keeps_input_order() {
        let ranges = build_ranges(&["192.168.0.0/24", "10.0.0.0/30"]).unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].block.to_string(), "192.168.0.0/24");
        assert_eq!(ranges[1].block.to_string(), "10.0.0.0/30");
    }

    #[test]
    fn test_split_cidr_list_keeps_empty_entries() {
        assert_eq!(
            split_cidr_list("10.0.0.0/8,172.16.0.0/12"),
            vec!["10.0.0.0/8", "172.16.0.0/12"]
        );
        assert_eq!(split_cidr_list("10.0.0.0/8,"), vec!["10.0.0.0/8", ""]);
        assert!(build_ranges(&split_cidr_list("10.0.0.0/8,")).is_err());
    }
}
