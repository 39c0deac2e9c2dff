//! Membership lookup over a set of disjoint address ranges.
//!
//! Two interchangeable strategies answer "which range, if any, contains this
//! address": [`SortedRanges`] (binary search over a sorted array) and
//! [`IntervalTree`] (an unbalanced search tree). Both reject overlapping
//! input at construction time and are read-only afterwards, so a built lookup
//! can be shared between workers behind an `Arc` without locking.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ExpandError, Result};
use crate::interval_tree::IntervalTree;
use crate::range::AddressRange;

/// A read-only membership index over disjoint ranges.
pub trait RangeLookup: Send + Sync {
    /// Return the range containing `addr`, if any.
    fn contains(&self, addr: u32) -> Option<&AddressRange>;

    /// Number of ranges in the index.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared handle to a built lookup, as handed to expansion workers.
pub type SharedLookup = Arc<dyn RangeLookup>;

/// Lookup strategy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Algorithm {
    /// Binary search over ranges sorted by start address.
    #[default]
    BinarySearch,
    /// Unbalanced interval tree, built in input order.
    IntervalTree,
}

impl Algorithm {
    /// Resolve a user-supplied algorithm name, falling back to the default
    /// for unknown values instead of failing.
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            let fallback = Self::default();
            tracing::warn!(
                requested = %name,
                fallback = %fallback,
                "Unknown algorithm, using default"
            );
            fallback
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BinarySearch => "binary-search",
            Self::IntervalTree => "interval-tree",
        }
    }
}

impl FromStr for Algorithm {
    type Err = ExpandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "binary-search" => Ok(Self::BinarySearch),
            "interval-tree" => Ok(Self::IntervalTree),
            _ => Err(ExpandError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the lookup for `algorithm` over `ranges`.
///
/// Runs to completion on the calling thread; any overlap between ranges is
/// reported here, before expansion starts.
pub fn build_lookup(algorithm: Algorithm, ranges: &[AddressRange]) -> Result<SharedLookup> {
    let lookup: SharedLookup = match algorithm {
        Algorithm::BinarySearch => Arc::new(SortedRanges::build(ranges)?),
        Algorithm::IntervalTree => Arc::new(IntervalTree::build(ranges)?),
    };

    tracing::debug!(algorithm = %algorithm, ranges = lookup.len(), "Built range lookup");

    Ok(lookup)
}

/// Ranges sorted ascending by start address, searched by bisection.
#[derive(Debug, Clone)]
pub struct SortedRanges {
    ranges: Vec<AddressRange>,
}

impl SortedRanges {
    /// Sort the ranges and verify that neighbours do not overlap.
    pub fn build(ranges: &[AddressRange]) -> Result<Self> {
        let mut sorted = ranges.to_vec();
        sorted.sort_by_key(|r| (r.start, r.end));

        // Sorted by start, so any overlap shows up between neighbours.
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0].overlaps(&pair[1])) {
            return Err(ExpandError::Overlap {
                new: pair[1],
                existing: pair[0],
            });
        }

        Ok(Self { ranges: sorted })
    }

    /// The ranges in ascending order.
    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }
}

impl RangeLookup for SortedRanges {
    fn contains(&self, addr: u32) -> Option<&AddressRange> {
        let idx = self.ranges.partition_point(|r| r.end < addr);
        self.ranges.get(idx).filter(|r| r.start <= addr)
    }

    fn len(&self) -> usize {
        self.ranges.len()
    }
}
