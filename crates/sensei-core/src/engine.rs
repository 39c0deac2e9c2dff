//! Expansion engine: enumerate every address of every range.
//!
//! [`expand`] is the entry point. It builds the lookup for the selected
//! [`Algorithm`], then runs either the sequential baseline
//! ([`expand_sequential`]) or the worker pool ([`crate::parallel`]).
//!
//! A run moves through `Building -> Running -> Draining` and ends as
//! `Completed`, `Cancelled` (see [`ExpansionStatus`]) or failed (an
//! [`ExpandError`](crate::ExpandError)). A cancelled run still returns the
//! addresses produced before the stop.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{ExpandError, Result};
use crate::lookup::{build_lookup, Algorithm, RangeLookup};
use crate::parallel::expand_parallel;
use crate::range::AddressRange;

/// Default number of parallel workers.
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Default capacity of the bounded output channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// How many addresses a worker enumerates between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: u32 = 256;

/// Upper bound on the result capacity reserved up front.
const PREALLOCATE_LIMIT: u64 = 1 << 24;

/// Execution mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Single-threaded, ascending output.
    #[default]
    Sequential,
    /// Fixed worker pool feeding a bounded channel; unordered output.
    Parallel,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Parallel => f.write_str("parallel"),
        }
    }
}

/// Options for one expansion run.
#[derive(Debug, Clone)]
pub struct ExpandOptions {
    pub mode: Mode,
    pub algorithm: Algorithm,
    /// Number of workers in parallel mode. Always greater than zero.
    pub concurrency: usize,
    /// Capacity of the output channel in parallel mode.
    pub channel_capacity: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            algorithm: Algorithm::default(),
            concurrency: DEFAULT_CONCURRENCY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ExpandOptions {
    pub fn sequential(algorithm: Algorithm) -> Self {
        Self {
            mode: Mode::Sequential,
            algorithm,
            ..Self::default()
        }
    }

    pub fn parallel(algorithm: Algorithm, concurrency: i64) -> Self {
        Self {
            mode: Mode::Parallel,
            algorithm,
            concurrency: Self::coerce_concurrency(concurrency),
            ..Self::default()
        }
    }

    /// Set the output channel capacity; zero selects the default.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = if capacity == 0 {
            DEFAULT_CHANNEL_CAPACITY
        } else {
            capacity
        };
        self
    }

    /// Map a requested worker count onto a usable one: values of zero or
    /// below select [`DEFAULT_CONCURRENCY`].
    pub fn coerce_concurrency(requested: i64) -> usize {
        if requested <= 0 {
            DEFAULT_CONCURRENCY
        } else {
            usize::try_from(requested).unwrap_or(DEFAULT_CONCURRENCY)
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionStatus {
    /// Every address of every range was produced.
    Completed,
    /// The run was stopped through its cancellation token.
    Cancelled,
}

impl fmt::Display for ExpansionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Addresses produced by a run and how the run ended.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub addresses: Vec<Ipv4Addr>,
    pub status: ExpansionStatus,
}

impl Expansion {
    pub fn is_cancelled(&self) -> bool {
        self.status == ExpansionStatus::Cancelled
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Total address count over `ranges`, capped for use as an allocation hint.
pub(crate) fn capacity_hint(ranges: &[AddressRange]) -> usize {
    let total: u64 = ranges.iter().map(AddressRange::len).sum();
    total.min(PREALLOCATE_LIMIT) as usize
}

/// Expand `ranges` according to `options`.
///
/// The lookup is built before any address is enumerated, so parse and
/// overlap errors abort the run with no output.
pub async fn expand(
    ranges: Vec<AddressRange>,
    options: &ExpandOptions,
    cancel: CancellationToken,
) -> Result<Expansion> {
    let started = Instant::now();

    tracing::debug!(
        phase = "building",
        ranges = ranges.len(),
        algorithm = %options.algorithm,
        "Building lookup"
    );
    let lookup = build_lookup(options.algorithm, &ranges)?;

    tracing::debug!(phase = "running", mode = %options.mode, "Starting expansion");
    let expansion = match options.mode {
        Mode::Sequential => {
            tokio::task::spawn_blocking(move || expand_sequential(&ranges, &*lookup, &cancel))
                .await
                .map_err(|e| ExpandError::Worker(e.to_string()))??
        }
        Mode::Parallel => expand_parallel(&ranges, lookup, options, &cancel).await?,
    };

    tracing::info!(
        mode = %options.mode,
        algorithm = %options.algorithm,
        status = %expansion.status,
        addresses = expansion.len(),
        duration_ms = started.elapsed().as_millis(),
        "Expansion finished"
    );

    Ok(expansion)
}

/// Single-threaded expansion in ascending address order.
///
/// Ranges are visited sorted by start address and every address is checked
/// against `lookup` before it is emitted. Given disjoint ranges, each address
/// is produced exactly once.
pub fn expand_sequential(
    ranges: &[AddressRange],
    lookup: &dyn RangeLookup,
    cancel: &CancellationToken,
) -> Result<Expansion> {
    let mut sorted = ranges.to_vec();
    sorted.sort_by_key(|r| r.start);

    let mut addresses = Vec::with_capacity(capacity_hint(&sorted));

    for range in &sorted {
        for addr in range.addresses() {
            if (addr - range.start) % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                tracing::debug!(addresses = addresses.len(), "Sequential expansion cancelled");
                return Ok(Expansion {
                    addresses,
                    status: ExpansionStatus::Cancelled,
                });
            }

            if lookup.contains(addr).is_none() {
                return Err(ExpandError::LookupMiss {
                    address: Ipv4Addr::from(addr),
                    range: *range,
                });
            }
            addresses.push(Ipv4Addr::from(addr));
        }
    }

    Ok(Expansion {
        addresses,
        status: ExpansionStatus::Completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::SortedRanges;
    use crate::range::build_ranges;

    #[test]
    fn test_coerce_concurrency() {
        assert_eq!(ExpandOptions::coerce_concurrency(0), DEFAULT_CONCURRENCY);
        assert_eq!(ExpandOptions::coerce_concurrency(-5), DEFAULT_CONCURRENCY);
        assert_eq!(ExpandOptions::coerce_concurrency(1), 1);
        assert_eq!(ExpandOptions::coerce_concurrency(64), 64);
    }

    #[test]
    fn test_default_options() {
        let options = ExpandOptions::default();
        assert_eq!(options.mode, Mode::Sequential);
        assert_eq!(options.algorithm, Algorithm::BinarySearch);
        assert_eq!(options.concurrency, 100);
        assert_eq!(options.channel_capacity, 1000);
        assert_eq!(options.with_channel_capacity(0).channel_capacity, 1000);
    }

    #[test]
    fn test_parallel_options_coerce() {
        let options = ExpandOptions::parallel(Algorithm::IntervalTree, -1);
        assert_eq!(options.mode, Mode::Parallel);
        assert_eq!(options.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_sequential_orders_across_ranges() {
        let ranges = build_ranges(&["10.0.0.8/30", "10.0.0.0/30"]).unwrap();
        let lookup = SortedRanges::build(&ranges).unwrap();
        let expansion = expand_sequential(&ranges, &lookup, &CancellationToken::new()).unwrap();

        let expected: Vec<Ipv4Addr> = [0, 1, 2, 3, 8, 9, 10, 11]
            .into_iter()
            .map(|last| Ipv4Addr::new(10, 0, 0, last))
            .collect();
        assert_eq!(expansion.addresses, expected);
        assert_eq!(expansion.status, ExpansionStatus::Completed);
    }

    #[test]
    fn test_sequential_precancelled_returns_nothing() {
        let ranges = build_ranges(&["10.0.0.0/24"]).unwrap();
        let lookup = SortedRanges::build(&ranges).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let expansion = expand_sequential(&ranges, &lookup, &cancel).unwrap();
        assert!(expansion.is_cancelled());
        assert!(expansion.is_empty());
    }

    #[test]
    fn test_sequential_reports_lookup_miss() {
        let ranges = build_ranges(&["10.0.0.0/30"]).unwrap();
        let empty = SortedRanges::build(&[]).unwrap();

        let err = expand_sequential(&ranges, &empty, &CancellationToken::new()).unwrap_err();
        assert!(matches!(
            err,
            ExpandError::LookupMiss { address, .. } if address == Ipv4Addr::new(10, 0, 0, 0)
        ));
    }

    #[test]
    fn test_capacity_hint_is_capped() {
        let ranges = build_ranges(&["0.0.0.0/0"]).unwrap();
        assert_eq!(capacity_hint(&ranges), 1 << 24);
        let ranges = build_ranges(&["10.0.0.0/30", "10.0.1.0/31"]).unwrap();
        assert_eq!(capacity_hint(&ranges), 6);
    }

    #[tokio::test]
    async fn test_expand_sequential_mode() {
        let ranges = build_ranges(&["192.168.1.0/32"]).unwrap();
        let options = ExpandOptions::sequential(Algorithm::IntervalTree);
        let expansion = expand(ranges, &options, CancellationToken::new()).await.unwrap();
        assert_eq!(expansion.addresses, vec![Ipv4Addr::new(192, 168, 1, 0)]);
    }

    #[tokio::test]
    async fn test_expand_fails_before_enumeration_on_overlap() {
        let ranges = build_ranges(&["10.0.0.0/24", "10.0.0.128/25"]).unwrap();
        for options in [
            ExpandOptions::sequential(Algorithm::IntervalTree),
            ExpandOptions::parallel(Algorithm::IntervalTree, 4),
            ExpandOptions::parallel(Algorithm::BinarySearch, 4),
        ] {
            let result = expand(ranges.clone(), &options, CancellationToken::new()).await;
            assert!(matches!(result, Err(ExpandError::Overlap { .. })));
        }
    }
}
