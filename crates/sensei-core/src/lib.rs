//! sensei-core: CIDR block expansion engine.
//!
//! Turns parsed IPv4 CIDR blocks into inclusive integer ranges, indexes them
//! for membership lookups, and enumerates every contained address:
//! - [`range`] - the range model and CIDR parsing
//! - [`lookup`] / [`interval_tree`] - the two membership lookup strategies
//! - [`engine`] / [`parallel`] - sequential and worker-pool expansion

pub mod engine;
pub mod error;
pub mod interval_tree;
pub mod lookup;
pub mod parallel;
pub mod range;

pub use engine::{expand, expand_sequential, ExpandOptions, Expansion, ExpansionStatus, Mode};
pub use error::ExpandError;
pub use interval_tree::IntervalTree;
pub use lookup::{build_lookup, Algorithm, RangeLookup, SharedLookup, SortedRanges};
pub use parallel::expand_parallel;
pub use range::{build_ranges, parse_block, split_cidr_list, AddressRange};
