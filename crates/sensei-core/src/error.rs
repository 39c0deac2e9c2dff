//! Error types for the sensei-core crate.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::range::AddressRange;

#[derive(Error, Debug)]
pub enum ExpandError {
    #[error("error parsing CIDR {block}: {source}")]
    Parse {
        block: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    #[error("overlapping ranges are not supported: {new} overlaps with {existing}")]
    Overlap {
        new: AddressRange,
        existing: AddressRange,
    },

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("lookup has no range for {address}, which belongs to {range}")]
    LookupMiss {
        address: Ipv4Addr,
        range: AddressRange,
    },

    #[error("expansion worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, ExpandError>;
