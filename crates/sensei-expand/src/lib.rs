//! sensei-expand: command-line front end for the CIDR expansion engine.
//!
//! Loads configuration, wires Ctrl-C and deadlines into a cancellation token,
//! runs [`sensei_core::expand`], and renders the addresses to the terminal or
//! to a timestamped CSV/JSON file.

pub mod config;
pub mod error;
pub mod output;
pub mod shutdown;

pub use error::SenseiError;
