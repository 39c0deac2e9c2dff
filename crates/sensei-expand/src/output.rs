//! Output sinks for expanded addresses.
//!
//! - terminal: one address per line on stdout
//! - csv: single-column records, no header
//! - json: pretty-printed array of `{ "address": "..." }` objects
//!
//! File sinks write to `ips_<cidr list>_<timestamp>.<ext>` in the configured
//! output directory.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::ser::{Serialize, Serializer};

use crate::error::{Result, SenseiError};

/// Timestamp layout used in output file names.
const FILENAME_TIMESTAMP: &str = "%Y-%m-%dT%H-%M-%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Csv,
    Json,
}

impl OutputFormat {
    /// File extension for file-backed formats.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Terminal => None,
            Self::Csv => Some("csv"),
            Self::Json => Some("json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SenseiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "terminal" => Ok(Self::Terminal),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(SenseiError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Terminal => f.write_str("terminal"),
            Self::Csv => f.write_str("csv"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Consumer of an expanded address list.
pub trait AddressSink {
    /// Render every address, then flush.
    fn write_addresses(&mut self, addresses: &[Ipv4Addr]) -> Result<()>;
}

/// One address per line.
pub struct TerminalSink<W: Write> {
    writer: BufWriter<W>,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

impl<W: Write> AddressSink for TerminalSink<W> {
    fn write_addresses(&mut self, addresses: &[Ipv4Addr]) -> Result<()> {
        for addr in addresses {
            writeln!(self.writer, "{addr}")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Single-column CSV, one address per record.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }
}

impl<W: Write> AddressSink for CsvSink<W> {
    fn write_addresses(&mut self, addresses: &[Ipv4Addr]) -> Result<()> {
        for addr in addresses {
            self.writer.write_record([addr.to_string()])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Pretty-printed JSON array of address records.
pub struct JsonSink<W: Write> {
    writer: BufWriter<W>,
}

impl JsonSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

#[derive(serde::Serialize)]
struct AddressRecord {
    address: Ipv4Addr,
}

/// Serializes a slice of addresses as records without building them up front.
struct AddressRecords<'a>(&'a [Ipv4Addr]);

impl Serialize for AddressRecords<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.0.iter().map(|&address| AddressRecord { address }))
    }
}

impl<W: Write> AddressSink for JsonSink<W> {
    fn write_addresses(&mut self, addresses: &[Ipv4Addr]) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, &AddressRecords(addresses))?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Make a CIDR list usable inside a file name: `/` becomes `-`, anything
/// outside `[A-Za-z0-9.,-]` becomes `_`.
pub fn sanitize_cidr_list(cidr_list: &str) -> String {
    cidr_list
        .chars()
        .map(|c| match c {
            '/' => '-',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | '-') => c,
            _ => '_',
        })
        .collect()
}

/// File name for a file-backed format, or `None` for the terminal.
pub fn output_filename(
    format: OutputFormat,
    cidr_list: &str,
    timestamp: DateTime<Local>,
) -> Option<String> {
    format.extension().map(|ext| {
        format!(
            "ips_{}_{}.{ext}",
            sanitize_cidr_list(cidr_list),
            timestamp.format(FILENAME_TIMESTAMP)
        )
    })
}

/// Render `addresses` in `format`.
///
/// Returns the path of the written file for CSV and JSON, `None` for the
/// terminal.
pub fn write_output(
    format: OutputFormat,
    addresses: &[Ipv4Addr],
    cidr_list: &str,
    output_dir: &Path,
) -> Result<Option<PathBuf>> {
    let path = output_filename(format, cidr_list, Local::now()).map(|name| output_dir.join(name));

    match (&path, format) {
        (Some(path), OutputFormat::Csv) => CsvSink::create(path)?.write_addresses(addresses)?,
        (Some(path), OutputFormat::Json) => JsonSink::create(path)?.write_addresses(addresses)?,
        _ => TerminalSink::stdout().write_addresses(addresses)?,
    }

    if let Some(path) = &path {
        tracing::info!(
            format = %format,
            path = %path.display(),
            addresses = addresses.len(),
            "Wrote output file"
        );
    }

    Ok(path)
}
