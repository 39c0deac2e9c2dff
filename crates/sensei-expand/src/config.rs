//! Configuration for the cidr-sensei expander.
//!
//! Values are loaded from (in priority order):
//! 1. Command-line flags
//! 2. Environment variables (`CIDR_SENSEI__EXPAND__<KEY>`)
//! 3. Config file (`cidr-sensei.toml`, `[expand]` section)
//! 4. Defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use sensei_core::engine::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_CONCURRENCY};
use sensei_core::{Algorithm, ExpandOptions};

use crate::error::{Result, SenseiError};
use crate::output::OutputFormat;

/// The `[expand]` configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpandConfig {
    /// Output format: terminal, csv, or json. No default.
    #[serde(default)]
    pub output: Option<String>,

    /// Use the parallel worker pool instead of the sequential engine.
    #[serde(default)]
    pub parallel: bool,

    /// Number of parallel workers. Zero or negative selects the default.
    #[serde(default = "default_concurrency")]
    pub concurrency: i64,

    /// Lookup algorithm. Unknown names fall back to binary-search.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Capacity of the bounded output channel in parallel mode.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Directory that CSV and JSON files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Cancel the expansion after this many seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Log output format on stderr.
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Values given on the command line; `None` leaves the config value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output: Option<String>,
    pub parallel: bool,
    pub concurrency: Option<i64>,
    pub algorithm: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub format: OutputFormat,
    pub options: ExpandOptions,
    pub output_dir: PathBuf,
    pub timeout: Option<Duration>,
}

fn default_concurrency() -> i64 {
    DEFAULT_CONCURRENCY as i64
}

fn default_algorithm() -> String {
    Algorithm::default().to_string()
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            output: None,
            parallel: false,
            concurrency: default_concurrency(),
            algorithm: default_algorithm(),
            channel_capacity: default_channel_capacity(),
            output_dir: default_output_dir(),
            timeout_secs: None,
            log_format: LogFormat::default(),
        }
    }
}

impl ExpandConfig {
    /// Load the `[expand]` section from `<file_prefix>.toml` (optional) and
    /// `CIDR_SENSEI__*` environment variables. A missing section yields the
    /// defaults; a malformed one is an error.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("CIDR_SENSEI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.get::<ExpandConfig>("expand") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => Ok(ExpandConfig::default()),
            Err(e) => Err(SenseiError::Config(e)),
        }
    }

    /// Apply command-line overrides on top of the loaded values.
    pub fn merge(mut self, overrides: Overrides) -> Self {
        if let Some(output) = overrides.output {
            self.output = Some(output);
        }
        self.parallel |= overrides.parallel;
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(algorithm) = overrides.algorithm {
            self.algorithm = algorithm;
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        if overrides.timeout_secs.is_some() {
            self.timeout_secs = overrides.timeout_secs;
        }
        self
    }

    /// Validate and resolve into run settings.
    ///
    /// The output format must be present and known. The algorithm and
    /// concurrency are lenient: unknown or non-positive values fall back to
    /// their defaults.
    pub fn resolve(&self) -> Result<RunSettings> {
        let format: OutputFormat = self
            .output
            .as_deref()
            .ok_or(SenseiError::MissingOutput)?
            .parse()?;

        let algorithm = Algorithm::resolve(&self.algorithm);
        let options = if self.parallel {
            ExpandOptions::parallel(algorithm, self.concurrency)
        } else {
            ExpandOptions::sequential(algorithm)
        }
        .with_channel_capacity(self.channel_capacity);

        Ok(RunSettings {
            format,
            options,
            output_dir: self.output_dir.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        })
    }
}
