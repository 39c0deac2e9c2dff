//! Error types for the sensei-expand crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SenseiError {
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("the --output flag is required (terminal, csv, or json)")]
    MissingOutput,

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SenseiError>;
