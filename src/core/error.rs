//! Error types for the application

use chrono::NaiveDate;
use thiserror::Error;

use super::Meter;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid date format: {0:?}. Use YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("No baseline period set. Please set base readings first.")]
    NoBaselineSet,

    #[error("{meter} reading {current} is below baseline {base}")]
    ReadingBelowBaseline { meter: Meter, current: i64, base: i64 },

    #[error("{meter} value {value} is outside the supported range of +/-{max}")]
    ValueOutOfRange { meter: Meter, value: i64, max: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid period: end {end} is before start {start}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidDateFormat(_) => "invalid-date-format",
            Error::NoBaselineSet => "no-baseline-set",
            Error::ReadingBelowBaseline { .. } => "reading-below-baseline",
            Error::ValueOutOfRange { .. } => "value-out-of-range",
            Error::NotFound(_) => "not-found",
            Error::InvalidPeriod { .. } => "invalid-period",
            Error::Config(_) => "config-error",
            Error::Database(_) => "storage-failure",
            Error::Io(_) => "io-error",
            Error::Serialization(_) => "serialization-error",
        }
    }
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;
