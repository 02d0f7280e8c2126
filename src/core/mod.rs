//! Core module - Configuration, errors, dates, and common types

mod config;
mod date;
mod error;
mod types;

pub use config::{
    Config, LimitsConfig, PeriodConfig, StorageConfig, CONFIG_PATH_ENV, MAX_PERIOD_DAYS,
};
pub use date::{format_date, parse_date, DATE_FORMAT};
pub use error::{Error, Result};
pub use types::{
    BaselinePeriod, BreakdownKey, Meter, MeterBreakdown, MeterReading, MeterValues, NewBaseline,
    UpsertOutcome, MAX_METER_VALUE,
};
