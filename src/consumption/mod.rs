//! Consumption calculation relative to a baseline
//!
//! Consumption is never stored. It is always derived from a cumulative
//! meter value and the base value of the active baseline period.

use crate::core::{
    BaselinePeriod, Error, Meter, MeterReading, MeterValues, Result, MAX_METER_VALUE,
};
use serde::{Deserialize, Serialize};

/// Consumption of a single meter: `current - base`
pub fn consumption(current: i64, base: i64) -> i64 {
    current - base
}

/// Consumption of all three meters relative to the baseline
pub fn consumption_since(current: &MeterValues, baseline: &BaselinePeriod) -> MeterValues {
    current.zip_with(&baseline.base_values(), consumption)
}

/// Reject values whose magnitude exceeds [`MAX_METER_VALUE`].
///
/// Values in range keep every consumption, total and interpolation in `i64`.
pub fn validate_meter_values(values: &MeterValues) -> Result<()> {
    for meter in Meter::ALL {
        let value = values.get(meter);
        if value.unsigned_abs() > MAX_METER_VALUE.unsigned_abs() {
            return Err(Error::ValueOutOfRange {
                meter,
                value,
                max: MAX_METER_VALUE,
            });
        }
    }
    Ok(())
}

/// Reject submitted values that fall below the baseline's base values.
///
/// Meters are checked in order, the first offending meter is reported.
pub fn validate_against_baseline(current: &MeterValues, baseline: &BaselinePeriod) -> Result<()> {
    let base = baseline.base_values();

    for meter in Meter::ALL {
        if current.get(meter) < base.get(meter) {
            return Err(Error::ReadingBelowBaseline {
                meter,
                current: current.get(meter),
                base: base.get(meter),
            });
        }
    }

    Ok(())
}

/// A stored reading together with its derived consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingWithConsumption {
    #[serde(flatten)]
    pub reading: MeterReading,
    pub consumption: MeterValues,
}

impl ReadingWithConsumption {
    pub fn derive(reading: MeterReading, baseline: &BaselinePeriod) -> Self {
        let consumption = consumption_since(&reading.current_values(), baseline);
        Self {
            reading,
            consumption,
        }
    }
}
