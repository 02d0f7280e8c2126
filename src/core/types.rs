//! Common types used across the application

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three tracked meters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Meter {
    Meter1,
    Meter2,
    Meter3,
}

impl Meter {
    pub const ALL: [Meter; 3] = [Meter::Meter1, Meter::Meter2, Meter::Meter3];

    pub fn name(&self) -> &'static str {
        match self {
            Meter::Meter1 => "meter1",
            Meter::Meter2 => "meter2",
            Meter::Meter3 => "meter3",
        }
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value for each of the three meters (cumulative readings, bases, or deltas)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeterValues {
    pub meter1: i64,
    pub meter2: i64,
    pub meter3: i64,
}

/// Largest magnitude accepted for a cumulative meter value or a limit
pub const MAX_METER_VALUE: i64 = 1_000_000_000_000_000;

impl MeterValues {
    pub fn new(meter1: i64, meter2: i64, meter3: i64) -> Self {
        Self { meter1, meter2, meter3 }
    }

    pub fn get(&self, meter: Meter) -> i64 {
        match meter {
            Meter::Meter1 => self.meter1,
            Meter::Meter2 => self.meter2,
            Meter::Meter3 => self.meter3,
        }
    }

    /// Build values by evaluating `f` for every meter
    pub fn from_fn(mut f: impl FnMut(Meter) -> i64) -> Self {
        Self {
            meter1: f(Meter::Meter1),
            meter2: f(Meter::Meter2),
            meter3: f(Meter::Meter3),
        }
    }

    /// Combine two sets of values meter by meter
    pub fn zip_with(&self, other: &MeterValues, mut f: impl FnMut(i64, i64) -> i64) -> Self {
        Self::from_fn(|meter| f(self.get(meter), other.get(meter)))
    }

    pub fn total(&self) -> i64 {
        self.meter1 + self.meter2 + self.meter3
    }
}

/// Key into a [`MeterBreakdown`]: a single meter or the combined total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakdownKey {
    Meter(Meter),
    Total,
}

/// Per-meter figures plus a combined total, as reported by the metrics engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterBreakdown<T> {
    pub meter1: T,
    pub meter2: T,
    pub meter3: T,
    pub total: T,
}

impl<T> MeterBreakdown<T> {
    pub fn from_fn(mut f: impl FnMut(BreakdownKey) -> T) -> Self {
        Self {
            meter1: f(BreakdownKey::Meter(Meter::Meter1)),
            meter2: f(BreakdownKey::Meter(Meter::Meter2)),
            meter3: f(BreakdownKey::Meter(Meter::Meter3)),
            total: f(BreakdownKey::Total),
        }
    }

    pub fn get(&self, key: BreakdownKey) -> &T {
        match key {
            BreakdownKey::Meter(Meter::Meter1) => &self.meter1,
            BreakdownKey::Meter(Meter::Meter2) => &self.meter2,
            BreakdownKey::Meter(Meter::Meter3) => &self.meter3,
            BreakdownKey::Total => &self.total,
        }
    }
}

impl MeterBreakdown<i64> {
    /// Per-meter values with their sum as the total
    pub fn with_total(values: MeterValues) -> Self {
        Self {
            meter1: values.meter1,
            meter2: values.meter2,
            meter3: values.meter3,
            total: values.total(),
        }
    }
}

/// A baseline period: the meter values consumption is measured from,
/// and the date range the limits apply to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselinePeriod {
    pub id: i64,
    pub meter1_base: i64,
    pub meter2_base: i64,
    pub meter3_base: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Creation time (Unix timestamp)
    pub created_at: i64,
}

impl BaselinePeriod {
    pub fn base_values(&self) -> MeterValues {
        MeterValues::new(self.meter1_base, self.meter2_base, self.meter3_base)
    }

    /// Inclusive number of days in the period
    pub fn total_days(&self) -> i64 {
        (self.period_end - self.period_start).num_days() + 1
    }
}

/// Values needed to create a baseline period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBaseline {
    pub base: MeterValues,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// A daily cumulative meter reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterReading {
    pub reading_date: NaiveDate,
    pub meter1_current: i64,
    pub meter2_current: i64,
    pub meter3_current: i64,
    /// Creation or last update time (Unix timestamp)
    pub timestamp: i64,
}

impl MeterReading {
    pub fn new(reading_date: NaiveDate, values: MeterValues) -> Self {
        Self {
            reading_date,
            meter1_current: values.meter1,
            meter2_current: values.meter2,
            meter3_current: values.meter3,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn current_values(&self) -> MeterValues {
        MeterValues::new(self.meter1_current, self.meter2_current, self.meter3_current)
    }
}

/// Whether an upsert created a new reading or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_values_helpers() {
        let current = MeterValues::new(1050, 2040, 3010);
        let base = MeterValues::new(1000, 2000, 3000);

        let delta = current.zip_with(&base, |c, b| c - b);
        assert_eq!(delta, MeterValues::new(50, 40, 10));
        assert_eq!(delta.total(), 100);
        assert_eq!(current.get(Meter::Meter2), 2040);
    }

    #[test]
    fn test_breakdown_with_total() {
        let breakdown = MeterBreakdown::with_total(MeterValues::new(1, 2, 3));
        assert_eq!(breakdown.total, 6);
        assert_eq!(*breakdown.get(BreakdownKey::Meter(Meter::Meter3)), 3);
    }

    #[test]
    fn test_baseline_total_days_is_inclusive() {
        let baseline = BaselinePeriod {
            id: 1,
            meter1_base: 0,
            meter2_base: 0,
            meter3_base: 0,
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            created_at: 0,
        };
        assert_eq!(baseline.total_days(), 31);
    }

    #[test]
    fn test_meter_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Meter::Meter1).unwrap(), "\"meter1\"");
        assert_eq!(
            serde_json::to_string(&UpsertOutcome::Updated).unwrap(),
            "\"updated\""
        );
    }
}
