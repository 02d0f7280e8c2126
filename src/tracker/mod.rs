//! Meter tracker service
//!
//! Entry point for every user-facing operation. Date literals are parsed
//! here, before the store is touched, and the active baseline is always
//! queried from the store and passed explicitly into the engines.

use crate::consumption::{
    consumption_since, validate_against_baseline, validate_meter_values, ReadingWithConsumption,
};
use crate::core::{
    parse_date, BaselinePeriod, Config, Error, MeterReading, MeterValues, NewBaseline, Result,
    UpsertOutcome,
};
use crate::db::ReadingStore;
use crate::gaps::{self, GapAnalysis, GapFillReport};
use crate::metrics::{self, UsageMetricsReport};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Result of a reading submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResult {
    pub reading_date: NaiveDate,
    pub outcome: UpsertOutcome,
    pub consumption: MeterValues,
}

/// Consumption of the active period up to its latest reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumptionSummary {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub latest_date: Option<NaiveDate>,
    pub total_consumption: MeterValues,
}

/// Storage health report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
}

/// Tracker over a reading store
pub struct Tracker<S: ReadingStore> {
    store: S,
    config: Config,
}

impl<S: ReadingStore> Tracker<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start a new baseline period. Without an end date the period lasts
    /// `default_period_days` days.
    pub fn set_baseline(
        &self,
        base: MeterValues,
        period_start: &str,
        period_end: Option<&str>,
    ) -> Result<BaselinePeriod> {
        let start = parse_date(period_start)?;
        let end = match period_end {
            Some(end) => parse_date(end)?,
            None => {
                let days = self.config.period.default_period_days;
                start
                    .checked_add_signed(Duration::days(i64::from(days) - 1))
                    .ok_or_else(|| {
                        Error::Config(format!(
                            "A {} day period starting {} ends past the last supported date",
                            days, start
                        ))
                    })?
            }
        };
        validate_meter_values(&base)?;

        if end < start {
            return Err(Error::InvalidPeriod { start, end });
        }

        let baseline = self.store.insert_baseline(&NewBaseline {
            base,
            period_start: start,
            period_end: end,
        })?;

        log::info!(
            "Baseline set for {} to {} ({}, {}, {})",
            start,
            end,
            base.meter1,
            base.meter2,
            base.meter3
        );
        Ok(baseline)
    }

    pub fn latest_baseline(&self) -> Result<Option<BaselinePeriod>> {
        self.store.latest_baseline()
    }

    /// The active baseline, or `NoBaselineSet`
    pub fn active_baseline(&self) -> Result<BaselinePeriod> {
        self.store.latest_baseline()?.ok_or(Error::NoBaselineSet)
    }

    /// Move the end date of the active period
    pub fn update_baseline_end_date(&self, period_end: &str) -> Result<BaselinePeriod> {
        let end = parse_date(period_end)?;
        let active = self.active_baseline()?;

        if end < active.period_start {
            return Err(Error::InvalidPeriod {
                start: active.period_start,
                end,
            });
        }

        let updated = self
            .store
            .update_baseline_end_date(end)?
            .ok_or(Error::NoBaselineSet)?;

        log::info!("Baseline period now ends {}", end);
        Ok(updated)
    }

    /// Record the cumulative values for a date, replacing any earlier
    /// submission for the same date
    pub fn submit_reading(&self, reading_date: &str, values: MeterValues) -> Result<SubmitResult> {
        let date = parse_date(reading_date)?;
        validate_meter_values(&values)?;
        let baseline = self.active_baseline()?;

        if let Err(e) = validate_against_baseline(&values, &baseline) {
            log::warn!("Rejected reading for {}: {}", date, e);
            return Err(e);
        }

        let outcome = self.store.upsert_reading(date, &values)?;
        log::info!("Reading for {} {:?}", date, outcome);

        Ok(SubmitResult {
            reading_date: date,
            outcome,
            consumption: consumption_since(&values, &baseline),
        })
    }

    /// Readings from the start of the active period onwards, with consumption
    pub fn readings(&self) -> Result<Vec<ReadingWithConsumption>> {
        let baseline = match self.store.latest_baseline()? {
            Some(baseline) => baseline,
            None => return Ok(Vec::new()),
        };

        let readings = self
            .store
            .readings_since(baseline.period_start)?
            .into_iter()
            .map(|reading| ReadingWithConsumption::derive(reading, &baseline))
            .collect();
        Ok(readings)
    }

    /// Most recent reading by date with consumption against the active
    /// baseline. `None` when nothing has been recorded yet.
    pub fn latest_reading(&self) -> Result<Option<ReadingWithConsumption>> {
        let baseline = match self.store.latest_baseline()? {
            Some(baseline) => baseline,
            None => return Ok(None),
        };

        Ok(self
            .store
            .latest_reading()?
            .map(|reading| ReadingWithConsumption::derive(reading, &baseline)))
    }

    pub fn reading_dates(&self) -> Result<Vec<NaiveDate>> {
        self.store.distinct_dates_desc()
    }

    pub fn consumption_summary(&self) -> Result<ConsumptionSummary> {
        let baseline = self.active_baseline()?;
        let latest = self.store.readings_since(baseline.period_start)?.pop();

        let total_consumption = latest
            .as_ref()
            .map(|reading| consumption_since(&reading.current_values(), &baseline))
            .unwrap_or_default();

        Ok(ConsumptionSummary {
            period_start: baseline.period_start,
            period_end: baseline.period_end,
            latest_date: latest.map(|reading| reading.reading_date),
            total_consumption,
        })
    }

    /// Usage metrics for the active period as of `now`
    pub fn usage_metrics(&self, now: NaiveDate) -> Result<UsageMetricsReport> {
        let baseline = self.active_baseline()?;

        let readings = match metrics::metrics_window(&baseline, now) {
            Some((from, to)) => self.store.readings_in_range(from, to)?,
            None => Vec::new(),
        };

        Ok(metrics::compute_usage_metrics(
            &baseline,
            &readings,
            now,
            &self.config.limits,
        ))
    }

    fn period_readings(&self, baseline: &BaselinePeriod) -> Result<Vec<MeterReading>> {
        self.store
            .readings_in_range(baseline.period_start, baseline.period_end)
    }

    /// Gaps in the active period's readings
    pub fn analyze_gaps(&self) -> Result<GapAnalysis> {
        let baseline = self.active_baseline()?;
        let readings = self.period_readings(&baseline)?;
        Ok(gaps::analyze_gaps(&readings))
    }

    /// Interpolate and store readings for every missing day in the active period
    pub fn fill_gaps(&self) -> Result<GapFillReport> {
        let baseline = self.active_baseline()?;
        let readings = self.period_readings(&baseline)?;
        gaps::fill_gaps(&self.store, &readings, &baseline)
    }

    pub fn delete_reading(&self, reading_date: &str) -> Result<()> {
        let date = parse_date(reading_date)?;

        if !self.store.delete_reading(date)? {
            return Err(Error::NotFound(format!("No reading found for date {}", reading_date)));
        }

        log::info!("Deleted reading for {}", date);
        Ok(())
    }

    /// Delete every reading dated before `cutoff_date`, returning the count
    pub fn delete_readings_before(&self, cutoff_date: &str) -> Result<u64> {
        let cutoff = parse_date(cutoff_date)?;
        let deleted = self.store.delete_readings_before(cutoff)?;
        log::info!("Deleted {} reading(s) before {}", deleted, cutoff);
        Ok(deleted)
    }

    pub fn health(&self) -> Result<HealthStatus> {
        self.store.ping()?;
        Ok(HealthStatus {
            status: "healthy",
            database: "connected",
        })
    }
}
