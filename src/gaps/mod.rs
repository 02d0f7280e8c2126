//! Gap detection and linear gap filling for daily readings
//!
//! A gap is a run of calendar days with no reading between two consecutive
//! readings. Missing days are filled by spreading the consumption across
//! the gap evenly, which assumes uniform consumption over the gap.

use crate::consumption::ReadingWithConsumption;
use crate::core::{BaselinePeriod, MeterReading, MeterValues, Result};
use crate::db::ReadingStore;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;

/// A run of missing days between two readings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Days between the two boundary readings
    pub days_diff: i64,
    pub missing_dates: Vec<NaiveDate>,
    pub start_readings: MeterValues,
    pub end_readings: MeterValues,
    pub total_consumption: MeterValues,
    pub per_day_consumption: MeterValues,
}

impl Gap {
    fn between(current: &MeterReading, next: &MeterReading) -> Option<Self> {
        let days_diff = (next.reading_date - current.reading_date).num_days();
        if days_diff <= 1 {
            return None;
        }

        let start_readings = current.current_values();
        let end_readings = next.current_values();
        let total_consumption = end_readings.zip_with(&start_readings, |end, start| end - start);
        let per_day_consumption = MeterValues::from_fn(|meter| {
            (total_consumption.get(meter) as f64 / days_diff as f64).round() as i64
        });

        let missing_dates = (1..days_diff)
            .map(|offset| current.reading_date + Duration::days(offset))
            .collect();

        Some(Self {
            start_date: current.reading_date,
            end_date: next.reading_date,
            days_diff,
            missing_dates,
            start_readings,
            end_readings,
            total_consumption,
            per_day_consumption,
        })
    }

    /// Linearly interpolated cumulative values for each missing date
    pub fn interpolated(&self) -> Vec<(NaiveDate, MeterValues)> {
        self.missing_dates
            .iter()
            .zip(1i64..)
            .map(|(date, k)| {
                let values = self
                    .start_readings
                    .zip_with(&self.per_day_consumption, |start, per_day| start + per_day * k);
                (*date, values)
            })
            .collect()
    }
}

/// All gaps in a reading sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GapAnalysis {
    pub gaps: Vec<Gap>,
    pub total_missing_days: usize,
}

impl GapAnalysis {
    pub fn has_gaps(&self) -> bool {
        !self.gaps.is_empty()
    }
}

/// Find gaps between consecutive readings (ascending by date).
///
/// Fewer than two readings never contain a gap.
pub fn analyze_gaps(readings: &[MeterReading]) -> GapAnalysis {
    let gaps: Vec<Gap> = readings
        .windows(2)
        .filter_map(|pair| Gap::between(&pair[0], &pair[1]))
        .collect();

    let total_missing_days = gaps.iter().map(|gap| gap.missing_dates.len()).sum();

    GapAnalysis {
        gaps,
        total_missing_days,
    }
}

/// Readings that would fill every gap, ascending by date.
///
/// Dates that already have a reading are left out.
pub fn plan_gap_fill(readings: &[MeterReading]) -> Vec<MeterReading> {
    let existing: HashSet<NaiveDate> = readings.iter().map(|r| r.reading_date).collect();
    let analysis = analyze_gaps(readings);

    analysis
        .gaps
        .iter()
        .flat_map(|gap| gap.interpolated())
        .filter(|(date, _)| !existing.contains(date))
        .map(|(date, values)| MeterReading::new(date, values))
        .collect()
}

/// Result of a gap fill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GapFillReport {
    pub filled_count: usize,
    pub filled_dates: Vec<NaiveDate>,
    pub filled: Vec<ReadingWithConsumption>,
}

/// Insert interpolated readings for every missing date.
///
/// The inserts are applied as one batch; no gaps is a successful fill of
/// zero readings.
pub fn fill_gaps<S: ReadingStore + ?Sized>(
    store: &S,
    readings: &[MeterReading],
    baseline: &BaselinePeriod,
) -> Result<GapFillReport> {
    let planned = plan_gap_fill(readings);
    if planned.is_empty() {
        log::debug!("No gaps to fill");
        return Ok(GapFillReport::default());
    }

    let inserted = store.insert_missing_readings(&planned)?;
    let inserted_dates: HashSet<NaiveDate> = inserted.iter().copied().collect();

    let filled: Vec<ReadingWithConsumption> = planned
        .into_iter()
        .filter(|reading| inserted_dates.contains(&reading.reading_date))
        .map(|reading| ReadingWithConsumption::derive(reading, baseline))
        .collect();

    log::info!("Filled {} missing reading(s)", filled.len());

    Ok(GapFillReport {
        filled_count: filled.len(),
        filled_dates: filled.iter().map(|f| f.reading.reading_date).collect(),
        filled,
    })
}
