//! Usage metrics for a baseline period
//!
//! Derives daily consumption from cumulative readings and projects it
//! against the configured limits:
//! - totals, remaining budget, and daily averages
//! - usage percentage and linear projection across the period
//! - days until each limit is reached
//! - peak usage day and pacing (efficiency) score

use crate::consumption::consumption_since;
use crate::core::{
    BaselinePeriod, BreakdownKey, LimitsConfig, MeterBreakdown, MeterReading, MeterValues,
};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::cmp;

/// Round half away from zero to `places` decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Number of days of the period that have started by `now`
pub fn days_elapsed(period_start: NaiveDate, period_end: NaiveDate, now: NaiveDate) -> i64 {
    if now < period_start {
        0
    } else if now > period_end {
        (period_end - period_start).num_days() + 1
    } else {
        (now - period_start).num_days() + 1
    }
}

/// Date range whose readings count towards the metrics:
/// `[period_start, min(now, period_end)]`, or `None` before the period starts
pub fn metrics_window(baseline: &BaselinePeriod, now: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    if now < baseline.period_start {
        return None;
    }
    Some((baseline.period_start, cmp::min(now, baseline.period_end)))
}

/// Estimated days until a limit is reached at the current pace
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DaysUntilLimit {
    Days(f64),
    /// No consumption so far, the limit is never reached at this pace
    Unbounded,
}

impl Serialize for DaysUntilLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DaysUntilLimit::Days(days) => serializer.serialize_f64(*days),
            DaysUntilLimit::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

/// Consumption for a single reading date relative to the previous reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub meter1: i64,
    pub meter2: i64,
    pub meter3: i64,
    pub total: i64,
}

impl DailyUsage {
    fn new(date: NaiveDate, delta: MeterValues) -> Self {
        Self {
            date,
            meter1: delta.meter1,
            meter2: delta.meter2,
            meter3: delta.meter3,
            total: delta.total(),
        }
    }
}

/// Where `now` falls within the baseline period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingPeriod {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub current_date: NaiveDate,
    pub total_days_in_period: i64,
    pub days_elapsed: i64,
    pub days_remaining: i64,
}

impl TrackingPeriod {
    pub fn new(baseline: &BaselinePeriod, now: NaiveDate) -> Self {
        let total_days_in_period = baseline.total_days();
        let days_elapsed = days_elapsed(baseline.period_start, baseline.period_end, now);

        Self {
            period_start: baseline.period_start,
            period_end: baseline.period_end,
            current_date: now,
            total_days_in_period,
            days_elapsed,
            days_remaining: cmp::max(0, total_days_in_period - days_elapsed),
        }
    }

    /// Share of the period that has elapsed, in percent
    pub fn time_progress_percentage(&self) -> f64 {
        if self.total_days_in_period == 0 {
            return 0.0;
        }
        100.0 * self.days_elapsed as f64 / self.total_days_in_period as f64
    }
}

/// Full metrics for a period with at least one reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageMetrics {
    pub limits: LimitsConfig,
    pub tracking_period: TrackingPeriod,
    pub latest_reading_date: NaiveDate,
    pub total_consumed: MeterBreakdown<i64>,
    pub remaining: MeterBreakdown<i64>,
    pub daily_avg_used: MeterBreakdown<f64>,
    pub daily_avg_remaining: MeterBreakdown<f64>,
    pub usage_percentage: MeterBreakdown<f64>,
    pub time_progress_percentage: f64,
    pub period_projection: MeterBreakdown<f64>,
    pub days_until_limit: MeterBreakdown<DaysUntilLimit>,
    pub peak_usage_day: Option<DailyUsage>,
    pub daily_usage: Vec<DailyUsage>,
    pub efficiency_score: MeterBreakdown<f64>,
}

/// Returned instead of metrics when the period has no readings yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoUsageData {
    pub error: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub current_date: NaiveDate,
}

/// Outcome of a metrics computation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UsageMetricsReport {
    Computed(Box<UsageMetrics>),
    NoData(NoUsageData),
}

impl UsageMetricsReport {
    pub fn metrics(&self) -> Option<&UsageMetrics> {
        match self {
            UsageMetricsReport::Computed(metrics) => Some(&**metrics),
            UsageMetricsReport::NoData(_) => None,
        }
    }
}

/// Per-reading consumption deltas, ascending by date.
///
/// The first reading's delta is its full consumption since the baseline.
pub fn daily_usage(baseline: &BaselinePeriod, readings: &[MeterReading]) -> Vec<DailyUsage> {
    let mut previous = MeterValues::default();

    readings
        .iter()
        .map(|reading| {
            let to_date = consumption_since(&reading.current_values(), baseline);
            let delta = to_date.zip_with(&previous, |now, before| now - before);
            previous = to_date;
            DailyUsage::new(reading.reading_date, delta)
        })
        .collect()
}

/// Day with the highest total; the earliest date wins a tie
pub fn peak_usage_day(daily: &[DailyUsage]) -> Option<DailyUsage> {
    daily.iter().fold(None, |peak: Option<DailyUsage>, day| match peak {
        Some(best) if best.total >= day.total => Some(best),
        _ => Some(*day),
    })
}

/// Compute usage metrics for the active baseline.
///
/// `readings` should be ascending by date. Readings outside the metrics
/// window are ignored.
pub fn compute_usage_metrics(
    baseline: &BaselinePeriod,
    readings: &[MeterReading],
    now: NaiveDate,
    limits: &LimitsConfig,
) -> UsageMetricsReport {
    let tracking_period = TrackingPeriod::new(baseline, now);

    let in_window: Vec<MeterReading> = match metrics_window(baseline, now) {
        Some((from, to)) => readings
            .iter()
            .filter(|r| r.reading_date >= from && r.reading_date <= to)
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    let latest = match in_window.last() {
        Some(latest) => latest,
        None => {
            log::debug!("No readings between {} and {}", baseline.period_start, now);
            return UsageMetricsReport::NoData(NoUsageData {
                error: "No readings found for current period".to_string(),
                period_start: baseline.period_start,
                period_end: baseline.period_end,
                current_date: now,
            });
        }
    };

    let elapsed = tracking_period.days_elapsed;
    let remaining_days = tracking_period.days_remaining;
    let limit_for = |key: BreakdownKey| match key {
        BreakdownKey::Meter(_) => limits.per_meter_limit,
        BreakdownKey::Total => limits.total_limit,
    };

    let total_consumed = MeterBreakdown::with_total(consumption_since(&latest.current_values(), baseline));

    let remaining = MeterBreakdown::from_fn(|key| limit_for(key) - total_consumed.get(key));

    let daily_avg_used = MeterBreakdown::from_fn(|key| {
        if elapsed > 0 {
            round_to(*total_consumed.get(key) as f64 / elapsed as f64, 2)
        } else {
            0.0
        }
    });

    let daily_avg_remaining = MeterBreakdown::from_fn(|key| {
        if remaining_days > 0 {
            round_to(*remaining.get(key) as f64 / remaining_days as f64, 2)
        } else {
            0.0
        }
    });

    let usage_percentage = MeterBreakdown::from_fn(|key| {
        let limit = limit_for(key);
        if limit == 0 {
            return 0.0;
        }
        round_to(100.0 * *total_consumed.get(key) as f64 / limit as f64, 1)
    });

    let total_days = tracking_period.total_days_in_period as f64;
    let period_projection =
        MeterBreakdown::from_fn(|key| round_to(daily_avg_used.get(key) * total_days, 1));

    let days_until_limit = MeterBreakdown::from_fn(|key| {
        let avg = *daily_avg_used.get(key);
        if avg > 0.0 {
            let left = (limit_for(key) - total_consumed.get(key)) as f64;
            let days = round_to(left / avg, 1);
            DaysUntilLimit::Days(if days <= 0.0 { 0.0 } else { days })
        } else {
            DaysUntilLimit::Unbounded
        }
    });

    let time_progress = tracking_period.time_progress_percentage();
    let efficiency_score = MeterBreakdown::from_fn(|key| {
        round_to(100.0 - (usage_percentage.get(key) - time_progress), 1)
    });

    let daily = daily_usage(baseline, &in_window);
    let peak = peak_usage_day(&daily);

    log::debug!(
        "Computed metrics for {} readings, {} of {} days elapsed",
        in_window.len(),
        elapsed,
        tracking_period.total_days_in_period
    );

    UsageMetricsReport::Computed(Box::new(UsageMetrics {
        limits: *limits,
        latest_reading_date: latest.reading_date,
        tracking_period,
        total_consumed,
        remaining,
        daily_avg_used,
        daily_avg_remaining,
        usage_percentage,
        time_progress_percentage: round_to(time_progress, 1),
        period_projection,
        days_until_limit,
        peak_usage_day: peak,
        daily_usage: daily,
        efficiency_score,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn january_baseline() -> BaselinePeriod {
        BaselinePeriod {
            id: 1,
            meter1_base: 1000,
            meter2_base: 2000,
            meter3_base: 3000,
            period_start: date(2024, 1, 1),
            period_end: date(2024, 1, 31),
            created_at: 0,
        }
    }

    fn reading(day: u32, m1: i64, m2: i64, m3: i64) -> MeterReading {
        MeterReading {
            reading_date: date(2024, 1, day),
            meter1_current: m1,
            meter2_current: m2,
            meter3_current: m3,
            timestamp: 0,
        }
    }

    fn computed(report: UsageMetricsReport) -> UsageMetrics {
        match report {
            UsageMetricsReport::Computed(metrics) => *metrics,
            UsageMetricsReport::NoData(data) => panic!("expected metrics, got {:?}", data),
        }
    }

    #[test]
    fn test_round_to_half_away_from_zero() {
        assert_eq!(round_to(2.25, 1), 2.3);
        assert_eq!(round_to(-2.25, 1), -2.3);
        assert_eq!(round_to(7.142857, 2), 7.14);
        assert_eq!(round_to(0.5, 0), 1.0);
    }

    #[test]
    fn test_single_reading_example() {
        let metrics = computed(compute_usage_metrics(
            &january_baseline(),
            &[reading(10, 1050, 2040, 3010)],
            date(2024, 1, 10),
            &LimitsConfig::default(),
        ));

        assert_eq!(metrics.total_consumed, MeterBreakdown { meter1: 50, meter2: 40, meter3: 10, total: 100 });
        assert_eq!(metrics.usage_percentage, MeterBreakdown { meter1: 25.0, meter2: 20.0, meter3: 5.0, total: 16.7 });
        assert_eq!(metrics.remaining, MeterBreakdown { meter1: 150, meter2: 160, meter3: 190, total: 500 });

        assert_eq!(metrics.tracking_period.total_days_in_period, 31);
        assert_eq!(metrics.tracking_period.days_elapsed, 10);
        assert_eq!(metrics.tracking_period.days_remaining, 21);

        assert_eq!(metrics.daily_avg_used, MeterBreakdown { meter1: 5.0, meter2: 4.0, meter3: 1.0, total: 10.0 });
        assert_eq!(metrics.daily_avg_remaining, MeterBreakdown { meter1: 7.14, meter2: 7.62, meter3: 9.05, total: 23.81 });
        assert_eq!(metrics.period_projection, MeterBreakdown { meter1: 155.0, meter2: 124.0, meter3: 31.0, total: 310.0 });
        assert_eq!(metrics.days_until_limit.meter1, DaysUntilLimit::Days(30.0));
        assert_eq!(metrics.days_until_limit.meter3, DaysUntilLimit::Days(190.0));
        assert_eq!(metrics.days_until_limit.total, DaysUntilLimit::Days(50.0));
        assert_eq!(metrics.efficiency_score, MeterBreakdown { meter1: 107.3, meter2: 112.3, meter3: 127.3, total: 115.6 });

        assert_eq!(metrics.daily_usage.len(), 1);
        assert_eq!(metrics.daily_usage[0].total, 100);
        assert_eq!(metrics.latest_reading_date, date(2024, 1, 10));
    }

    #[test]
    fn test_daily_deltas_and_peak_tie_goes_to_earliest() {
        let readings = vec![
            reading(2, 1010, 2010, 3010),
            reading(3, 1020, 2020, 3020),
            reading(4, 1025, 2020, 3020),
        ];
        let metrics = computed(compute_usage_metrics(
            &january_baseline(),
            &readings,
            date(2024, 1, 4),
            &LimitsConfig::default(),
        ));

        let totals: Vec<i64> = metrics.daily_usage.iter().map(|d| d.total).collect();
        assert_eq!(totals, vec![30, 30, 5]);
        assert_eq!(metrics.daily_usage[2].meter1, 5);
        assert_eq!(metrics.daily_usage[2].meter2, 0);

        let peak = metrics.peak_usage_day.unwrap();
        assert_eq!(peak.date, date(2024, 1, 2));
        assert_eq!(peak.total, 30);
    }

    #[test]
    fn test_no_readings_returns_no_data() {
        let report = compute_usage_metrics(
            &january_baseline(),
            &[],
            date(2024, 1, 15),
            &LimitsConfig::default(),
        );

        match report {
            UsageMetricsReport::NoData(data) => {
                assert_eq!(data.period_start, date(2024, 1, 1));
                assert_eq!(data.period_end, date(2024, 1, 31));
                assert_eq!(data.current_date, date(2024, 1, 15));
            }
            other => panic!("expected no data, got {:?}", other),
        }
    }

    #[test]
    fn test_before_period_start_is_no_data() {
        let report = compute_usage_metrics(
            &january_baseline(),
            &[reading(5, 1010, 2010, 3010)],
            date(2023, 12, 20),
            &LimitsConfig::default(),
        );
        assert!(report.metrics().is_none());
    }

    #[test]
    fn test_readings_after_now_are_ignored() {
        let readings = vec![reading(5, 1010, 2010, 3010), reading(20, 1100, 2100, 3100)];
        let metrics = computed(compute_usage_metrics(
            &january_baseline(),
            &readings,
            date(2024, 1, 10),
            &LimitsConfig::default(),
        ));
        assert_eq!(metrics.total_consumed.total, 30);
        assert_eq!(metrics.daily_usage.len(), 1);
    }

    #[test]
    fn test_after_period_end() {
        let metrics = computed(compute_usage_metrics(
            &january_baseline(),
            &[reading(31, 1100, 2100, 3100)],
            date(2024, 3, 1),
            &LimitsConfig::default(),
        ));

        assert_eq!(metrics.tracking_period.days_elapsed, 31);
        assert_eq!(metrics.tracking_period.days_remaining, 0);
        assert_eq!(metrics.daily_avg_remaining.total, 0.0);
        assert_eq!(metrics.time_progress_percentage, 100.0);
    }

    #[test]
    fn test_elapsed_plus_remaining_covers_period() {
        let baseline = january_baseline();
        let mut now = baseline.period_start;
        while now <= baseline.period_end {
            let period = TrackingPeriod::new(&baseline, now);
            assert_eq!(period.days_elapsed + period.days_remaining, period.total_days_in_period);
            now = now.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_zero_consumption_is_unbounded() {
        let metrics = computed(compute_usage_metrics(
            &january_baseline(),
            &[reading(3, 1000, 2000, 3000)],
            date(2024, 1, 3),
            &LimitsConfig::default(),
        ));

        assert_eq!(metrics.days_until_limit.meter1, DaysUntilLimit::Unbounded);
        assert_eq!(metrics.days_until_limit.total, DaysUntilLimit::Unbounded);
        assert!(metrics.peak_usage_day.is_some());

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["days_until_limit"]["meter1"], "unbounded");
    }

    #[test]
    fn test_over_limit_clamps_days_until_limit() {
        let metrics = computed(compute_usage_metrics(
            &january_baseline(),
            &[reading(4, 1300, 2000, 3000)],
            date(2024, 1, 4),
            &LimitsConfig::default(),
        ));

        assert_eq!(metrics.remaining.meter1, -100);
        assert_eq!(metrics.days_until_limit.meter1, DaysUntilLimit::Days(0.0));
        assert_eq!(metrics.usage_percentage.meter1, 150.0);
        assert!(metrics.efficiency_score.meter1 < 100.0);
    }

    #[test]
    fn test_barely_over_limit_is_positive_zero() {
        let metrics = computed(compute_usage_metrics(
            &january_baseline(),
            &[reading(10, 1201, 2000, 3000)],
            date(2024, 1, 10),
            &LimitsConfig::default(),
        ));

        assert_eq!(metrics.remaining.meter1, -1);
        match metrics.days_until_limit.meter1 {
            DaysUntilLimit::Days(days) => assert!(days == 0.0 && days.is_sign_positive()),
            DaysUntilLimit::Unbounded => panic!("expected a day count"),
        }
        assert_eq!(serde_json::to_string(&metrics.days_until_limit.meter1).unwrap(), "0.0");
    }

    #[test]
    fn test_report_serialization_is_tagged() {
        let report = compute_usage_metrics(
            &january_baseline(),
            &[],
            date(2024, 1, 2),
            &LimitsConfig::default(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "no_data");
        assert_eq!(json["period_start"], "2024-01-01");
    }
}
