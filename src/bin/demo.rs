//! Meter Tracker - Demo CLI
//!
//! Walks through a baseline period on an in-memory database:
//! submissions, gap detection and filling, and usage metrics.

use meter_tracker_lib::core::{format_date, Config, MeterValues};
use meter_tracker_lib::db::Database;
use meter_tracker_lib::metrics::{DaysUntilLimit, UsageMetricsReport};
use meter_tracker_lib::tracker::Tracker;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("==============================================");
    println!("   Meter Tracker - Demo CLI");
    println!("==============================================\n");

    // 1. Baseline
    println!("[1/4] Setting baseline period...");
    let tracker = Tracker::new(Database::open_in_memory()?, Config::default());
    let baseline = tracker.set_baseline(
        MeterValues::new(1000, 2000, 3000),
        "2024-01-01",
        Some("2024-01-31"),
    )?;
    println!(
        "      Base: {} / {} / {}",
        baseline.meter1_base, baseline.meter2_base, baseline.meter3_base
    );
    println!(
        "      Period: {} to {} ({} days)\n",
        format_date(baseline.period_start),
        format_date(baseline.period_end),
        baseline.total_days()
    );

    // 2. Readings, with a few days skipped
    println!("[2/4] Submitting readings...");
    let submissions = [
        ("2024-01-02", MeterValues::new(1006, 2004, 3001)),
        ("2024-01-03", MeterValues::new(1013, 2009, 3002)),
        ("2024-01-07", MeterValues::new(1041, 2025, 3006)),
        ("2024-01-08", MeterValues::new(1050, 2030, 3008)),
        ("2024-01-10", MeterValues::new(1062, 2041, 3010)),
    ];
    for (date, values) in submissions {
        let result = tracker.submit_reading(date, values)?;
        println!(
            "      {}  {:>5} {:>5} {:>5}  ({:?})",
            date, values.meter1, values.meter2, values.meter3, result.outcome
        );
    }

    match tracker.submit_reading("2024-01-11", MeterValues::new(990, 2050, 3012)) {
        Ok(_) => println!("      Unexpected: reading below baseline accepted"),
        Err(e) => println!("      Rejected: {}", e),
    }
    println!();

    // 3. Gaps
    println!("[3/4] Looking for missing days...");
    let analysis = tracker.analyze_gaps()?;
    println!("      {} gap(s), {} missing day(s)", analysis.gaps.len(), analysis.total_missing_days);
    for gap in &analysis.gaps {
        println!(
            "      {} -> {}: +{}/+{}/+{} per day",
            format_date(gap.start_date),
            format_date(gap.end_date),
            gap.per_day_consumption.meter1,
            gap.per_day_consumption.meter2,
            gap.per_day_consumption.meter3
        );
    }

    let report = tracker.fill_gaps()?;
    println!("      Filled {} reading(s)", report.filled_count);
    for filled in &report.filled {
        let reading = &filled.reading;
        println!(
            "      {}  {:>5} {:>5} {:>5}",
            format_date(reading.reading_date),
            reading.meter1_current,
            reading.meter2_current,
            reading.meter3_current
        );
    }
    println!();

    // 4. Metrics
    println!("[4/4] Usage metrics as of 2024-01-10...\n");
    let now = meter_tracker_lib::core::parse_date("2024-01-10")?;
    match tracker.usage_metrics(now)? {
        UsageMetricsReport::Computed(metrics) => {
            let period = &metrics.tracking_period;
            println!(
                "  Day {} of {} ({} remaining)\n",
                period.days_elapsed, period.total_days_in_period, period.days_remaining
            );
            println!("----------------------------------------------------------");
            println!("  Meter   | Used | Left | Usage % | Projection | Days left");
            println!("----------------------------------------------------------");

            let rows = [
                ("meter1", &metrics.total_consumed.meter1, &metrics.remaining.meter1, metrics.usage_percentage.meter1, metrics.period_projection.meter1, metrics.days_until_limit.meter1),
                ("meter2", &metrics.total_consumed.meter2, &metrics.remaining.meter2, metrics.usage_percentage.meter2, metrics.period_projection.meter2, metrics.days_until_limit.meter2),
                ("meter3", &metrics.total_consumed.meter3, &metrics.remaining.meter3, metrics.usage_percentage.meter3, metrics.period_projection.meter3, metrics.days_until_limit.meter3),
                ("total", &metrics.total_consumed.total, &metrics.remaining.total, metrics.usage_percentage.total, metrics.period_projection.total, metrics.days_until_limit.total),
            ];
            for (name, used, left, pct, projection, days) in rows {
                let days = match days {
                    DaysUntilLimit::Days(d) => format!("{:.1}", d),
                    DaysUntilLimit::Unbounded => "-".to_string(),
                };
                println!(
                    "  {:<7} | {:>4} | {:>4} | {:>7.1} | {:>10.1} | {:>9}",
                    name, used, left, pct, projection, days
                );
            }
            println!("----------------------------------------------------------\n");

            if let Some(peak) = &metrics.peak_usage_day {
                println!("  Peak day: {} ({} units)", format_date(peak.date), peak.total);
            }
            println!("  Efficiency (total): {:.1}", metrics.efficiency_score.total);
        }
        UsageMetricsReport::NoData(data) => {
            println!("  {}", data.error);
        }
    }

    println!("\n  Stored readings: {}", tracker.store().reading_count()?);
    println!("\n==============================================\n");

    Ok(())
}
