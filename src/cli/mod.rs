use clap::{Parser, Subcommand};
use meter_tracker_lib::core::{parse_date, Config, Error, MeterValues, Result};
use meter_tracker_lib::db::{Database, ReadingStore};
use meter_tracker_lib::tracker::Tracker;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

/// Track utility meter readings and usage against period limits
#[derive(Parser)]
#[command(name = "meter-tracker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQLite database file (overrides the configured path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Start a new baseline period
    SetBaseline {
        #[arg(long)]
        meter1: i64,
        #[arg(long)]
        meter2: i64,
        #[arg(long)]
        meter3: i64,
        /// First day of the period (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last day of the period (YYYY-MM-DD), defaults to the configured period length
        #[arg(long)]
        end: Option<String>,
    },

    /// Show the active baseline period
    Baseline,

    /// Change the last day of the active baseline period
    SetPeriodEnd {
        /// New last day (YYYY-MM-DD)
        date: String,
    },

    /// Submit cumulative readings for a date
    Submit {
        /// Reading date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[arg(long)]
        meter1: i64,
        #[arg(long)]
        meter2: i64,
        #[arg(long)]
        meter3: i64,
    },

    /// List readings of the active period with consumption
    Readings,

    /// Show the most recent reading
    Latest,

    /// List every reading date, newest first
    Dates,

    /// Show total consumption of the active period
    Summary,

    /// Show usage metrics for the active period
    Metrics {
        /// Evaluate as of this date instead of today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },

    /// Report days without a reading in the active period
    Gaps,

    /// Interpolate readings for days without one
    FillGaps,

    /// Delete the reading for a date
    Delete {
        /// Reading date (YYYY-MM-DD)
        date: String,
    },

    /// Delete every reading before a cutoff date
    Prune {
        /// Readings dated before this day are removed (YYYY-MM-DD)
        #[arg(long)]
        cutoff: String,
    },

    /// Check the database is reachable
    Health,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<ExitCode> {
        let mut config = Config::load()?;
        if let Some(path) = &self.db {
            config.storage.database_path = Some(path.display().to_string());
        }

        let tracker = Tracker::new(Database::from_config(&config)?, config);

        match execute(&tracker, self.command) {
            Ok(output) => {
                println!("{}", serde_json::to_string_pretty(&output)?);
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                log::debug!("Command failed: {:?}", e);
                let body = json!({ "error": e.code(), "detail": e.to_string() });
                eprintln!("{}", serde_json::to_string_pretty(&body)?);
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn execute<S: ReadingStore>(tracker: &Tracker<S>, command: Commands) -> Result<Value> {
    match command {
        Commands::SetBaseline {
            meter1,
            meter2,
            meter3,
            start,
            end,
        } => to_json(&tracker.set_baseline(
            MeterValues::new(meter1, meter2, meter3),
            &start,
            end.as_deref(),
        )?),
        Commands::Baseline => to_json(&tracker.latest_baseline()?),
        Commands::SetPeriodEnd { date } => to_json(&tracker.update_baseline_end_date(&date)?),
        Commands::Submit {
            date,
            meter1,
            meter2,
            meter3,
        } => to_json(&tracker.submit_reading(&date, MeterValues::new(meter1, meter2, meter3))?),
        Commands::Readings => to_json(&tracker.readings()?),
        Commands::Latest => to_json(&tracker.latest_reading()?),
        Commands::Dates => {
            let dates = to_json(&tracker.reading_dates()?)?;
            Ok(json!({ "dates": dates }))
        }
        Commands::Summary => to_json(&tracker.consumption_summary()?),
        Commands::Metrics { today } => {
            let now = match today {
                Some(date) => parse_date(&date)?,
                None => chrono::Local::now().date_naive(),
            };
            to_json(&tracker.usage_metrics(now)?)
        }
        Commands::Gaps => to_json(&tracker.analyze_gaps()?),
        Commands::FillGaps => to_json(&tracker.fill_gaps()?),
        Commands::Delete { date } => {
            tracker.delete_reading(&date)?;
            Ok(json!({ "message": format!("Successfully deleted reading for {}", date) }))
        }
        Commands::Prune { cutoff } => {
            let deleted = tracker.delete_readings_before(&cutoff)?;
            Ok(json!({
                "message": format!("Successfully deleted {} old records", deleted),
                "deleted_count": deleted
            }))
        }
        Commands::Health => to_json(&tracker.health()?),
    }
}
