//! Database module for persisting baselines and meter readings
//!
//! Uses SQLite for local storage of:
//! - Baseline periods (append-mostly log, the latest one is active)
//! - Daily cumulative meter readings (one per date)
//!
//! Consumption is never stored; it is derived from these two tables.

use crate::core::{
    format_date, BaselinePeriod, Config, Error, MeterReading, MeterValues, NewBaseline, Result,
    UpsertOutcome, DATE_FORMAT,
};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// Storage operations the tracker needs
pub trait ReadingStore {
    /// Append a new baseline period, which becomes the active one
    fn insert_baseline(&self, baseline: &NewBaseline) -> Result<BaselinePeriod>;

    /// Most recently created baseline period
    fn latest_baseline(&self) -> Result<Option<BaselinePeriod>>;

    /// Move the end date of the latest baseline period
    fn update_baseline_end_date(&self, period_end: NaiveDate) -> Result<Option<BaselinePeriod>>;

    /// Insert or overwrite the reading for a date
    fn upsert_reading(&self, date: NaiveDate, values: &MeterValues) -> Result<UpsertOutcome>;

    /// Insert readings for dates that have none, all in one transaction.
    /// Returns the dates that were actually inserted.
    fn insert_missing_readings(&self, readings: &[MeterReading]) -> Result<Vec<NaiveDate>>;

    /// Readings with `from <= reading_date <= to`, ascending by date
    fn readings_in_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<MeterReading>>;

    /// Readings with `reading_date >= from`, ascending by date
    fn readings_since(&self, from: NaiveDate) -> Result<Vec<MeterReading>>;

    fn reading_at(&self, date: NaiveDate) -> Result<Option<MeterReading>>;

    /// Reading with the highest date
    fn latest_reading(&self) -> Result<Option<MeterReading>>;

    /// Returns false when no reading exists for the date
    fn delete_reading(&self, date: NaiveDate) -> Result<bool>;

    /// Delete every reading dated strictly before `cutoff`
    fn delete_readings_before(&self, cutoff: NaiveDate) -> Result<u64>;

    fn distinct_dates_desc(&self) -> Result<Vec<NaiveDate>>;

    /// Check the backend is reachable and the schema is in place
    fn ping(&self) -> Result<()>;
}

/// Database manager
pub struct Database {
    conn: Connection,
}

const BASELINE_COLUMNS: &str =
    "id, meter1_base, meter2_base, meter3_base, period_start, period_end, created_at";

const READING_COLUMNS: &str =
    "reading_date, meter1_current, meter2_current, meter3_current, timestamp";

impl Database {
    /// Open the database at the default location
    pub fn new() -> Result<Self> {
        let db_path = Self::db_path()?;
        Self::open(&db_path)
    }

    /// Open the database configured in `config`, falling back to the default location
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.storage.database_path {
            Some(path) => Self::open(Path::new(path)),
            None => Self::new(),
        }
    }

    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        log::debug!("Opened database at {}", path.display());
        Self::with_connection(conn)
    }

    /// Create a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Get the default database file path
    fn db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))?;

        Ok(data_dir.join("meter-tracker").join("readings.db"))
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Baseline periods, the most recently created one is active
            CREATE TABLE IF NOT EXISTS baseline_periods (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                meter1_base INTEGER NOT NULL,
                meter2_base INTEGER NOT NULL,
                meter3_base INTEGER NOT NULL,
                period_start TEXT NOT NULL,
                period_end TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            -- Daily cumulative readings
            CREATE TABLE IF NOT EXISTS meter_readings (
                reading_date TEXT PRIMARY KEY,
                meter1_current INTEGER NOT NULL,
                meter2_current INTEGER NOT NULL,
                meter3_current INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_baseline_created ON baseline_periods(created_at);
            "#,
        )?;

        Ok(())
    }

    /// Get total readings count
    pub fn reading_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM meter_readings", [], |row| row.get(0))?;
        Ok(count)
    }

    fn query_readings(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<MeterReading>> {
        let mut stmt = self.conn.prepare(sql)?;
        let readings = stmt
            .query_map(args, reading_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(readings)
    }
}

fn date_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn baseline_from_row(row: &Row) -> rusqlite::Result<BaselinePeriod> {
    Ok(BaselinePeriod {
        id: row.get(0)?,
        meter1_base: row.get(1)?,
        meter2_base: row.get(2)?,
        meter3_base: row.get(3)?,
        period_start: date_column(row, 4)?,
        period_end: date_column(row, 5)?,
        created_at: row.get(6)?,
    })
}

fn reading_from_row(row: &Row) -> rusqlite::Result<MeterReading> {
    Ok(MeterReading {
        reading_date: date_column(row, 0)?,
        meter1_current: row.get(1)?,
        meter2_current: row.get(2)?,
        meter3_current: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

impl ReadingStore for Database {
    fn insert_baseline(&self, baseline: &NewBaseline) -> Result<BaselinePeriod> {
        let now = chrono::Utc::now().timestamp();

        self.conn.execute(
            "INSERT INTO baseline_periods (meter1_base, meter2_base, meter3_base, period_start, period_end, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                baseline.base.meter1,
                baseline.base.meter2,
                baseline.base.meter3,
                format_date(baseline.period_start),
                format_date(baseline.period_end),
                now
            ],
        )?;

        Ok(BaselinePeriod {
            id: self.conn.last_insert_rowid(),
            meter1_base: baseline.base.meter1,
            meter2_base: baseline.base.meter2,
            meter3_base: baseline.base.meter3,
            period_start: baseline.period_start,
            period_end: baseline.period_end,
            created_at: now,
        })
    }

    fn latest_baseline(&self) -> Result<Option<BaselinePeriod>> {
        let baseline = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM baseline_periods ORDER BY created_at DESC, id DESC LIMIT 1",
                    BASELINE_COLUMNS
                ),
                [],
                baseline_from_row,
            )
            .optional()?;
        Ok(baseline)
    }

    fn update_baseline_end_date(&self, period_end: NaiveDate) -> Result<Option<BaselinePeriod>> {
        let updated = self.conn.execute(
            "UPDATE baseline_periods SET period_end = ?1
             WHERE id = (SELECT id FROM baseline_periods ORDER BY created_at DESC, id DESC LIMIT 1)",
            params![format_date(period_end)],
        )?;

        if updated == 0 {
            return Ok(None);
        }
        self.latest_baseline()
    }

    fn upsert_reading(&self, date: NaiveDate, values: &MeterValues) -> Result<UpsertOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let key = format_date(date);

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM meter_readings WHERE reading_date = ?1)",
            params![key],
            |row| row.get(0),
        )?;

        tx.execute(
            r#"INSERT INTO meter_readings (reading_date, meter1_current, meter2_current, meter3_current, timestamp)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(reading_date) DO UPDATE SET
                   meter1_current = ?2,
                   meter2_current = ?3,
                   meter3_current = ?4,
                   timestamp = ?5"#,
            params![
                key,
                values.meter1,
                values.meter2,
                values.meter3,
                chrono::Utc::now().timestamp()
            ],
        )?;
        tx.commit()?;

        Ok(if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }

    fn insert_missing_readings(&self, readings: &[MeterReading]) -> Result<Vec<NaiveDate>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::new();

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO meter_readings (reading_date, meter1_current, meter2_current, meter3_current, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for reading in readings {
                let changed = stmt.execute(params![
                    format_date(reading.reading_date),
                    reading.meter1_current,
                    reading.meter2_current,
                    reading.meter3_current,
                    reading.timestamp
                ])?;
                if changed > 0 {
                    inserted.push(reading.reading_date);
                }
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn readings_in_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<MeterReading>> {
        self.query_readings(
            &format!(
                "SELECT {} FROM meter_readings
                 WHERE reading_date >= ?1 AND reading_date <= ?2
                 ORDER BY reading_date ASC",
                READING_COLUMNS
            ),
            &[&format_date(from), &format_date(to)],
        )
    }

    fn readings_since(&self, from: NaiveDate) -> Result<Vec<MeterReading>> {
        self.query_readings(
            &format!(
                "SELECT {} FROM meter_readings WHERE reading_date >= ?1 ORDER BY reading_date ASC",
                READING_COLUMNS
            ),
            &[&format_date(from)],
        )
    }

    fn reading_at(&self, date: NaiveDate) -> Result<Option<MeterReading>> {
        let reading = self
            .conn
            .query_row(
                &format!("SELECT {} FROM meter_readings WHERE reading_date = ?1", READING_COLUMNS),
                params![format_date(date)],
                reading_from_row,
            )
            .optional()?;
        Ok(reading)
    }

    fn latest_reading(&self) -> Result<Option<MeterReading>> {
        let reading = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM meter_readings ORDER BY reading_date DESC LIMIT 1",
                    READING_COLUMNS
                ),
                [],
                reading_from_row,
            )
            .optional()?;
        Ok(reading)
    }

    fn delete_reading(&self, date: NaiveDate) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM meter_readings WHERE reading_date = ?1",
            params![format_date(date)],
        )?;
        Ok(deleted > 0)
    }

    fn delete_readings_before(&self, cutoff: NaiveDate) -> Result<u64> {
        let deleted = self.conn.execute(
            "DELETE FROM meter_readings WHERE reading_date < ?1",
            params![format_date(cutoff)],
        )?;
        Ok(deleted as u64)
    }

    fn distinct_dates_desc(&self) -> Result<Vec<NaiveDate>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT reading_date FROM meter_readings ORDER BY reading_date DESC")?;

        let dates = stmt
            .query_map([], |row| date_column(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(dates)
    }

    fn ping(&self) -> Result<()> {
        self.conn
            .query_row("SELECT COUNT(*) FROM baseline_periods", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn new_baseline(base: i64, start: u32, end: u32) -> NewBaseline {
        NewBaseline {
            base: MeterValues::new(base, base, base),
            period_start: date(start),
            period_end: date(end),
        }
    }

    #[test]
    fn test_latest_baseline_is_last_created() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.latest_baseline().unwrap().is_none());

        db.insert_baseline(&new_baseline(100, 1, 31)).unwrap();
        let second = db.insert_baseline(&new_baseline(500, 5, 20)).unwrap();

        // Both rows share the same created_at second; id breaks the tie
        let latest = db.latest_baseline().unwrap().unwrap();
        assert_eq!(latest, second);
        assert_eq!(latest.base_values(), MeterValues::new(500, 500, 500));
    }

    #[test]
    fn test_update_baseline_end_date() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.update_baseline_end_date(date(10)).unwrap().is_none());

        let first = db.insert_baseline(&new_baseline(100, 1, 31)).unwrap();
        db.insert_baseline(&new_baseline(200, 1, 31)).unwrap();

        let updated = db.update_baseline_end_date(date(15)).unwrap().unwrap();
        assert_eq!(updated.period_end, date(15));
        assert_eq!(updated.meter1_base, 200);

        // Older baselines are untouched
        let older: String = db
            .conn
            .query_row(
                "SELECT period_end FROM baseline_periods WHERE id = ?1",
                params![first.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(older, "2024-01-31");
    }

    #[test]
    fn test_upsert_reports_created_then_updated() {
        let db = Database::open_in_memory().unwrap();

        let outcome = db.upsert_reading(date(3), &MeterValues::new(1, 2, 3)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let outcome = db.upsert_reading(date(3), &MeterValues::new(4, 5, 6)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        assert_eq!(db.reading_count().unwrap(), 1);
        let stored = db.reading_at(date(3)).unwrap().unwrap();
        assert_eq!(stored.current_values(), MeterValues::new(4, 5, 6));
    }

    #[test]
    fn test_range_query_is_ascending_and_inclusive() {
        let db = Database::open_in_memory().unwrap();
        for day in [9, 2, 5, 12] {
            db.upsert_reading(date(day), &MeterValues::new(day as i64, 0, 0)).unwrap();
        }

        let dates: Vec<NaiveDate> = db
            .readings_in_range(date(2), date(9))
            .unwrap()
            .iter()
            .map(|r| r.reading_date)
            .collect();
        assert_eq!(dates, vec![date(2), date(5), date(9)]);

        assert_eq!(db.readings_since(date(6)).unwrap().len(), 2);
        assert_eq!(db.latest_reading().unwrap().unwrap().reading_date, date(12));
        assert_eq!(
            db.distinct_dates_desc().unwrap(),
            vec![date(12), date(9), date(5), date(2)]
        );
    }

    #[test]
    fn test_delete_reading() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_reading(date(4), &MeterValues::new(1, 1, 1)).unwrap();

        assert!(db.delete_reading(date(4)).unwrap());
        assert!(!db.delete_reading(date(4)).unwrap());
        assert!(db.reading_at(date(4)).unwrap().is_none());
    }

    #[test]
    fn test_delete_before_cutoff_is_strict() {
        let db = Database::open_in_memory().unwrap();
        for day in 1..=10 {
            db.upsert_reading(date(day), &MeterValues::new(day as i64, 0, 0)).unwrap();
        }

        let deleted = db.delete_readings_before(date(6)).unwrap();
        assert_eq!(deleted, 5);

        let remaining = db.distinct_dates_desc().unwrap();
        assert_eq!(remaining.len(), 5);
        assert!(remaining.iter().all(|d| *d >= date(6)));
        assert!(db.reading_at(date(6)).unwrap().is_some());
    }

    #[test]
    fn test_insert_missing_readings_skips_existing() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_reading(date(2), &MeterValues::new(50, 50, 50)).unwrap();

        let batch = vec![
            MeterReading::new(date(1), MeterValues::new(10, 10, 10)),
            MeterReading::new(date(2), MeterValues::new(20, 20, 20)),
            MeterReading::new(date(3), MeterValues::new(30, 30, 30)),
        ];
        let inserted = db.insert_missing_readings(&batch).unwrap();

        assert_eq!(inserted, vec![date(1), date(3)]);
        assert_eq!(db.reading_at(date(2)).unwrap().unwrap().meter1_current, 50);
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("readings.db");

        {
            let db = Database::open(&path).unwrap();
            db.insert_baseline(&new_baseline(100, 1, 31)).unwrap();
            db.upsert_reading(date(5), &MeterValues::new(110, 120, 130)).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.ping().is_ok());
        assert_eq!(db.latest_baseline().unwrap().unwrap().meter1_base, 100);
        assert_eq!(db.reading_count().unwrap(), 1);
    }
}
