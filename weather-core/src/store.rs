//! SQLite persistence for weather readings.
//!
//! Two tables: `weather_data` holds one current snapshot per city and is
//! replaced on every insert, `weather_history` is an append-only log.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use tracing::debug;

use crate::model::{HighestAverage, WeatherHistoryEntry, WeatherReading};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS weather_data (
        city TEXT PRIMARY KEY,
        temperature REAL,
        feels_like REAL,
        avg_temp REAL
    );
    CREATE TABLE IF NOT EXISTS weather_history (
        city TEXT,
        temperature REAL,
        feels_like REAL,
        timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
    );
";

/// Format SQLite uses for `CURRENT_TIMESTAMP` (UTC).
const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug)]
pub struct WeatherStore {
    conn: Connection,
}

impl WeatherStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let store = Self { conn };
        store.create_tables()?;
        debug!(path = %path.display(), "Opened weather store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to create weather tables")
    }

    /// Store the current reading for `city`, replacing any earlier one.
    pub fn upsert_current(
        &self,
        city: &str,
        temperature: f64,
        feels_like: f64,
    ) -> Result<WeatherReading> {
        let reading = WeatherReading::new(city, temperature, feels_like);

        self.conn
            .execute(
                "INSERT OR REPLACE INTO weather_data (city, temperature, feels_like, avg_temp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![reading.city, reading.temperature, reading.feels_like, reading.avg_temp],
            )
            .with_context(|| format!("Failed to store current weather for {city}"))?;

        debug!(%city, temperature, feels_like, avg_temp = reading.avg_temp, "Stored current reading");
        Ok(reading)
    }

    pub fn read_current(&self, city: &str) -> Result<Option<WeatherReading>> {
        self.conn
            .query_row(
                "SELECT city, temperature, feels_like, avg_temp FROM weather_data WHERE city = ?1",
                [city],
                row_to_reading,
            )
            .optional()
            .with_context(|| format!("Failed to read current weather for {city}"))
    }

    /// City with the largest `avg_temp`, or `None` if nothing is stored.
    pub fn highest_average_city(&self) -> Result<Option<HighestAverage>> {
        self.conn
            .query_row(
                "SELECT city, avg_temp FROM weather_data ORDER BY avg_temp DESC LIMIT 1",
                [],
                |row| {
                    Ok(HighestAverage {
                        city: row.get(0)?,
                        avg_temp: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to query city with highest average temperature")
    }

    /// Append a timestamped reading to the history log and return the stored row.
    pub fn append_history(
        &self,
        city: &str,
        temperature: f64,
        feels_like: f64,
    ) -> Result<WeatherHistoryEntry> {
        self.conn
            .execute(
                "INSERT INTO weather_history (city, temperature, feels_like) VALUES (?1, ?2, ?3)",
                params![city, temperature, feels_like],
            )
            .with_context(|| format!("Failed to append weather history for {city}"))?;

        let entry = self
            .conn
            .query_row(
                "SELECT city, temperature, feels_like, timestamp
                 FROM weather_history WHERE rowid = ?1",
                [self.conn.last_insert_rowid()],
                row_to_history,
            )
            .with_context(|| format!("Failed to read back weather history for {city}"))?;

        debug!(%city, temperature, feels_like, "Appended history entry");
        Ok(entry)
    }

    /// History entries for `city`, oldest first.
    pub fn history_for(&self, city: &str) -> Result<Vec<WeatherHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT city, temperature, feels_like, timestamp
             FROM weather_history WHERE city = ?1 ORDER BY rowid",
        )?;

        let entries = stmt
            .query_map([city], row_to_history)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read weather history for {city}"))?;

        Ok(entries)
    }

    /// Delete every current snapshot. Returns the number of rows removed.
    pub fn clear_current(&self) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM weather_data", [])
            .context("Failed to clear current weather")?;
        debug!(removed, "Cleared current readings");
        Ok(removed)
    }
}

fn row_to_reading(row: &Row<'_>) -> rusqlite::Result<WeatherReading> {
    Ok(WeatherReading {
        city: row.get(0)?,
        temperature: row.get(1)?,
        feels_like: row.get(2)?,
        avg_temp: row.get(3)?,
    })
}

fn row_to_history(row: &Row<'_>) -> rusqlite::Result<WeatherHistoryEntry> {
    let raw: String = row.get(3)?;
    let timestamp = NaiveDateTime::parse_from_str(&raw, SQLITE_TIMESTAMP)
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(WeatherHistoryEntry {
        city: row.get(0)?,
        temperature: row.get(1)?,
        feels_like: row.get(2)?,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CITIES;

    fn store() -> WeatherStore {
        WeatherStore::open_in_memory().unwrap()
    }

    #[test]
    fn insert_then_read_back_london() {
        let db = store();
        let stored = db.upsert_current("London", 15.0, 14.0).unwrap();
        assert_eq!(stored.avg_temp, 14.5);

        let read = db.read_current("London").unwrap().expect("row must exist");
        assert_eq!(read, WeatherReading::new("London", 15.0, 14.0));
        assert_eq!((read.temperature, read.feels_like, read.avg_temp), (15.0, 14.0, 14.5));
    }

    #[test]
    fn read_missing_city_is_none() {
        assert!(store().read_current("Tokyo").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_previous_row() {
        let db = store();
        db.upsert_current("Paris", 10.0, 8.0).unwrap();
        db.upsert_current("Paris", 20.0, 22.0).unwrap();

        let read = db.read_current("Paris").unwrap().unwrap();
        assert_eq!(read.temperature, 20.0);
        assert_eq!(read.feels_like, 22.0);
        assert_eq!(read.avg_temp, 21.0);

        let rows: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM weather_data", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn every_known_city_round_trips() {
        let db = store();
        for (i, city) in CITIES.iter().enumerate() {
            let t = i as f64 * 3.5 - 4.0;
            db.upsert_current(city.name, t, t - 1.25).unwrap();
        }
        for (i, city) in CITIES.iter().enumerate() {
            let t = i as f64 * 3.5 - 4.0;
            let read = db.read_current(city.name).unwrap().unwrap();
            assert!(crate::compare::approx_eq(read.temperature, t, 0.01));
            assert!(crate::compare::approx_eq(read.feels_like, t - 1.25, 0.01));
        }
    }

    #[test]
    fn highest_average_on_empty_table() {
        assert!(store().highest_average_city().unwrap().is_none());
    }

    #[test]
    fn highest_average_picks_largest() {
        let db = store();
        db.upsert_current("London", 15.0, 14.0).unwrap();
        db.upsert_current("Tokyo", 28.0, 31.0).unwrap();
        db.upsert_current("Berlin", -2.0, -6.0).unwrap();

        let top = db.highest_average_city().unwrap().unwrap();
        assert_eq!(top.city, "Tokyo");
        assert_eq!(top.avg_temp, 29.5);
    }

    #[test]
    fn highest_average_follows_upserts() {
        let db = store();
        db.upsert_current("London", 15.0, 14.0).unwrap();
        db.upsert_current("Tokyo", 28.0, 31.0).unwrap();
        db.upsert_current("Tokyo", 5.0, 3.0).unwrap();

        let top = db.highest_average_city().unwrap().unwrap();
        assert_eq!(top.city, "London");
    }

    #[test]
    fn history_is_append_only() {
        let db = store();
        db.append_history("London", 15.0, 14.0).unwrap();
        db.append_history("London", 16.0, 15.5).unwrap();
        db.append_history("Paris", 12.0, 11.0).unwrap();

        let london = db.history_for("London").unwrap();
        assert_eq!(london.len(), 2);
        assert_eq!(london[0].temperature, 15.0);
        assert_eq!(london[1].temperature, 16.0);
        assert!(london[0].timestamp <= london[1].timestamp);
        assert!(london[1].timestamp <= Utc::now());

        assert_eq!(db.history_for("Paris").unwrap().len(), 1);
    }

    #[test]
    fn append_history_returns_the_new_row() {
        let db = store();
        db.append_history("London", 15.0, 14.0).unwrap();
        db.append_history("Paris", 12.0, 11.0).unwrap();

        let entry = db.append_history("London", 16.5, 15.0).unwrap();
        assert_eq!(entry.city, "London");
        assert_eq!(entry.temperature, 16.5);
        assert_eq!(entry.feels_like, 15.0);
        assert_eq!(db.history_for("London").unwrap().last(), Some(&entry));
    }

    #[test]
    fn history_does_not_touch_snapshot() {
        let db = store();
        db.append_history("Berlin", 1.0, 0.0).unwrap();
        assert!(db.read_current("Berlin").unwrap().is_none());
    }

    #[test]
    fn clear_current_keeps_history() {
        let db = store();
        db.upsert_current("London", 15.0, 14.0).unwrap();
        db.upsert_current("Paris", 12.0, 11.0).unwrap();
        db.append_history("London", 15.0, 14.0).unwrap();

        assert_eq!(db.clear_current().unwrap(), 2);
        assert!(db.read_current("London").unwrap().is_none());
        assert_eq!(db.history_for("London").unwrap().len(), 1);
    }

    #[test]
    fn file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");

        {
            let db = WeatherStore::open(&path).unwrap();
            db.upsert_current("Berlin", 3.0, 1.0).unwrap();
        }

        let db = WeatherStore::open(&path).unwrap();
        let read = db.read_current("Berlin").unwrap().unwrap();
        assert_eq!(read.avg_temp, 2.0);
    }
}
