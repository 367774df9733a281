//! SQLite persistence
//!
//! [`SourceDatabase`] is the warehouse the time series queries run against
//! and optionally receives the ETL forecast table. [`MetadataStore`] keeps
//! every forecast run and cross-validation run.

use crate::config::DatabaseConfig;
use crate::error::{ProphetError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use kpi_forecast::{ForecastError, ForecastRow};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const METADATA_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS forecasts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        metric_name TEXT NOT NULL,
        forecast_timestamp TEXT NOT NULL,
        model BLOB,
        forecasts BLOB,
        source BLOB,
        hyper_parameters TEXT,
        components_figure TEXT,
        CONSTRAINT forecasts_uk UNIQUE (metric_name, forecast_timestamp)
    );

    CREATE TABLE IF NOT EXISTS forecasts_cross_validation (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        forecast_id INTEGER NOT NULL REFERENCES forecasts(id),
        horizon_days INTEGER NOT NULL,
        initial_days INTEGER,
        period_days INTEGER,
        cross_validation_table BLOB,
        metrics_table BLOB
    );

    CREATE INDEX IF NOT EXISTS idx_forecasts_metric
        ON forecasts(metric_name, forecast_timestamp);
"#;

/// A forecast run about to be stored
#[derive(Debug, Clone)]
pub struct NewForecast {
    pub metric_name: String,
    pub forecast_timestamp: DateTime<Utc>,
    pub model: Vec<u8>,
    pub forecasts: Vec<u8>,
    pub source: Vec<u8>,
    pub hyper_parameters: serde_json::Value,
    pub components_figure: Option<String>,
}

/// A stored forecast run
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    pub id: i64,
    pub metric_name: String,
    pub forecast_timestamp: DateTime<Utc>,
    pub model: Vec<u8>,
    pub forecasts: Vec<u8>,
    pub source: Vec<u8>,
    pub hyper_parameters: serde_json::Value,
    /// Cached components image (base64 SVG)
    pub components_figure: Option<String>,
}

/// A cross-validation run about to be stored
#[derive(Debug, Clone)]
pub struct NewCrossValidation {
    pub forecast_id: i64,
    pub horizon_days: i64,
    pub initial_days: Option<i64>,
    pub period_days: Option<i64>,
    pub cross_validation_table: Vec<u8>,
    pub metrics_table: Vec<u8>,
}

/// A stored cross-validation run
#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidationRecord {
    pub id: i64,
    pub forecast_id: i64,
    pub horizon_days: i64,
    pub initial_days: Option<i64>,
    pub period_days: Option<i64>,
    pub cross_validation_table: Vec<u8>,
    pub metrics_table: Vec<u8>,
}

/// Forecast and cross-validation records
#[derive(Clone)]
pub struct MetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl MetadataStore {
    /// Open (and create if needed) the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Create an in-memory store
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(METADATA_SCHEMA)?;
        debug!("Metadata schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a forecast run and return its id.
    ///
    /// Fails if a run for the same metric and timestamp already exists.
    pub fn insert_forecast(&self, forecast: &NewForecast) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO forecasts
            (metric_name, forecast_timestamp, model, forecasts, source, hyper_parameters, components_figure)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                forecast.metric_name,
                forecast.forecast_timestamp,
                forecast.model,
                forecast.forecasts,
                forecast.source,
                forecast.hyper_parameters.to_string(),
                forecast.components_figure,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent run for a (normalized) metric name
    pub fn latest_forecast(&self, metric_name: &str) -> Result<Option<ForecastRecord>> {
        self.query_forecast(
            r#"
            SELECT id, metric_name, forecast_timestamp, model, forecasts, source,
                   hyper_parameters, components_figure
            FROM forecasts
            WHERE metric_name = ?1
            ORDER BY forecast_timestamp DESC, id DESC
            LIMIT 1
            "#,
            Value::Text(metric_name.to_string()),
        )
    }

    /// Run with the given id
    pub fn forecast_by_id(&self, id: i64) -> Result<Option<ForecastRecord>> {
        self.query_forecast(
            r#"
            SELECT id, metric_name, forecast_timestamp, model, forecasts, source,
                   hyper_parameters, components_figure
            FROM forecasts
            WHERE id = ?1
            "#,
            Value::Integer(id),
        )
    }

    fn query_forecast(&self, sql: &str, key: Value) -> Result<Option<ForecastRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(sql, [key], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, DateTime<Utc>>(2)?,
                    row.get::<_, Option<Vec<u8>>>(3)?,
                    row.get::<_, Option<Vec<u8>>>(4)?,
                    row.get::<_, Option<Vec<u8>>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })
            .optional()?;

        row.map(
            |(id, metric_name, forecast_timestamp, model, forecasts, source, hyper, figure)| -> Result<ForecastRecord> {
                let hyper_parameters = match hyper {
                    Some(text) => serde_json::from_str(&text)?,
                    None => serde_json::Value::Null,
                };
                Ok(ForecastRecord {
                    id,
                    metric_name,
                    forecast_timestamp,
                    model: model.unwrap_or_default(),
                    forecasts: forecasts.unwrap_or_default(),
                    source: source.unwrap_or_default(),
                    hyper_parameters,
                    components_figure: figure,
                })
            },
        )
        .transpose()
    }

    /// Ids of every run of a metric, oldest first
    pub fn forecast_ids(&self, metric_name: &str) -> Result<Vec<i64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id FROM forecasts WHERE metric_name = ?1 ORDER BY forecast_timestamp, id",
        )?;
        let ids = stmt
            .query_map(params![metric_name], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Insert a cross-validation run and return its id
    pub fn insert_cross_validation(&self, cv: &NewCrossValidation) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO forecasts_cross_validation
            (forecast_id, horizon_days, initial_days, period_days, cross_validation_table, metrics_table)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                cv.forecast_id,
                cv.horizon_days,
                cv.initial_days,
                cv.period_days,
                cv.cross_validation_table,
                cv.metrics_table,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Cross-validation runs of a forecast, oldest first
    pub fn cross_validations(&self, forecast_id: i64) -> Result<Vec<CrossValidationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, forecast_id, horizon_days, initial_days, period_days,
                   cross_validation_table, metrics_table
            FROM forecasts_cross_validation
            WHERE forecast_id = ?1
            ORDER BY id
            "#,
        )?;
        let records = stmt
            .query_map(params![forecast_id], |row| {
                Ok(CrossValidationRecord {
                    id: row.get(0)?,
                    forecast_id: row.get(1)?,
                    horizon_days: row.get(2)?,
                    initial_days: row.get(3)?,
                    period_days: row.get(4)?,
                    cross_validation_table: row.get::<_, Option<Vec<u8>>>(5)?.unwrap_or_default(),
                    metrics_table: row.get::<_, Option<Vec<u8>>>(6)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Number of stored cross-validation runs
    pub fn cross_validation_count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT count(*) FROM forecasts_cross_validation", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }
}

/// The warehouse holding source data and the optional ETL table
#[derive(Clone)]
pub struct SourceDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SourceDatabase {
    /// Open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open(path)?)),
        })
    }

    /// Create an empty in-memory database
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        })
    }

    /// Run one or more statements
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Run a time series query and read its first two columns as
    /// `(date, value)`. Rows with a missing value are skipped; order is kept.
    pub fn read_time_series(&self, query: &str) -> Result<Vec<(NaiveDate, f64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(query)?;
        if stmt.column_count() < 2 {
            return Err(ProphetError::Config(
                "time series query must return a date and a value column".to_string(),
            ));
        }

        let raw = stmt
            .query_map([], |row| Ok((row.get::<_, Value>(0)?, row.get::<_, Value>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(raw.len());
        for (ds, y) in raw {
            let y = match y {
                Value::Null => continue,
                Value::Integer(v) => v as f64,
                Value::Real(v) => v,
                Value::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                    ForecastError::DataError(format!("value \"{}\" is not a number", text))
                })?,
                Value::Blob(_) => {
                    return Err(ForecastError::DataError("value column holds a blob".to_string()).into())
                }
            };
            rows.push((parse_date(ds)?, y));
        }
        Ok(rows)
    }

    /// Drop and recreate the ETL forecast table
    pub fn create_forecast_table(&self, table: &str) -> Result<()> {
        self.execute_batch(&format!(
            r#"
            DROP TABLE IF EXISTS {table};
            CREATE TABLE {table} (
                metric_date DATE,
                metric_name TEXT,
                metric_value DOUBLE PRECISION,
                lower_ci DOUBLE PRECISION,
                upper_ci DOUBLE PRECISION,
                PRIMARY KEY (metric_date, metric_name)
            );
            "#
        ))?;
        info!(table, "Created forecast table");
        Ok(())
    }

    /// Write predicted rows into the ETL table in one transaction.
    ///
    /// A row already present for the same date and metric is overwritten.
    pub fn write_forecast_rows(
        &self,
        table: &str,
        metric_name: &str,
        rows: &[ForecastRow],
    ) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut count = 0;

        {
            let mut stmt = tx.prepare(&format!(
                r#"
                INSERT INTO {table} (metric_date, metric_name, metric_value, lower_ci, upper_ci)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (metric_date, metric_name) DO UPDATE SET
                    metric_value = excluded.metric_value,
                    lower_ci = excluded.lower_ci,
                    upper_ci = excluded.upper_ci
                "#
            ))?;

            for row in rows {
                stmt.execute(params![
                    row.ds,
                    metric_name,
                    row.yhat,
                    row.yhat_lower,
                    row.yhat_upper
                ])?;
                count += 1;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    /// Column names of a table, in order
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    /// Number of rows in a table
    pub fn row_count(&self, table: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Dates come back as text (`YYYY-MM-DD`, possibly followed by a time)
fn parse_date(value: Value) -> Result<NaiveDate> {
    match value {
        Value::Text(text) => text
            .get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
            .ok_or_else(|| ForecastError::DataError(format!("\"{}\" is not a date", text)).into()),
        other => Err(ForecastError::DataError(format!(
            "date column holds {:?}, expected text",
            other.data_type()
        ))
        .into()),
    }
}

/// Both databases of a deployment
#[derive(Clone)]
pub struct Stores {
    pub source: SourceDatabase,
    pub metadata: MetadataStore,
}

impl Stores {
    /// Open the databases named in the configuration
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            source: SourceDatabase::open(&config.source)?,
            metadata: MetadataStore::open(&config.metadata)?,
        })
    }

    /// Two empty in-memory databases
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            source: SourceDatabase::in_memory()?,
            metadata: MetadataStore::in_memory()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_forecast(metric: &str, ts: DateTime<Utc>) -> NewForecast {
        NewForecast {
            metric_name: metric.to_string(),
            forecast_timestamp: ts,
            model: b"m".to_vec(),
            forecasts: b"f".to_vec(),
            source: b"s".to_vec(),
            hyper_parameters: serde_json::json!({"growth": "linear"}),
            components_figure: None,
        }
    }

    #[test]
    fn test_latest_forecast_wins() {
        let store = MetadataStore::in_memory().unwrap();
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();

        let first = store.insert_forecast(&new_forecast("signups", newer)).unwrap();
        let second = store.insert_forecast(&new_forecast("signups", older)).unwrap();
        assert_ne!(first, second);

        let latest = store.latest_forecast("signups").unwrap().unwrap();
        assert_eq!(latest.id, first);
        assert_eq!(latest.forecast_timestamp, newer);
        assert_eq!(latest.hyper_parameters["growth"], "linear");
        assert!(store.latest_forecast("revenue").unwrap().is_none());
        assert_eq!(store.forecast_ids("signups").unwrap(), vec![second, first]);
    }

    #[test]
    fn test_parse_date_forms() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(parse_date(Value::Text("2024-03-05".into())).unwrap(), d);
        assert_eq!(parse_date(Value::Text("2024-03-05 00:00:00".into())).unwrap(), d);
        assert!(parse_date(Value::Text("March 5".into())).is_err());
        assert!(parse_date(Value::Integer(19787)).is_err());
    }
}
