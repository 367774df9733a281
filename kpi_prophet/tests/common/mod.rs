#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use kpi_prophet::config::DatabaseConfig;
use kpi_prophet::{ForecastDefinition, ProphetConfig, Stores};
use std::fmt::Write;
use std::path::PathBuf;

pub const SIGNUPS_QUERY: &str = "SELECT day AS ds, n AS y FROM signups ORDER BY 1 DESC";

pub fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

/// `days` rows of a growing series with a weekly pattern
pub fn seed_signups(stores: &Stores, days: i64) {
    let mut sql = String::from("CREATE TABLE signups (day TEXT, n INTEGER);\n");
    for i in 0..days {
        let ds = start() + Duration::days(i);
        let weekly = [0, 5, 8, 6, 4, 12, 15][(i % 7) as usize];
        writeln!(sql, "INSERT INTO signups VALUES ('{}', {});", ds, 200 + i + weekly).unwrap();
    }
    stores.source.execute_batch(&sql).unwrap();
}

pub fn signups_definition() -> ForecastDefinition {
    let mut definition = ForecastDefinition::new("Signups", 30, SIGNUPS_QUERY);
    definition.uncertainty_samples = 200;
    definition
}

pub fn config(forecasts: Vec<ForecastDefinition>, forecast_table_name: Option<&str>) -> ProphetConfig {
    ProphetConfig {
        database: DatabaseConfig {
            source: PathBuf::from(":memory:"),
            metadata: PathBuf::from(":memory:"),
            forecast_table_name: forecast_table_name.map(str::to_string),
        },
        server: Default::default(),
        forecasts,
    }
}

/// In-memory stores holding 100 days of signups
pub fn signups_stores() -> Stores {
    let stores = Stores::in_memory().unwrap();
    seed_signups(&stores, 100);
    stores
}
