mod common;

use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use common::*;
use kpi_prophet::config::DatabaseConfig;
use kpi_prophet::store::{MetadataStore, NewCrossValidation, NewForecast};
use kpi_prophet::{run_forecast, ProphetError, Stores};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn new_forecast(metric: &str, hour: u32) -> NewForecast {
    NewForecast {
        metric_name: metric.to_string(),
        forecast_timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        model: b"{}".to_vec(),
        forecasts: b"{}".to_vec(),
        source: b"{}".to_vec(),
        hyper_parameters: serde_json::json!({"growth": "linear"}),
        components_figure: None,
    }
}

#[test]
fn test_duplicate_timestamp_is_rejected() {
    let store = MetadataStore::in_memory().unwrap();

    store.insert_forecast(&new_forecast("signups", 6)).unwrap();
    let duplicate = store.insert_forecast(&new_forecast("signups", 6));

    assert!(matches!(duplicate, Err(ProphetError::Store(_))));
    store.insert_forecast(&new_forecast("revenue", 6)).unwrap();
    store.insert_forecast(&new_forecast("signups", 7)).unwrap();
}

#[test]
fn test_cross_validation_needs_forecast() {
    let store = MetadataStore::in_memory().unwrap();
    let cv = NewCrossValidation {
        forecast_id: 42,
        horizon_days: 10,
        initial_days: None,
        period_days: None,
        cross_validation_table: Vec::new(),
        metrics_table: Vec::new(),
    };

    assert!(store.insert_cross_validation(&cv).is_err());
    assert_eq!(store.cross_validation_count().unwrap(), 0);
}

#[test]
fn test_records_survive_reopening() {
    let dir = tempdir().unwrap();
    let database = DatabaseConfig {
        source: dir.path().join("dwh.sqlite"),
        metadata: dir.path().join("forecasts.sqlite"),
        forecast_table_name: None,
    };

    let id = {
        let stores = Stores::open(&database).unwrap();
        seed_signups(&stores, 60);
        let mut config = config(vec![signups_definition()], None);
        config.database = database.clone();
        run_forecast(&config, &stores, "Signups").unwrap().unwrap()
    };

    let reopened = Stores::open(&database).unwrap();
    let record = reopened.metadata.latest_forecast("signups").unwrap().unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.hyper_parameters["growth"], "linear");
    assert_eq!(reopened.metadata.forecast_ids("signups").unwrap(), vec![id]);
}

#[test]
fn test_read_time_series_skips_null_values() {
    let stores = Stores::in_memory().unwrap();
    stores
        .source
        .execute_batch(
            "CREATE TABLE t (ds TEXT, y REAL);
             INSERT INTO t VALUES ('2024-01-02', 2.5), ('2024-01-01', NULL), ('2024-01-03 00:00:00', '4');",
        )
        .unwrap();

    let rows = stores.source.read_time_series("SELECT ds, y FROM t").unwrap();

    assert_eq!(rows.len(), 2);
    assert_relative_eq!(rows[0].1, 2.5);
    assert_eq!(rows[1].0, chrono::NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    assert_relative_eq!(rows[1].1, 4.0);
}

#[test]
fn test_single_column_query_is_rejected() {
    let stores = Stores::in_memory().unwrap();
    let result = stores.source.read_time_series("SELECT 1");
    assert!(matches!(result, Err(ProphetError::Config(_))));
}
