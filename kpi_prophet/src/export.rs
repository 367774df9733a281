//! CSV export of stored predictions

use crate::codec::{self, PayloadKind};
use crate::config::normalize_metric_name;
use crate::error::Result;
use crate::store::MetadataStore;
use chrono::NaiveDate;
use kpi_forecast::ForecastRow;
use serde::Serialize;
use std::io;

#[derive(Debug, Serialize)]
struct CsvRow {
    ds: NaiveDate,
    yhat: f64,
    yhat_lower: f64,
    yhat_upper: f64,
}

/// Prediction rows of the latest run of a metric, if any
pub fn latest_forecast_rows(store: &MetadataStore, metric_name: &str) -> Result<Option<Vec<ForecastRow>>> {
    store
        .latest_forecast(&normalize_metric_name(metric_name))?
        .map(|record| codec::decode(PayloadKind::ForecastTable, &record.forecasts))
        .transpose()
}

/// Write `ds,yhat,yhat_lower,yhat_upper` rows with a header line
pub fn write_forecast_csv<W: io::Write>(rows: &[ForecastRow], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for row in rows {
        out.serialize(CsvRow {
            ds: row.ds,
            yhat: row.yhat,
            yhat_lower: row.yhat_lower,
            yhat_upper: row.yhat_upper,
        })?;
    }
    out.flush()?;
    Ok(())
}

/// [`write_forecast_csv`] into memory
pub fn forecast_csv(rows: &[ForecastRow]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_forecast_csv(rows, &mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn test_csv_layout() {
        let row = ForecastRow {
            ds: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            trend: 1.0,
            trend_lower: 1.0,
            trend_upper: 1.0,
            yhat: 12.5,
            yhat_lower: 10.0,
            yhat_upper: 15.0,
            additive_terms: 0.0,
            multiplicative_terms: 0.0,
            holidays: 0.0,
            seasonal: BTreeMap::new(),
        };

        let text = String::from_utf8(forecast_csv(&[row]).unwrap()).unwrap();
        assert_eq!(text, "ds,yhat,yhat_lower,yhat_upper\n2024-02-01,12.5,10.0,15.0\n");
    }

    #[test]
    fn test_empty_table_has_no_header() {
        assert!(forecast_csv(&[]).unwrap().is_empty());
    }
}
