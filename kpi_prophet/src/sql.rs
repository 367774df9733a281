//! Source query text for daily KPI series

use serde::{Deserialize, Serialize};

/// Parts of a daily aggregation query over one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBuilder {
    /// Schema (or attached database) holding the table
    pub schema_name: String,
    /// Table to aggregate
    pub table_name: String,
    /// Column or expression giving the date
    pub ds_column: String,
    /// Aggregate expression giving the value, e.g. `sum(amount)`
    pub y_expression: String,
    /// Optional filter predicate
    #[serde(default)]
    pub where_condition: Option<String>,
}

impl QueryBuilder {
    /// Render the query
    pub fn build(&self) -> String {
        build_time_series_query(
            &self.schema_name,
            &self.table_name,
            &self.ds_column,
            &self.y_expression,
            self.where_condition.as_deref(),
        )
    }
}

/// Query returning `(ds, y)` per date, most recent first, without zero values.
///
/// The parts are pasted in as given; they come from trusted configuration.
pub fn build_time_series_query(
    schema_name: &str,
    table_name: &str,
    ds_column: &str,
    y_expression: &str,
    where_condition: Option<&str>,
) -> String {
    format!(
        "
SELECT * FROM (
    SELECT {ds_column} AS ds,
    {y_expression} AS y
    FROM {schema_name}.{table_name}
    WHERE {condition}
    GROUP BY 1
    ORDER BY 1 DESC
) AS t
WHERE y != 0
",
        condition = where_condition.unwrap_or("1=1"),
    )
}
