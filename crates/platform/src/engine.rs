//! SQL engine over a branch snapshot
//!
//! Every query gets a fresh DataFusion session with the visible tables
//! registered under their bare names. Identifier normalization is off, so
//! `Borough` and `DOLocationID` resolve exactly as written.

use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::prelude::{SessionConfig, SessionContext};
use tracing::{debug, instrument};

use contracts::ModelInput;

use crate::error::Result;

/// Stateless SQL executor
#[derive(Debug, Clone, Default)]
pub struct SqlEngine;

impl SqlEngine {
    pub fn new() -> Self {
        Self
    }

    fn session(&self) -> SessionContext {
        let config = SessionConfig::new()
            .set_bool("datafusion.sql_parser.enable_ident_normalization", false);
        SessionContext::new_with_config(config)
    }

    /// Run `sql` with `tables` registered, returning a single batch
    #[instrument(name = "sql_engine_query", skip(self, tables), fields(tables = tables.len()))]
    pub async fn query(&self, sql: &str, tables: Vec<(String, RecordBatch)>) -> Result<RecordBatch> {
        let ctx = self.session();
        for (name, batch) in tables {
            ctx.register_batch(name.as_str(), batch)?;
        }

        let frame = ctx.sql(sql).await?;
        let logical = frame.schema().inner().clone();
        let batches = frame.collect().await?;
        let schema = batches.first().map(|b| b.schema()).unwrap_or(logical);
        let result = concat_batches(&schema, &batches)?;
        debug!(rows = result.num_rows(), "query finished");
        Ok(result)
    }

    /// Read a model input, applying its projection and pushed-down filter
    pub async fn scan(&self, input: &ModelInput, table_name: &str, batch: RecordBatch) -> Result<RecordBatch> {
        if input.columns.is_none() && input.filter.is_none() {
            return Ok(batch);
        }
        let sql = scan_sql(input, table_name);
        self.query(&sql, vec![(table_name.to_string(), batch)]).await
    }
}

/// Build `SELECT <cols> FROM <table> [WHERE <filter>]`
pub fn scan_sql(input: &ModelInput, table_name: &str) -> String {
    let projection = match &input.columns {
        Some(columns) => columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", "),
        None => "*".to_string(),
    };
    let mut sql = format!("SELECT {projection} FROM \"{table_name}\"");
    if let Some(filter) = &input.filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{Array, Float64Array, Int64Array, StringArray};
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn trips() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("pickup_datetime", DataType::Utf8, false),
            Field::new("DOLocationID", DataType::Int64, false),
            Field::new("trip_miles", DataType::Float64, false),
            Field::new("extra", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![
                    "2023-03-14T23:00:00-05:00",
                    "2023-03-15T00:00:00-05:00",
                    "2023-03-31T23:59:59-05:00",
                    "2023-04-01T00:00:00-05:00",
                ])),
                Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
                Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0])),
                Arc::new(StringArray::from(vec![None::<&str>, None, None, None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_scan_sql() {
        let input = ModelInput::table("trips", "taxi_fhvhv")
            .with_columns(["DOLocationID", "trip_miles"])
            .with_filter("trip_miles > 0");
        assert_eq!(
            scan_sql(&input, "taxi_fhvhv"),
            "SELECT \"DOLocationID\", \"trip_miles\" FROM \"taxi_fhvhv\" WHERE trip_miles > 0"
        );
        assert_eq!(
            scan_sql(&ModelInput::table("zones", "taxi_metadata"), "taxi_metadata"),
            "SELECT * FROM \"taxi_metadata\""
        );
    }

    #[tokio::test]
    async fn test_scan_applies_half_open_window() {
        let input = ModelInput::table("trips", "taxi_fhvhv")
            .with_columns(["pickup_datetime", "DOLocationID", "trip_miles"])
            .with_filter(
                "pickup_datetime >= '2023-03-15T00:00:00-05:00' \
                 AND pickup_datetime < '2023-04-01T00:00:00-05:00'",
            );

        let scanned = SqlEngine::new()
            .scan(&input, "taxi_fhvhv", trips())
            .await
            .unwrap();
        assert_eq!(scanned.num_columns(), 3);
        let ids = scanned
            .column_by_name("DOLocationID")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap()
            .clone();
        assert_eq!(ids.values().to_vec(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_mixed_case_identifiers_resolve() {
        let result = SqlEngine::new()
            .query(
                "SELECT COUNT(*) AS cnt FROM taxi_fhvhv WHERE DOLocationID > 1",
                vec![("taxi_fhvhv".to_string(), trips())],
            )
            .await
            .unwrap();
        let cnt = result
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(cnt.len(), 1);
        assert_eq!(cnt.value(0), 3);
    }

    #[tokio::test]
    async fn test_unknown_table_is_error() {
        let result = SqlEngine::new().query("SELECT * FROM missing", vec![]).await;
        assert!(result.is_err());
    }
}
