//! Taxi-zone transformation steps
//!
//! - `join_trips_zones`: inner join of trips to zone metadata on
//!   `trips.DOLocationID = zones.LocationID`
//! - `filter_positive_miles`: keep rows with `trip_miles > 0.0`
//!
//! Both are pure: output depends only on the input batches, and row order
//! follows the left/probe side.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use datafusion::arrow::array::{Array, ArrayRef, Float64Array, Int64Array, UInt64Array};
use datafusion::arrow::compute::kernels::cmp::gt;
use datafusion::arrow::compute::{cast, filter_record_batch, take};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use tracing::{debug, info};

use crate::error::{Result, TransformError};
use crate::registry::StepInputs;

pub const JOIN_TRIPS_ZONES: &str = "join_trips_zones";
pub const FILTER_POSITIVE_MILES: &str = "filter_positive_miles";

/// Join trips to zone metadata on drop-off location
///
/// Inputs: `trips`, `zones`.
pub fn join_trips_zones(inputs: &StepInputs) -> Result<RecordBatch> {
    let trips = inputs.get("trips")?;
    let zones = inputs.get("zones")?;

    let joined = inner_join(trips, zones, "DOLocationID", "LocationID")?;
    info!(
        model = inputs.model(),
        trips = trips.num_rows(),
        zones = zones.num_rows(),
        rows = joined.num_rows(),
        "joined trips to zones"
    );
    Ok(joined)
}

/// Keep trips with a strictly positive distance
///
/// Input: `my_trips`.
pub fn filter_positive_miles(inputs: &StepInputs) -> Result<RecordBatch> {
    let trips = inputs.get("my_trips")?;
    let filtered = filter_greater_than(trips, "trip_miles", 0.0)?;
    info!(
        model = inputs.model(),
        rows = filtered.num_rows(),
        "got rows after filtering"
    );
    Ok(filtered)
}

/// Hash inner join on a single integer key
///
/// All columns from both sides are kept. Right-side columns whose names
/// clash with a left column get a `_right` suffix. Null keys never match.
pub fn inner_join(
    left: &RecordBatch,
    right: &RecordBatch,
    left_on: &str,
    right_on: &str,
) -> Result<RecordBatch> {
    let left_keys = integer_keys(left, left_on, "left")?;
    let right_keys = integer_keys(right, right_on, "right")?;

    // build side: right key -> row positions, in original order
    // usize fits in u64 on every supported target
    let mut build: HashMap<i64, Vec<u64>> = HashMap::with_capacity(right_keys.len());
    for (row, key) in right_keys.iter().enumerate() {
        if let Some(key) = key {
            build.entry(key).or_default().push(row as u64);
        }
    }

    let mut left_idx = Vec::new();
    let mut right_idx = Vec::new();
    for (row, key) in left_keys.iter().enumerate() {
        let Some(key) = key else { continue };
        if let Some(matches) = build.get(&key) {
            for &r in matches {
                left_idx.push(row as u64);
                right_idx.push(r);
            }
        }
    }
    debug!(
        left_rows = left.num_rows(),
        right_rows = right.num_rows(),
        matched = left_idx.len(),
        "hash join probe finished"
    );

    let left_idx = UInt64Array::from(left_idx);
    let right_idx = UInt64Array::from(right_idx);

    let left_names: HashSet<&str> = left
        .schema_ref()
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();

    let mut fields: Vec<Field> = Vec::with_capacity(left.num_columns() + right.num_columns());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

    for (field, column) in left.schema_ref().fields().iter().zip(left.columns()) {
        fields.push(field.as_ref().clone());
        columns.push(take(column.as_ref(), &left_idx, None)?);
    }
    for (field, column) in right.schema_ref().fields().iter().zip(right.columns()) {
        let field = if left_names.contains(field.name().as_str()) {
            let renamed = format!("{}_right", field.name());
            field.as_ref().clone().with_name(renamed)
        } else {
            field.as_ref().clone()
        };
        fields.push(field);
        columns.push(take(column.as_ref(), &right_idx, None)?);
    }

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}

/// Keep rows where `column > threshold`; nulls are dropped
pub fn filter_greater_than(batch: &RecordBatch, column: &str, threshold: f64) -> Result<RecordBatch> {
    let values = batch
        .column_by_name(column)
        .ok_or_else(|| TransformError::missing_column(column, "batch"))?;
    if !values.data_type().is_numeric() {
        return Err(TransformError::UnsupportedType {
            column: column.to_string(),
            data_type: values.data_type().clone(),
        });
    }

    let values = cast(values, &DataType::Float64)?;
    let mask = gt(&values, &Float64Array::new_scalar(threshold))?;
    Ok(filter_record_batch(batch, &mask)?)
}

/// Extract a join key column as `Int64`
fn integer_keys(batch: &RecordBatch, column: &str, side: &str) -> Result<Int64Array> {
    let keys = batch
        .column_by_name(column)
        .ok_or_else(|| TransformError::missing_column(column, side))?;
    if !keys.data_type().is_integer() {
        return Err(TransformError::UnsupportedType {
            column: column.to_string(),
            data_type: keys.data_type().clone(),
        });
    }

    let data_type = keys.data_type().clone();
    let keys = cast(keys, &DataType::Int64)?;
    keys.as_any()
        .downcast_ref::<Int64Array>()
        .cloned()
        .ok_or_else(|| TransformError::UnsupportedType {
            column: column.to_string(),
            data_type,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{Int32Array, StringArray};

    fn trips(ids: Vec<Option<i64>>, miles: Vec<Option<f64>>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("DOLocationID", DataType::Int64, true),
            Field::new("trip_miles", DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(Float64Array::from(miles)),
            ],
        )
        .unwrap()
    }

    fn zones(ids: Vec<i32>, boroughs: Vec<&str>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("LocationID", DataType::Int32, false),
            Field::new("Borough", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(ids)),
                Arc::new(StringArray::from(boroughs)),
            ],
        )
        .unwrap()
    }

    fn strings(batch: &RecordBatch, column: &str) -> Vec<String> {
        let array = batch.column_by_name(column).unwrap();
        let array = array.as_any().downcast_ref::<StringArray>().unwrap();
        array.iter().map(|v| v.unwrap_or_default().to_string()).collect()
    }

    fn floats(batch: &RecordBatch, column: &str) -> Vec<f64> {
        let array = batch.column_by_name(column).unwrap();
        let array = array.as_any().downcast_ref::<Float64Array>().unwrap();
        array.iter().map(|v| v.unwrap()).collect()
    }

    #[test]
    fn test_join_keeps_all_columns() {
        let inputs = StepInputs::new("my_parent")
            .with("trips", trips(vec![Some(1), Some(2)], vec![Some(5.0), Some(-1.0)]))
            .with("zones", zones(vec![1, 2], vec!["Manhattan", "Bronx"]));

        let joined = join_trips_zones(&inputs).unwrap();
        assert_eq!(joined.num_rows(), 2);

        let names: Vec<_> = joined
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(
            names,
            vec!["DOLocationID", "trip_miles", "LocationID", "Borough"]
        );
        assert_eq!(strings(&joined, "Borough"), vec!["Manhattan", "Bronx"]);
    }

    #[test]
    fn test_join_drops_unmatched_and_null_keys() {
        let inputs = StepInputs::new("my_parent")
            .with(
                "trips",
                trips(
                    vec![Some(1), Some(7), None, Some(1)],
                    vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
                ),
            )
            .with("zones", zones(vec![1, 2], vec!["Manhattan", "Bronx"]));

        let joined = join_trips_zones(&inputs).unwrap();
        assert_eq!(joined.num_rows(), 2);
        assert!(joined.num_rows() <= 4);
        assert_eq!(floats(&joined, "trip_miles"), vec![1.0, 4.0]);
    }

    #[test]
    fn test_join_duplicate_build_keys_fan_out() {
        let inputs = StepInputs::new("my_parent")
            .with("trips", trips(vec![Some(1)], vec![Some(1.0)]))
            .with("zones", zones(vec![1, 1], vec!["A", "B"]));

        let joined = join_trips_zones(&inputs).unwrap();
        assert_eq!(strings(&joined, "Borough"), vec!["A", "B"]);
    }

    #[test]
    fn test_join_pairs_rows_in_probe_order() {
        let inputs = StepInputs::new("my_parent")
            .with(
                "trips",
                trips(
                    vec![Some(2), Some(1), Some(2), Some(3)],
                    vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
                ),
            )
            .with("zones", zones(vec![1, 2, 3], vec!["Manhattan", "Bronx", "Queens"]));

        let joined = join_trips_zones(&inputs).unwrap();
        assert_eq!(floats(&joined, "trip_miles"), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            strings(&joined, "Borough"),
            vec!["Bronx", "Manhattan", "Bronx", "Queens"]
        );
    }

    #[test]
    fn test_join_renames_clashing_right_columns() {
        let left = trips(vec![Some(1)], vec![Some(1.0)]);
        let right = trips(vec![Some(1)], vec![Some(9.0)]);
        let joined = inner_join(&left, &right, "DOLocationID", "DOLocationID").unwrap();
        assert!(joined.column_by_name("trip_miles_right").is_some());
        assert_eq!(floats(&joined, "trip_miles_right"), vec![9.0]);
    }

    #[test]
    fn test_join_rejects_string_keys() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "DOLocationID",
            DataType::Utf8,
            false,
        )]));
        let left =
            RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["1"]))]).unwrap();
        let right = zones(vec![1], vec!["Manhattan"]);
        let err = inner_join(&left, &right, "DOLocationID", "LocationID").unwrap_err();
        assert!(matches!(err, TransformError::UnsupportedType { .. }));
    }

    #[test]
    fn test_join_missing_key_column() {
        let inputs = StepInputs::new("my_parent")
            .with("trips", zones(vec![1], vec!["x"]))
            .with("zones", zones(vec![1], vec!["Manhattan"]));
        let err = join_trips_zones(&inputs).unwrap_err();
        assert!(matches!(err, TransformError::MissingColumn { .. }));
    }

    #[test]
    fn test_filter_positive_miles() {
        let input = trips(
            vec![Some(1), Some(2), Some(3), Some(4)],
            vec![Some(5.0), Some(-1.0), Some(0.0), None],
        );
        let inputs = StepInputs::new("my_child").with("my_trips", input.clone());

        let filtered = filter_positive_miles(&inputs).unwrap();
        let miles = floats(&filtered, "trip_miles");
        assert_eq!(miles, vec![5.0]);
        assert!(miles.iter().all(|m| *m > 0.0));
        assert_eq!(filtered.schema(), input.schema());
    }

    #[test]
    fn test_filter_is_deterministic() {
        let input = trips(vec![Some(1), Some(2)], vec![Some(2.5), Some(3.5)]);
        let inputs = StepInputs::new("my_child").with("my_trips", input);
        let a = filter_positive_miles(&inputs).unwrap();
        let b = filter_positive_miles(&inputs).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_filter_requires_numeric_column() {
        let batch = zones(vec![1], vec!["Manhattan"]);
        let err = filter_greater_than(&batch, "Borough", 0.0).unwrap_err();
        assert!(matches!(err, TransformError::UnsupportedType { .. }));
    }
}
