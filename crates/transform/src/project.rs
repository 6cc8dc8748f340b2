//! Taxi-zone project definition
//!
//! The same models `pipelines/taxi_zones/pipeline.toml` declares, built in
//! code so tests and the mock platform can run the project without a
//! project directory.

use contracts::{Materialization, ModelInput, ModelSpec, ProjectInfo, ProjectManifest};

use crate::steps::{FILTER_POSITIVE_MILES, JOIN_TRIPS_ZONES};

pub const PROJECT_NAME: &str = "taxi_zones";

/// Trip table, pre-existing on the base ref
pub const TRIPS_TABLE: &str = "taxi_fhvhv";
/// Zone lookup table imported by each run
pub const ZONES_TABLE: &str = "taxi_metadata";
pub const PARENT_MODEL: &str = "my_parent";
pub const CHILD_MODEL: &str = "my_child";

/// Columns read from the trip table
pub const TRIP_COLUMNS: [&str; 4] = ["pickup_datetime", "PULocationID", "DOLocationID", "trip_miles"];

/// Half-open pickup window applied to the trip table
pub const PICKUP_WINDOW: &str = "pickup_datetime >= '2023-03-15T00:00:00-05:00' \
     AND pickup_datetime < '2023-04-01T00:00:00-05:00'";

/// Build the taxi-zone manifest
pub fn taxi_zones_manifest() -> ProjectManifest {
    ProjectManifest {
        project: ProjectInfo {
            name: PROJECT_NAME.to_string(),
            description: Some("Join FHVHV trips to zones and keep positive distances".into()),
        },
        models: vec![
            ModelSpec {
                name: PARENT_MODEL.to_string(),
                function: JOIN_TRIPS_ZONES.to_string(),
                materialization: Materialization::Replace,
                inputs: vec![
                    ModelInput::table("trips", TRIPS_TABLE)
                        .with_columns(TRIP_COLUMNS)
                        .with_filter(PICKUP_WINDOW),
                    ModelInput::table("zones", ZONES_TABLE),
                ],
            },
            ModelSpec {
                name: CHILD_MODEL.to_string(),
                function: FILTER_POSITIVE_MILES.to_string(),
                materialization: Materialization::Replace,
                inputs: vec![ModelInput::table("my_trips", PARENT_MODEL)],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutionPlan, StepRegistry};

    #[test]
    fn test_taxi_zones_plan_order() {
        let plan = ExecutionPlan::build(&taxi_zones_manifest(), &StepRegistry::builtin()).unwrap();
        let names: Vec<_> = plan.steps().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec![PARENT_MODEL, CHILD_MODEL]);
        assert_eq!(plan.steps()[1].depends_on, vec![PARENT_MODEL.to_string()]);
    }

    #[test]
    fn test_taxi_zones_source_tables() {
        let plan = ExecutionPlan::build(&taxi_zones_manifest(), &StepRegistry::builtin()).unwrap();
        let sources: Vec<_> = plan.source_tables().into_iter().collect();
        assert_eq!(sources, vec![TRIPS_TABLE, ZONES_TABLE]);
    }
}
