//! # Transform
//!
//! Transformation steps for the taxi-zone project.
//!
//! Responsibilities:
//! - Keep the named pure-function registry (`StepRegistry`)
//! - Provide the join and filter steps over Arrow record batches
//! - Order manifest models by declared dependencies (`ExecutionPlan`)
//!
//! Steps never touch storage: the platform resolves their inputs and writes
//! their outputs.

pub mod error;
pub mod plan;
pub mod project;
pub mod registry;
pub mod steps;

pub use error::{Result, TransformError};
pub use plan::{ExecutionPlan, PlannedStep};
pub use project::{
    taxi_zones_manifest, CHILD_MODEL, PARENT_MODEL, PICKUP_WINDOW, TRIPS_TABLE, ZONES_TABLE,
};
pub use registry::{StepFn, StepInputs, StepRegistry};
pub use steps::{filter_positive_miles, join_trips_zones, FILTER_POSITIVE_MILES, JOIN_TRIPS_ZONES};
