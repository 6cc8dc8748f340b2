//! # Orchestrator
//!
//! 编排与展示模块。
//!
//! Responsibilities:
//! - Sequence the five stages of a pipeline run (`PipelineOrchestrator`)
//! - Report per-stage timings (`RunReport`)
//! - Query and render the borough dashboard (`Dashboard`)
//!
//! Both entry points only talk to a `DataPlatformClient` handed in by the
//! caller.

pub mod dashboard;
pub mod error;
pub mod pipeline;
pub mod report;

pub use dashboard::{
    dashboard_branch, dashboard_query, failure_hint, render, to_json, BoroughMiles, Dashboard,
    DashboardOutcome,
};
pub use error::{OrchestrationError, Result, Stage};
pub use pipeline::{OrchestratorConfig, PipelineOrchestrator};
pub use report::{RunReport, StageTiming};
