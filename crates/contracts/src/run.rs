//! Pipeline run state and caller identity

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failed,
}

impl JobStatus {
    /// Parse a platform status string, case-insensitively
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "success" => Some(Self::Success),
            "failed" | "failure" | "fail" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a single `run_pipeline` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Job identifier assigned by the platform
    pub job_id: Option<String>,

    /// Terminal job status
    pub job_status: JobStatus,

    /// Ref the run executed against
    pub ref_name: String,

    /// Models materialized, in execution order
    #[serde(default)]
    pub materialized: Vec<MaterializedModel>,

    /// Failure description when `job_status` is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunState {
    /// Successful run with a job id
    pub fn succeeded(
        job_id: impl Into<String>,
        ref_name: impl Into<String>,
        materialized: Vec<MaterializedModel>,
    ) -> Self {
        Self {
            job_id: Some(job_id.into()),
            job_status: JobStatus::Success,
            ref_name: ref_name.into(),
            materialized,
            error: None,
        }
    }

    /// Failed run
    pub fn failed(
        job_id: impl Into<String>,
        ref_name: impl Into<String>,
        materialized: Vec<MaterializedModel>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            job_id: Some(job_id.into()),
            job_status: JobStatus::Failed,
            ref_name: ref_name.into(),
            materialized,
            error: Some(error.into()),
        }
    }
}

/// A model output written during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedModel {
    pub name: String,
    pub rows: usize,
}

/// Identity of the caller as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
}

impl UserInfo {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}
