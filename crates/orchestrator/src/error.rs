//! Orchestration error types

use std::fmt;

use platform::PlatformError;
use serde::Serialize;
use thiserror::Error;

/// Stages of a pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Identity lookup and branch-name check
    Preflight,
    CreateBranch,
    ImportSource,
    RunTransformations,
    VerifyOutput,
    MergeAndCleanup,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Preflight,
        Stage::CreateBranch,
        Stage::ImportSource,
        Stage::RunTransformations,
        Stage::VerifyOutput,
        Stage::MergeAndCleanup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Preflight => "preflight",
            Stage::CreateBranch => "create_branch",
            Stage::ImportSource => "import_source",
            Stage::RunTransformations => "run_transformations",
            Stage::VerifyOutput => "verify_output",
            Stage::MergeAndCleanup => "merge_and_cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestration errors
#[derive(Error, Debug)]
pub enum OrchestrationError {
    /// Branch name does not start with the caller's username
    #[error("Branch name must start with your username: {username} (got '{branch}')")]
    BranchPrefix { branch: String, username: String },

    /// Branch name is the base ref the run would merge into
    #[error("Branch name must not be the base ref '{branch}'")]
    BaseBranch { branch: String },

    /// A platform call failed during a stage
    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: PlatformError,
    },

    /// A platform call succeeded but its effect was not observed
    #[error("stage {stage} assertion failed: {message}")]
    Assertion { stage: Stage, message: String },

    /// No source URI was given and the environment variable is unset
    #[error("source URI missing: set {variable} in the environment or .env")]
    MissingSource { variable: String },
}

impl OrchestrationError {
    /// Wrap a platform error raised during `stage`
    pub fn at(stage: Stage) -> impl FnOnce(PlatformError) -> Self {
        move |source| Self::Stage { stage, source }
    }

    pub fn assertion(stage: Stage, message: impl Into<String>) -> Self {
        Self::Assertion {
            stage,
            message: message.into(),
        }
    }

    /// Stage the error belongs to; `None` for errors raised before any stage
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } | Self::Assertion { stage, .. } => Some(*stage),
            Self::BranchPrefix { .. } | Self::BaseBranch { .. } => Some(Stage::Preflight),
            Self::MissingSource { .. } => None,
        }
    }
}

/// Result type alias for orchestration
pub type Result<T> = std::result::Result<T, OrchestrationError>;
