//! Data platform client abstraction
//!
//! Defines the trait the orchestrator and dashboard talk to, supporting the
//! local reference platform and the mock used in tests.

use std::path::Path;

use contracts::{RunState, UserInfo};
use datafusion::arrow::record_batch::RecordBatch;

use crate::error::Result;

/// Data platform client trait
///
/// Abstracts branch lifecycle, table import, pipeline runs and queries.
#[trait_variant::make(DataPlatformClient: Send)]
pub trait LocalDataPlatformClient {
    /// Identity of the caller
    async fn current_user(&self) -> Result<UserInfo>;

    /// Check if a branch exists
    async fn branch_exists(&self, name: &str) -> Result<bool>;

    /// Create `name` from `from_ref`
    ///
    /// Fails if `name` already exists or `from_ref` does not.
    async fn create_branch(&self, name: &str, from_ref: &str) -> Result<()>;

    /// Delete a branch
    async fn delete_branch(&self, name: &str) -> Result<()>;

    /// Merge every table of `source_ref` into `into_branch` (replace per table)
    async fn merge_branch(&self, source_ref: &str, into_branch: &str) -> Result<()>;

    /// Create `table` on `branch` with the schema found at `source_uri`
    ///
    /// # Arguments
    /// * `replace` - Overwrite an existing table instead of failing
    async fn create_table(
        &self,
        table: &str,
        source_uri: &str,
        branch: &str,
        replace: bool,
    ) -> Result<()>;

    /// Append the rows found at `source_uri` to an existing table
    async fn import_data(&self, table: &str, source_uri: &str, branch: &str) -> Result<()>;

    /// Execute the project in `project_dir` against `ref_name`
    ///
    /// Step failures come back as a `RunState` with a failed status;
    /// `Err` means the run could not start.
    async fn run_pipeline(&self, project_dir: &Path, ref_name: &str) -> Result<RunState>;

    /// Run SQL against the tables of `ref_name`
    ///
    /// # Arguments
    /// * `namespace` - Namespace whose tables are visible (None = platform default)
    async fn query(
        &self,
        sql: &str,
        ref_name: &str,
        namespace: Option<&str>,
    ) -> Result<RecordBatch>;
}

/// Operations of the client contract, used for call logs and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformOp {
    CurrentUser,
    BranchExists,
    CreateBranch,
    DeleteBranch,
    MergeBranch,
    CreateTable,
    ImportData,
    RunPipeline,
    Query,
}

impl PlatformOp {
    /// Whether the operation can change platform state
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::CreateBranch
                | Self::DeleteBranch
                | Self::MergeBranch
                | Self::CreateTable
                | Self::ImportData
                | Self::RunPipeline
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CurrentUser => "current_user",
            Self::BranchExists => "branch_exists",
            Self::CreateBranch => "create_branch",
            Self::DeleteBranch => "delete_branch",
            Self::MergeBranch => "merge_branch",
            Self::CreateTable => "create_table",
            Self::ImportData => "import_data",
            Self::RunPipeline => "run_pipeline",
            Self::Query => "query",
        }
    }
}
