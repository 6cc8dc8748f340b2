//! Pipeline orchestrator
//!
//! Drives one run of the taxi-zone flow against a `DataPlatformClient`:
//!
//! 1. CreateBranch      - (re)create the working branch from the base ref
//! 2. ImportSource      - create + import the zone lookup table
//! 3. RunTransformations - run the project on the branch
//! 4. VerifyOutput      - the output table must have rows
//! 5. MergeAndCleanup   - merge into the base ref, delete the branch
//!
//! Stages run strictly in order, none is retried, and nothing is undone when a
//! later stage fails: a failed run leaves its branch behind for inspection.

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use contracts::{LakeflowSettings, DEFAULT_BASE_REF, DEFAULT_NAMESPACE};
use datafusion::arrow::array::{Array, Int64Array};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::DataType;
use datafusion::arrow::record_batch::RecordBatch;
use platform::DataPlatformClient;
use tracing::{error, info, instrument, warn};

use crate::error::{OrchestrationError, Result, Stage};
use crate::report::RunReport;

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Branch created from and merged into
    pub base_ref: String,
    /// Table the source URI is imported into
    pub source_table: String,
    /// Project directory handed to `run_pipeline`
    pub project_dir: PathBuf,
    /// Table checked by VerifyOutput
    pub output_table: String,
    /// Namespace of the output table
    pub namespace: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_ref: DEFAULT_BASE_REF.to_string(),
            source_table: "taxi_metadata".to_string(),
            project_dir: PathBuf::from("pipelines/taxi_zones"),
            output_table: "my_child".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &LakeflowSettings) -> Self {
        Self {
            base_ref: settings.platform.base_ref.clone(),
            source_table: settings.pipeline.source_table.clone(),
            project_dir: settings.pipeline.project_dir.clone(),
            output_table: settings.pipeline.output_table.clone(),
            namespace: settings.platform.namespace.clone(),
        }
    }
}

/// Main pipeline orchestrator
pub struct PipelineOrchestrator<'a, C> {
    client: &'a C,
    config: OrchestratorConfig,
}

impl<'a, C: DataPlatformClient> PipelineOrchestrator<'a, C> {
    pub fn new(client: &'a C, config: OrchestratorConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run the full flow on `branch_name`, importing `source_uri`
    ///
    /// # Errors
    /// - `BranchPrefix` before any mutating call
    /// - `Stage` / `Assertion` naming the stage that failed
    #[instrument(name = "orchestrator_run", skip(self, source_uri), fields(branch = %branch_name))]
    pub async fn run(&self, branch_name: &str, source_uri: &str) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::new(branch_name, &self.config.output_table);
        info!(
            started_at = %report.started_at.to_rfc3339(),
            source_uri,
            "Starting transformation flow"
        );

        let result = self.run_stages(branch_name, source_uri, &mut report).await;
        let success = result.is_ok();
        report.finish();
        observability::record_run(success, started.elapsed());

        match result {
            Ok(()) => {
                info!(
                    finished_at = %Local::now().to_rfc3339(),
                    job_id = report.job_id.as_deref().unwrap_or("-"),
                    "All done, see you, space cowboy"
                );
                Ok(report)
            }
            Err(e) => {
                error!(
                    stage = e.stage().map(Stage::as_str).unwrap_or("-"),
                    error = %e,
                    "Transformation flow failed, branch left as is"
                );
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        branch: &str,
        source_uri: &str,
        report: &mut RunReport,
    ) -> Result<()> {
        self.timed(Stage::Preflight, report, self.check_branch_prefix(branch))
            .await?;
        self.timed(Stage::CreateBranch, report, self.create_branch(branch))
            .await?;
        self.timed(
            Stage::ImportSource,
            report,
            self.import_source(branch, source_uri),
        )
        .await?;

        let (job_id, materialized) = self
            .timed(
                Stage::RunTransformations,
                report,
                self.execute_project(branch),
            )
            .await?;
        report.job_id = Some(job_id);
        report.materialized = materialized;

        let rows = self
            .timed(Stage::VerifyOutput, report, self.count_output(branch))
            .await?;
        report.output_rows = Some(rows);

        self.timed(Stage::MergeAndCleanup, report, self.merge_and_cleanup(branch))
            .await?;
        Ok(())
    }

    /// Await `stage`, recording its duration and outcome
    async fn timed<T>(
        &self,
        stage: Stage,
        report: &mut RunReport,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = fut.await;
        let elapsed = started.elapsed();
        let success = result.is_ok();

        observability::record_stage(stage.as_str(), success, elapsed);
        report.record_stage(stage, elapsed, success);
        if success {
            info!(
                stage = stage.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                "stage completed"
            );
        }
        result
    }

    /// The branch must start with the caller's username and differ from the base ref
    ///
    /// Only `current_user` is called; nothing is mutated.
    pub async fn check_branch_prefix(&self, branch: &str) -> Result<()> {
        let user = self
            .client
            .current_user()
            .await
            .map_err(OrchestrationError::at(Stage::Preflight))?;
        if user.username.trim().is_empty() {
            return Err(OrchestrationError::assertion(
                Stage::Preflight,
                "platform reported an empty username",
            ));
        }
        if branch == self.config.base_ref {
            return Err(OrchestrationError::BaseBranch {
                branch: branch.to_string(),
            });
        }
        if !branch.starts_with(&user.username) {
            return Err(OrchestrationError::BranchPrefix {
                branch: branch.to_string(),
                username: user.username,
            });
        }
        Ok(())
    }

    /// Create a fresh branch from the base ref, deleting a stale one first
    pub async fn create_branch(&self, branch: &str) -> Result<bool> {
        let at = || OrchestrationError::at(Stage::CreateBranch);

        if self.client.branch_exists(branch).await.map_err(at())? {
            warn!(branch, "Branch exists, deleting it first");
            self.client.delete_branch(branch).await.map_err(at())?;
        }

        info!(branch, from_ref = %self.config.base_ref, "Creating branch");
        self.client
            .create_branch(branch, &self.config.base_ref)
            .await
            .map_err(at())?;

        if !self.client.branch_exists(branch).await.map_err(at())? {
            return Err(OrchestrationError::assertion(
                Stage::CreateBranch,
                format!("branch {branch} does not exist after creation"),
            ));
        }
        Ok(true)
    }

    /// Create the source table (replace) and import `source_uri` into it
    pub async fn import_source(&self, branch: &str, source_uri: &str) -> Result<bool> {
        let at = || OrchestrationError::at(Stage::ImportSource);
        let table = &self.config.source_table;

        info!(table = %table, source_uri, "Creating table");
        self.client
            .create_table(table, source_uri, branch, true)
            .await
            .map_err(at())?;

        info!(table = %table, "Importing data");
        self.client
            .import_data(table, source_uri, branch)
            .await
            .map_err(at())?;
        Ok(true)
    }

    /// Run the project on `branch`; the job must succeed and carry an id
    pub async fn run_transformations(&self, branch: &str) -> Result<bool> {
        self.execute_project(branch).await.map(|_| true)
    }

    async fn execute_project(
        &self,
        branch: &str,
    ) -> Result<(String, Vec<contracts::MaterializedModel>)> {
        let project_dir = &self.config.project_dir;
        info!(project_dir = %project_dir.display(), branch, "Running pipeline");

        let state = self
            .client
            .run_pipeline(project_dir, branch)
            .await
            .map_err(OrchestrationError::at(Stage::RunTransformations))?;
        info!(
            job_id = state.job_id.as_deref().unwrap_or("-"),
            job_status = %state.job_status,
            "Run completed"
        );

        if !state.job_status.is_success() {
            let detail = state.error.as_deref().unwrap_or("no error reported");
            return Err(OrchestrationError::assertion(
                Stage::RunTransformations,
                format!("job finished with status {}: {detail}", state.job_status),
            ));
        }
        let job_id = state.job_id.ok_or_else(|| {
            OrchestrationError::assertion(Stage::RunTransformations, "run returned no job id")
        })?;
        Ok((job_id, state.materialized))
    }

    /// The output table must have at least one row
    ///
    /// Returns `true` for any count of one or more.
    pub async fn verify_output(&self, branch: &str) -> Result<bool> {
        self.count_output(branch).await.map(|count| count > 0)
    }

    async fn count_output(&self, branch: &str) -> Result<u64> {
        let table = &self.config.output_table;
        info!(table = %table, "Verifying table has data");

        let sql = format!("SELECT COUNT(*) AS cnt FROM {table}");
        let result = self
            .client
            .query(&sql, branch, Some(&self.config.namespace))
            .await;
        observability::record_query(
            "verify",
            result.is_ok(),
            result.as_ref().map(|b| b.num_rows()).unwrap_or(0),
        );
        let batch = result.map_err(OrchestrationError::at(Stage::VerifyOutput))?;

        let count = first_count(&batch).map_err(|message| {
            OrchestrationError::assertion(Stage::VerifyOutput, message)
        })?;
        info!(table = %table, count, "Row count");
        if count == 0 {
            return Err(OrchestrationError::assertion(
                Stage::VerifyOutput,
                format!("Table {table} is empty!"),
            ));
        }
        observability::record_output_rows(table, count);
        Ok(count)
    }

    /// Merge the branch into the base ref, then delete it
    ///
    /// A failed delete leaves the branch merged but still present.
    pub async fn merge_and_cleanup(&self, branch: &str) -> Result<bool> {
        let at = || OrchestrationError::at(Stage::MergeAndCleanup);
        let base = &self.config.base_ref;

        info!(branch, into = %base, "Merging branch");
        self.client.merge_branch(branch, base).await.map_err(at())?;

        info!(branch, "Deleting branch");
        self.client.delete_branch(branch).await.map_err(at())?;
        Ok(true)
    }
}

/// Read `cnt` from the first row of a count query
fn first_count(batch: &RecordBatch) -> std::result::Result<u64, String> {
    if batch.num_rows() == 0 {
        return Err("count query returned no rows".to_string());
    }
    let column = batch
        .column_by_name("cnt")
        .ok_or_else(|| "count query returned no `cnt` column".to_string())?;
    let column = cast(column, &DataType::Int64).map_err(|e| e.to_string())?;
    let counts = column
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| "`cnt` is not an integer column".to_string())?;
    if counts.is_null(0) {
        return Ok(0);
    }
    Ok(counts.value(0).max(0) as u64)
}
