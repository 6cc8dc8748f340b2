//! Pipeline run execution
//!
//! Runs an `ExecutionPlan` step by step against one branch: resolve each
//! input from the branch, apply its projection/filter, call the step, and
//! replace the model's output table. The first failing step stops the run.

use contracts::{MaterializedModel, RunState, TableRef};
use datafusion::arrow::record_batch::RecordBatch;
use metrics::{counter, histogram};
use tracing::{error, info, instrument};
use transform::{ExecutionPlan, PlannedStep, StepInputs};

use crate::engine::SqlEngine;
use crate::error::{PlatformError, Result};
use crate::store::TableStore;

/// Executes plans against a store
pub struct PipelineRunner<'a, S: TableStore> {
    store: &'a S,
    engine: &'a SqlEngine,
    namespace: &'a str,
}

impl<'a, S: TableStore> PipelineRunner<'a, S> {
    pub fn new(store: &'a S, engine: &'a SqlEngine, namespace: &'a str) -> Self {
        Self {
            store,
            engine,
            namespace,
        }
    }

    /// Run every step of `plan` on `branch`
    ///
    /// Returns `Err` only when the branch is missing; step failures yield a
    /// failed `RunState` that still lists the models written before the failure.
    #[instrument(
        name = "pipeline_runner_execute",
        skip(self, plan),
        fields(project = plan.project(), steps = plan.steps().len())
    )]
    pub async fn execute(&self, plan: &ExecutionPlan, branch: &str, job_id: &str) -> Result<RunState> {
        if !self.store.branch_exists(branch)? {
            return Err(PlatformError::branch_not_found(branch));
        }

        let mut materialized = Vec::with_capacity(plan.steps().len());
        for step in plan.steps() {
            match self.execute_step(step, branch).await {
                Ok(rows) => {
                    counter!("lakeflow_models_materialized_total", "model" => step.name().to_string())
                        .increment(1);
                    histogram!("lakeflow_model_rows").record(rows as f64);
                    materialized.push(MaterializedModel {
                        name: step.name().to_string(),
                        rows,
                    });
                }
                Err(e) => {
                    error!(model = step.name(), error = %e, "step failed, stopping run");
                    counter!("lakeflow_model_failures_total", "model" => step.name().to_string())
                        .increment(1);
                    return Ok(RunState::failed(
                        job_id,
                        branch,
                        materialized,
                        format!("model '{}' failed: {e}", step.name()),
                    ));
                }
            }
        }

        info!(models = materialized.len(), "run completed");
        Ok(RunState::succeeded(job_id, branch, materialized))
    }

    #[instrument(name = "pipeline_runner_step", skip(self, step), fields(model = step.name()))]
    async fn execute_step(&self, step: &PlannedStep, branch: &str) -> Result<usize> {
        let mut inputs = StepInputs::new(step.name());
        for input in &step.model.inputs {
            let table = TableRef::parse(&input.table, self.namespace)?;
            let batch = self.read(branch, &table)?;
            let batch = self.engine.scan(input, &table.name, batch).await?;
            info!(param = %input.param, table = %table, rows = batch.num_rows(), "input resolved");
            inputs.insert(input.param.clone(), batch);
        }

        let output = (step.function)(&inputs)?;
        let target = TableRef::new(self.namespace, step.name());
        // replace materialization: the previous output is overwritten wholesale
        self.store.write_table(branch, &target, &output)?;
        info!(table = %target, rows = output.num_rows(), "model materialized");
        Ok(output.num_rows())
    }

    fn read(&self, branch: &str, table: &TableRef) -> Result<RecordBatch> {
        self.store
            .read_table(branch, table)?
            .ok_or_else(|| PlatformError::table_not_found(table, branch))
    }
}
