//! Run report

use std::time::Duration;

use chrono::{DateTime, Local};
use contracts::MaterializedModel;

use crate::error::Stage;

/// Timing of one stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration: Duration,
    pub success: bool,
}

/// Outcome of a successful `PipelineOrchestrator::run`
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Branch the run worked on
    pub branch: String,

    /// Job id reported by the platform
    pub job_id: Option<String>,

    /// Table checked by VerifyOutput
    pub output_table: String,

    /// Row count seen by VerifyOutput
    pub output_rows: Option<u64>,

    /// Models written by the platform run
    pub materialized: Vec<MaterializedModel>,

    /// Per-stage timings, in execution order
    pub stages: Vec<StageTiming>,

    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
}

impl RunReport {
    pub fn new(branch: impl Into<String>, output_table: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            job_id: None,
            output_table: output_table.into(),
            output_rows: None,
            materialized: Vec::new(),
            stages: Vec::new(),
            started_at: Local::now(),
            finished_at: None,
        }
    }

    pub(crate) fn record_stage(&mut self, stage: Stage, duration: Duration, success: bool) {
        self.stages.push(StageTiming {
            stage,
            duration,
            success,
        });
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    /// Sum of stage durations
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageTiming> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Run ===\n");
        println!("Overview");
        println!("   ├─ Branch: {}", self.branch);
        println!("   ├─ Job: {}", self.job_id.as_deref().unwrap_or("-"));
        match self.output_rows {
            Some(rows) => println!("   ├─ {}: {} rows", self.output_table, rows),
            None => println!("   ├─ {}: not verified", self.output_table),
        }
        println!("   ├─ Started: {}", self.started_at.format("%Y-%m-%d %H:%M:%S"));
        println!("   └─ Duration: {:.2}s", self.total_duration().as_secs_f64());

        if !self.materialized.is_empty() {
            println!("\nModels");
            let last = self.materialized.len() - 1;
            for (i, model) in self.materialized.iter().enumerate() {
                let branch = if i == last { "└─" } else { "├─" };
                println!("   {} {}: {} rows", branch, model.name, model.rows);
            }
        }

        println!("\nStages");
        let last = self.stages.len().saturating_sub(1);
        for (i, timing) in self.stages.iter().enumerate() {
            let branch = if i == last { "└─" } else { "├─" };
            let mark = if timing.success { "ok" } else { "FAILED" };
            println!(
                "   {} {:<20} {:>8.1} ms  {}",
                branch,
                timing.stage.as_str(),
                timing.duration.as_secs_f64() * 1000.0,
                mark
            );
        }

        println!();
    }
}
