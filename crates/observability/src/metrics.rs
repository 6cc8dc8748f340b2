//! 编排指标收集模块
//!
//! 记录每个编排阶段、每次运行与查询的指标。

use std::time::Duration;

use metrics::{counter, gauge, histogram};

fn status(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// 记录一个编排阶段的结果与耗时
pub fn record_stage(stage: &str, success: bool, duration: Duration) {
    counter!(
        "lakeflow_stages_total",
        "stage" => stage.to_string(),
        "status" => status(success)
    )
    .increment(1);

    histogram!("lakeflow_stage_duration_ms", "stage" => stage.to_string())
        .record(duration.as_secs_f64() * 1000.0);
}

/// 记录一次完整运行
pub fn record_run(success: bool, duration: Duration) {
    counter!("lakeflow_runs_total", "status" => status(success)).increment(1);
    histogram!("lakeflow_run_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// 记录一次 SQL 查询 (`purpose`: verify / dashboard)
pub fn record_query(purpose: &str, success: bool, rows: usize) {
    counter!(
        "lakeflow_queries_total",
        "purpose" => purpose.to_string(),
        "status" => status(success)
    )
    .increment(1);

    if success {
        histogram!("lakeflow_query_rows", "purpose" => purpose.to_string()).record(rows as f64);
    }
}

/// 记录输出表的行数
pub fn record_output_rows(table: &str, rows: u64) {
    gauge!("lakeflow_output_rows", "table" => table.to_string()).set(rows as f64);
}
