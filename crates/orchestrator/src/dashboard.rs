//! Terminal dashboard
//!
//! 查询 `<user>.<suffix>` 分支上的输出表，按行政区汇总里程，
//! 渲染为表格 + 横向条形图（或 JSON）。查询失败不视为错误，
//! 而是渲染错误信息和提示。

use std::fmt::Write as _;

use contracts::DashboardSettings;
use datafusion::arrow::array::{Array, Float64Array, StringArray};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::DataType;
use datafusion::arrow::record_batch::RecordBatch;
use platform::{DataPlatformClient, PlatformError};
use serde::Serialize;
use tracing::{info, instrument, warn};

const BAR: char = '█';

/// 仪表盘 SQL
pub fn dashboard_query(table: &str) -> String {
    format!(
        "SELECT Borough, SUM(trip_miles) AS total_miles FROM {table} \
         WHERE Borough IS NOT NULL GROUP BY Borough ORDER BY total_miles DESC"
    )
}

/// 查询失败时的提示
pub fn failure_hint(table: &str) -> String {
    format!("Make sure the pipeline has run and the {table} table exists")
}

/// 仪表盘分支名 `<user>.<suffix>`
pub fn dashboard_branch(username: &str, suffix: &str) -> String {
    format!("{username}.{suffix}")
}

/// 单个行政区的汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoroughMiles {
    #[serde(rename = "Borough")]
    pub borough: String,
    pub total_miles: f64,
}

/// 仪表盘结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DashboardOutcome {
    Rows {
        branch: String,
        table: String,
        rows: Vec<BoroughMiles>,
    },
    Empty {
        branch: String,
        table: String,
    },
    Error {
        branch: String,
        message: String,
        hint: String,
    },
}

/// 只读仪表盘
pub struct Dashboard<'a, C> {
    client: &'a C,
    branch: String,
    table: String,
    chart_width: usize,
}

impl<'a, C: DataPlatformClient> Dashboard<'a, C> {
    pub fn new(client: &'a C, branch: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            client,
            branch: branch.into(),
            table: table.into(),
            chart_width: 40,
        }
    }

    /// 以当前用户身份构造：分支为 `<user>.<branch_suffix>`
    pub async fn for_current_user(
        client: &'a C,
        settings: &DashboardSettings,
    ) -> Result<Self, PlatformError> {
        let user = client.current_user().await?;
        let branch = dashboard_branch(&user.username, &settings.branch_suffix);
        Ok(Self::new(client, branch, &settings.table).with_chart_width(settings.chart_width))
    }

    /// 设置条形图宽度（字符数）
    pub fn with_chart_width(mut self, width: usize) -> Self {
        self.chart_width = width.max(1);
        self
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn chart_width(&self) -> usize {
        self.chart_width
    }

    /// 执行查询；任何失败都转成 `DashboardOutcome::Error`
    #[instrument(name = "dashboard_load", skip(self), fields(branch = %self.branch, table = %self.table))]
    pub async fn load(&self) -> DashboardOutcome {
        let sql = dashboard_query(&self.table);
        let result = self.client.query(&sql, &self.branch, None).await;
        observability::record_query(
            "dashboard",
            result.is_ok(),
            result.as_ref().map(|b| b.num_rows()).unwrap_or(0),
        );

        let rows = result
            .map_err(|e| e.to_string())
            .and_then(|batch| borough_rows(&batch));
        match rows {
            Ok(rows) if rows.is_empty() => DashboardOutcome::Empty {
                branch: self.branch.clone(),
                table: self.table.clone(),
            },
            Ok(rows) => {
                info!(boroughs = rows.len(), "dashboard data fetched");
                DashboardOutcome::Rows {
                    branch: self.branch.clone(),
                    table: self.table.clone(),
                    rows,
                }
            }
            Err(message) => {
                warn!(error = %message, "dashboard query failed");
                DashboardOutcome::Error {
                    branch: self.branch.clone(),
                    message,
                    hint: failure_hint(&self.table),
                }
            }
        }
    }
}

/// 把查询结果转成 `BoroughMiles` 列表
fn borough_rows(batch: &RecordBatch) -> Result<Vec<BoroughMiles>, String> {
    let column = |name: &str, data_type: &DataType| {
        let array = batch
            .column_by_name(name)
            .ok_or_else(|| format!("query result has no `{name}` column"))?;
        cast(array, data_type).map_err(|e| e.to_string())
    };
    let boroughs = column("Borough", &DataType::Utf8)?;
    let miles = column("total_miles", &DataType::Float64)?;
    let boroughs = boroughs
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or("`Borough` is not a string column")?;
    let miles = miles
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or("`total_miles` is not numeric")?;

    Ok((0..batch.num_rows())
        .filter(|&i| !boroughs.is_null(i))
        .map(|i| BoroughMiles {
            borough: boroughs.value(i).to_string(),
            total_miles: if miles.is_null(i) { 0.0 } else { miles.value(i) },
        })
        .collect())
}

/// 渲染为终端文本
pub fn render(outcome: &DashboardOutcome, chart_width: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "NYC Taxi Trip Miles by Borough");
    let _ = writeln!(out, "{}", "=".repeat(30));

    match outcome {
        DashboardOutcome::Rows {
            branch,
            table,
            rows,
        } => {
            let _ = writeln!(
                out,
                "Querying the `{table}` table in branch '{branch}'\n"
            );
            let _ = writeln!(out, "Fetched {} boroughs from branch '{branch}'\n", rows.len());
            let _ = writeln!(out, "Total Miles per Borough");
            out.push_str(&render_table(rows));
            let _ = writeln!(out, "\nMiles by Borough");
            out.push_str(&render_bars(rows, chart_width));
        }
        DashboardOutcome::Empty { branch, table } => {
            let _ = writeln!(
                out,
                "Querying the `{table}` table in branch '{branch}'\n"
            );
            let _ = writeln!(out, "No data: `{table}` has no rows with a Borough");
        }
        DashboardOutcome::Error {
            branch,
            message,
            hint,
        } => {
            let _ = writeln!(out, "Error querying branch '{branch}': {message}");
            let _ = writeln!(out, "{hint}");
        }
    }
    out
}

fn render_table(rows: &[BoroughMiles]) -> String {
    const HEADERS: [&str; 2] = ["Borough", "total_miles"];
    let values: Vec<(String, String)> = rows
        .iter()
        .map(|r| (r.borough.clone(), format!("{:.2}", r.total_miles)))
        .collect();
    let left = values
        .iter()
        .map(|(b, _)| b.chars().count())
        .chain([HEADERS[0].len()])
        .max()
        .unwrap_or(0);
    let right = values
        .iter()
        .map(|(_, m)| m.len())
        .chain([HEADERS[1].len()])
        .max()
        .unwrap_or(0);

    let rule = format!("+{}+{}+\n", "-".repeat(left + 2), "-".repeat(right + 2));
    let mut out = rule.clone();
    let _ = writeln!(out, "| {:<left$} | {:<right$} |", HEADERS[0], HEADERS[1]);
    out.push_str(&rule);
    for (borough, miles) in &values {
        let _ = writeln!(out, "| {borough:<left$} | {miles:>right$} |");
    }
    out.push_str(&rule);
    out
}

fn render_bars(rows: &[BoroughMiles], width: usize) -> String {
    let label = rows.iter().map(|r| r.borough.chars().count()).max().unwrap_or(0);
    let max = rows
        .iter()
        .map(|r| r.total_miles)
        .fold(0.0_f64, f64::max);

    let mut out = String::new();
    for row in rows {
        let len = if max > 0.0 && row.total_miles > 0.0 {
            ((row.total_miles / max) * width as f64).round().max(1.0) as usize
        } else {
            0
        };
        let bar: String = std::iter::repeat(BAR).take(len).collect();
        let _ = writeln!(
            out,
            "{:<label$} | {bar} {:.2}",
            row.borough, row.total_miles
        );
    }
    out
}

/// JSON 输出
pub fn to_json(outcome: &DashboardOutcome) -> serde_json::Result<String> {
    serde_json::to_string_pretty(outcome)
}
