//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Lakeflow - branch-isolated taxi-zone pipeline
#[derive(Parser, Debug)]
#[command(
    name = "lakeflow",
    author,
    version,
    about = "Branch-isolated taxi-zone pipeline and dashboard",
    long_about = "Creates an isolated data branch, imports the zone lookup table, runs the\n\
                  join/filter transformations, verifies the output and merges the branch.\n\
                  The dashboard summarizes trip miles per borough."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LAKEFLOW_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "LAKEFLOW_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Settings file (TOML or JSON); defaults apply when it is missing
    #[arg(
        short,
        long,
        default_value = "lakeflow.toml",
        global = true,
        env = "LAKEFLOW_CONFIG"
    )]
    pub config: PathBuf,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", global = true, env = "LAKEFLOW_METRICS_PORT")]
    pub metrics_port: u16,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the five-stage transformation flow on a branch
    Run(RunArgs),

    /// Show trip miles per borough
    Dashboard(DashboardArgs),

    /// Load a CSV/Parquet file into a table
    Load(LoadArgs),

    /// Validate settings and the project manifest without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Branch name (must start with your username)
    #[arg(long = "branch-name", alias = "branch_name")]
    pub branch_name: String,

    /// Source URI; defaults to the variable named by `pipeline.source_uri_env`
    #[arg(long)]
    pub source: Option<String>,

    /// Override the project directory from settings (relative to the working directory)
    #[arg(long)]
    pub project_dir: Option<PathBuf>,
}

/// Arguments for the `dashboard` command
#[derive(Parser, Debug, Clone)]
pub struct DashboardArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Query this branch instead of `<user>.<dashboard.branch_suffix>`
    #[arg(long)]
    pub branch: Option<String>,
}

/// Arguments for the `load` command
#[derive(Parser, Debug, Clone)]
pub struct LoadArgs {
    /// Target table name
    #[arg(long)]
    pub table: String,

    /// Source URI (path or file:// to .csv / .parquet)
    #[arg(long)]
    pub source: String,

    /// Target branch
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Append to an existing table instead of replacing it
    #[arg(long)]
    pub append: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Project directory (defaults to `pipeline.project_dir`)
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
