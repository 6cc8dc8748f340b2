//! # Lakeflow CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 分支隔离的转换流程编排
//! - 终端仪表盘

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_dashboard, run_load, run_pipeline, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on CLI options
    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Lakeflow CLI starting");

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(&cli, args).await,
        Commands::Dashboard(args) => run_dashboard(&cli, args).await,
        Commands::Load(args) => run_load(&cli, args).await,
        Commands::Validate(args) => run_validate(&cli, args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging (and the optional metrics endpoint) from CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let (level, respect_env_filter) = if cli.quiet {
        ("warn", false)
    } else {
        let level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        (level, true)
    };

    observability::init_with_config(observability::ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: (cli.metrics_port != 0).then_some(cli.metrics_port),
        default_log_level: level.to_string(),
        respect_env_filter,
    })
}
