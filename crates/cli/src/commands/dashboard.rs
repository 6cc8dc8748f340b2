//! `dashboard` command implementation.

use anyhow::{Context, Result};
use orchestrator::{render, to_json, Dashboard};

use super::{load_settings, open_platform};
use crate::cli::{Cli, DashboardArgs};

/// Execute the `dashboard` command
///
/// Query failures are rendered, not returned: the command still exits 0.
pub async fn run_dashboard(cli: &Cli, args: &DashboardArgs) -> Result<()> {
    let settings = load_settings(&cli.config)?;
    let platform = open_platform(&settings)?;

    let dashboard = match &args.branch {
        Some(branch) => Dashboard::new(&platform, branch, &settings.dashboard.table)
            .with_chart_width(settings.dashboard.chart_width),
        None => Dashboard::for_current_user(&platform, &settings.dashboard)
            .await
            .context("Failed to resolve the current user")?,
    };

    let outcome = dashboard.load().await;
    if args.json {
        let json = to_json(&outcome).context("Failed to serialize dashboard")?;
        println!("{}", json);
    } else {
        print!("{}", render(&outcome, dashboard.chart_width()));
    }
    Ok(())
}
