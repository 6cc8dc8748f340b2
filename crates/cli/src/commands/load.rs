//! `load` command implementation.

use anyhow::{Context, Result};
use platform::DataPlatformClient;
use tracing::info;

use super::{load_settings, open_platform};
use crate::cli::{Cli, LoadArgs};

/// Execute the `load` command
///
/// Seeds a table (e.g. `taxi_fhvhv` on `main`) from a local file.
pub async fn run_load(cli: &Cli, args: &LoadArgs) -> Result<()> {
    let settings = load_settings(&cli.config)?;
    let platform = open_platform(&settings)?;

    if !platform
        .branch_exists(&args.branch)
        .await
        .context("Failed to check branch")?
    {
        anyhow::bail!("Branch not found: {}", args.branch);
    }

    if !args.append {
        platform
            .create_table(&args.table, &args.source, &args.branch, true)
            .await
            .with_context(|| format!("Failed to create table {}", args.table))?;
    }
    platform
        .import_data(&args.table, &args.source, &args.branch)
        .await
        .with_context(|| format!("Failed to import {} into {}", args.source, args.table))?;

    info!(
        table = %args.table,
        branch = %args.branch,
        source = %args.source,
        append = args.append,
        "Table loaded"
    );
    if !cli.quiet {
        println!("Loaded {} into {}.{}", args.source, args.branch, args.table);
    }
    Ok(())
}
