//! `run` command implementation.

use anyhow::{Context, Result};
use orchestrator::{OrchestrationError, OrchestratorConfig, PipelineOrchestrator};
use tracing::info;

use super::{load_settings, open_platform};
use crate::cli::{Cli, RunArgs};

/// Execute the `run` command
pub async fn run_pipeline(cli: &Cli, args: &RunArgs) -> Result<()> {
    let settings = load_settings(&cli.config)?;

    let source_uri = resolve_source(
        args.source.as_deref(),
        &settings.pipeline.source_uri_env,
        |key| std::env::var(key).ok(),
    )?;

    let mut config = OrchestratorConfig::from_settings(&settings);
    if let Some(dir) = &args.project_dir {
        info!(project_dir = %dir.display(), "Overriding project directory from CLI");
        config.project_dir = dir.clone();
    }

    let platform = open_platform(&settings)?;
    let orchestrator = PipelineOrchestrator::new(&platform, config);

    let report = orchestrator
        .run(&args.branch_name, &source_uri)
        .await
        .context("Transformation flow failed")?;

    if !cli.quiet {
        report.print_summary();
    }
    Ok(())
}

/// CLI value first, then the environment variable named by settings
fn resolve_source<F>(
    cli_value: Option<&str>,
    variable: &str,
    lookup: F,
) -> Result<String, OrchestrationError>
where
    F: Fn(&str) -> Option<String>,
{
    cli_value
        .map(str::to_string)
        .or_else(|| lookup(variable))
        .filter(|uri| !uri.trim().is_empty())
        .ok_or_else(|| OrchestrationError::MissingSource {
            variable: variable.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_source_prefers_cli() {
        let uri = resolve_source(Some("data/zones.csv"), "TAXI_ZONE_LOOKUP_FILE", |_| {
            Some("env.csv".into())
        })
        .unwrap();
        assert_eq!(uri, "data/zones.csv");
    }

    #[test]
    fn test_resolve_source_from_env() {
        let uri = resolve_source(None, "TAXI_ZONE_LOOKUP_FILE", |key| {
            (key == "TAXI_ZONE_LOOKUP_FILE").then(|| "env.csv".to_string())
        })
        .unwrap();
        assert_eq!(uri, "env.csv");
    }

    #[test]
    fn test_resolve_source_missing() {
        let err = resolve_source(None, "TAXI_ZONE_LOOKUP_FILE", |_| Some("  ".into())).unwrap_err();
        assert!(matches!(
            err,
            OrchestrationError::MissingSource { ref variable } if variable == "TAXI_ZONE_LOOKUP_FILE"
        ));
    }
}
