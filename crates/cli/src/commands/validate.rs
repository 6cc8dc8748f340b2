//! `validate` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::LakeflowSettings;
use serde::Serialize;
use tracing::info;
use transform::{ExecutionPlan, StepRegistry};

use super::load_settings;
use crate::cli::{Cli, ValidateArgs};

/// Validation result for JSON output
#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    project_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ProjectSummary>,
}

#[derive(Debug, Serialize)]
struct ProjectSummary {
    project: String,
    /// Models in execution order
    models: Vec<String>,
    source_tables: Vec<String>,
    output_table: String,
}

/// Execute the `validate` command
pub fn run_validate(cli: &Cli, args: &ValidateArgs) -> Result<()> {
    info!(config = %cli.config.display(), "Validating configuration");

    let result = match load_settings(&cli.config) {
        Ok(settings) => {
            let project_dir = args
                .project
                .clone()
                .unwrap_or_else(|| settings.pipeline.project_dir.clone());
            validate_project(&cli.config, &settings, &project_dir)
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path: cli.config.display().to_string(),
            project_dir: String::new(),
            error: Some(format!("{e:#}")),
            warnings: None,
            summary: None,
        },
    };

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Validation failed")
    }
}

fn validate_project(
    config_path: &Path,
    settings: &LakeflowSettings,
    project_dir: &Path,
) -> ValidationResult {
    let invalid = |error: String| ValidationResult {
        valid: false,
        config_path: config_path.display().to_string(),
        project_dir: project_dir.display().to_string(),
        error: Some(error),
        warnings: None,
        summary: None,
    };

    let manifest = match ConfigLoader::load_manifest(project_dir) {
        Ok(manifest) => manifest,
        Err(e) => return invalid(e.to_string()),
    };
    let plan = match ExecutionPlan::build(&manifest, &StepRegistry::builtin()) {
        Ok(plan) => plan,
        Err(e) => return invalid(e.to_string()),
    };

    let models: Vec<String> = plan.steps().iter().map(|s| s.name().to_string()).collect();
    let source_tables: Vec<String> = plan.source_tables().into_iter().map(String::from).collect();
    let warnings = collect_warnings(settings, &models, &source_tables, config_path);

    ValidationResult {
        valid: true,
        config_path: config_path.display().to_string(),
        project_dir: project_dir.display().to_string(),
        error: None,
        warnings: (!warnings.is_empty()).then_some(warnings),
        summary: Some(ProjectSummary {
            project: plan.project().to_string(),
            models,
            source_tables,
            output_table: settings.pipeline.output_table.clone(),
        }),
    }
}

/// Collect non-fatal issues
fn collect_warnings(
    settings: &LakeflowSettings,
    models: &[String],
    source_tables: &[String],
    config_path: &Path,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config_path.exists() {
        warnings.push(format!(
            "{} not found - using default settings",
            config_path.display()
        ));
    }
    if !models.contains(&settings.pipeline.output_table) {
        warnings.push(format!(
            "pipeline.output_table '{}' is not produced by any model",
            settings.pipeline.output_table
        ));
    }
    if !source_tables.contains(&settings.pipeline.source_table) {
        warnings.push(format!(
            "pipeline.source_table '{}' is imported but never read",
            settings.pipeline.source_table
        ));
    }
    if !models.contains(&settings.dashboard.table) {
        warnings.push(format!(
            "dashboard.table '{}' is not produced by any model",
            settings.dashboard.table
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Project is valid: {}", result.project_dir);

        if let Some(ref summary) = result.summary {
            println!("\n  Project: {}", summary.project);
            println!("  Models (execution order): {}", summary.models.join(" -> "));
            println!("  Source tables: {}", summary.source_tables.join(", "));
            println!("  Output table: {}", summary.output_table);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Validation failed: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[project]
name = "taxi_zones"

[[models]]
name = "my_child"
function = "filter_positive_miles"
inputs = [{ param = "my_trips", table = "my_parent" }]

[[models]]
name = "my_parent"
function = "join_trips_zones"
inputs = [
    { param = "trips", table = "taxi_fhvhv", columns = ["pickup_datetime", "PULocationID", "DOLocationID", "trip_miles"] },
    { param = "zones", table = "taxi_metadata" },
]
"#;

    #[test]
    fn test_validate_project_orders_models() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pipeline.toml"), MANIFEST).unwrap();
        let config = dir.path().join("lakeflow.toml");

        let result = validate_project(&config, &LakeflowSettings::default(), dir.path());
        assert!(result.valid, "{:?}", result.error);
        let summary = result.summary.unwrap();
        assert_eq!(summary.models, vec!["my_parent", "my_child"]);
        assert_eq!(summary.source_tables, vec!["taxi_fhvhv", "taxi_metadata"]);
        // only the missing settings file is worth a warning
        assert_eq!(result.warnings.unwrap().len(), 1);
    }

    #[test]
    fn test_validate_project_unknown_function() {
        let dir = TempDir::new().unwrap();
        let manifest = MANIFEST.replace("filter_positive_miles", "filter_negative_miles");
        fs::write(dir.path().join("pipeline.toml"), manifest).unwrap();

        let result = validate_project(
            Path::new("lakeflow.toml"),
            &LakeflowSettings::default(),
            dir.path(),
        );
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("filter_negative_miles"));
    }

    #[test]
    fn test_validate_project_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let result = validate_project(
            Path::new("lakeflow.toml"),
            &LakeflowSettings::default(),
            dir.path(),
        );
        assert!(!result.valid);
    }

    #[test]
    fn test_shipped_project_is_valid() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let settings = ConfigLoader::load_settings_from_path(&root.join("lakeflow.toml")).unwrap();
        let result = validate_project(
            &root.join("lakeflow.toml"),
            &settings,
            &root.join(&settings.pipeline.project_dir),
        );
        assert!(result.valid, "{:?}", result.error);
        assert!(result.warnings.is_none(), "{:?}", result.warnings);
    }
}
