//! Command implementations.

mod dashboard;
mod load;
mod run;
mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::LakeflowSettings;
use platform::{FsStore, LocalPlatform};
use tracing::info;
use transform::StepRegistry;

pub use dashboard::run_dashboard;
pub use load::run_load;
pub use run::run_pipeline;
pub use validate::run_validate;

/// Load settings (defaults when the file is missing) and apply `LAKEFLOW_*` overrides
///
/// A relative `pipeline.project_dir` is taken relative to the settings file.
pub(crate) fn load_settings(path: &Path) -> Result<LakeflowSettings> {
    let mut settings = ConfigLoader::load_settings_or_default(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    if path.exists() {
        ConfigLoader::resolve_project_dir(&mut settings, path);
    }
    ConfigLoader::apply_env_overrides(&mut settings, |key| std::env::var(key).ok())
        .context("Invalid LAKEFLOW_* environment override")?;
    Ok(settings)
}

/// Open the local platform described by `settings`
pub(crate) fn open_platform(settings: &LakeflowSettings) -> Result<LocalPlatform<FsStore>> {
    let platform = LocalPlatform::from_settings(settings, StepRegistry::builtin())
        .with_context(|| {
            format!(
                "Failed to open warehouse at {}",
                settings.platform.warehouse_dir.display()
            )
        })?;
    info!(
        warehouse = %settings.platform.warehouse_dir.display(),
        namespace = %settings.platform.namespace,
        "Platform ready"
    );
    Ok(platform)
}
