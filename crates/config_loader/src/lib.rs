//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON settings files into `LakeflowSettings`
//! - Apply environment overrides (`LAKEFLOW_*`)
//! - Load the project manifest (`pipeline.toml`) from a project directory
//! - Validate both
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let settings = ConfigLoader::load_settings_or_default(Path::new("lakeflow.toml")).unwrap();
//! let manifest = ConfigLoader::load_manifest(&settings.pipeline.project_dir).unwrap();
//! println!("project: {}", manifest.project.name);
//! ```

mod parser;
mod validator;

pub use contracts::{LakeflowSettings, ProjectManifest};
pub use parser::ConfigFormat;
pub use validator::{validate_manifest, validate_settings};

use contracts::{ContractError, MANIFEST_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the caller identity
pub const ENV_USER: &str = "LAKEFLOW_USER";
/// Environment variable overriding the warehouse directory
pub const ENV_WAREHOUSE: &str = "LAKEFLOW_WAREHOUSE";
/// Environment variable overriding the default namespace
pub const ENV_NAMESPACE: &str = "LAKEFLOW_NAMESPACE";

/// Configuration loader
///
/// Provides static methods to load settings and manifests from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_settings_from_path(path: &Path) -> Result<LakeflowSettings, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_settings_from_str(&content, format)
    }

    /// Load settings from file path, falling back to defaults when the file is absent
    pub fn load_settings_or_default(path: &Path) -> Result<LakeflowSettings, ContractError> {
        if path.exists() {
            Self::load_settings_from_path(path)
        } else {
            debug!(path = %path.display(), "settings file not found, using defaults");
            let settings = LakeflowSettings::default();
            validate_settings(&settings)?;
            Ok(settings)
        }
    }

    /// Resolve a relative `pipeline.project_dir` against the directory of `settings_path`
    ///
    /// A settings file in the working directory leaves the path unchanged.
    pub fn resolve_project_dir(settings: &mut LakeflowSettings, settings_path: &Path) {
        if settings.pipeline.project_dir.is_absolute() {
            return;
        }
        if let Some(base) = settings_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let resolved = base.join(&settings.pipeline.project_dir);
            debug!(project_dir = %resolved.display(), "project directory resolved against settings file");
            settings.pipeline.project_dir = resolved;
        }
    }

    /// Load settings from string
    pub fn load_settings_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<LakeflowSettings, ContractError> {
        let settings: LakeflowSettings = parser::parse(content, format)?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Apply `LAKEFLOW_*` overrides read through `lookup`
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`.
    pub fn apply_env_overrides<F>(
        settings: &mut LakeflowSettings,
        lookup: F,
    ) -> Result<(), ContractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user) = lookup(ENV_USER).filter(|v| !v.is_empty()) {
            debug!(user = %user, "overriding platform.user from environment");
            settings.platform.user = Some(user);
        }
        if let Some(dir) = lookup(ENV_WAREHOUSE).filter(|v| !v.is_empty()) {
            debug!(warehouse = %dir, "overriding platform.warehouse_dir from environment");
            settings.platform.warehouse_dir = PathBuf::from(dir);
        }
        if let Some(ns) = lookup(ENV_NAMESPACE).filter(|v| !v.is_empty()) {
            settings.platform.namespace = ns;
        }
        validate_settings(settings)
    }

    /// Load the project manifest from a project directory
    ///
    /// Looks for `pipeline.toml`, then `pipeline.json`.
    pub fn load_manifest(project_dir: &Path) -> Result<ProjectManifest, ContractError> {
        let toml_path = project_dir.join(MANIFEST_FILE_NAME);
        let json_path = toml_path.with_extension("json");

        let path = if toml_path.exists() {
            toml_path
        } else if json_path.exists() {
            json_path
        } else {
            return Err(ContractError::config_parse(format!(
                "no {} found in project directory {}",
                MANIFEST_FILE_NAME,
                project_dir.display()
            )));
        };

        let format = Self::detect_format(&path)?;
        let content = Self::read_file(&path)?;
        Self::load_manifest_from_str(&content, format)
    }

    /// Load the project manifest from string
    pub fn load_manifest_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ProjectManifest, ContractError> {
        let manifest: ProjectManifest = parser::parse(content, format)?;
        validate_manifest(&manifest)?;
        Ok(manifest)
    }

    /// Serialize settings to TOML string
    pub fn to_toml(settings: &LakeflowSettings) -> Result<String, ContractError> {
        toml::to_string_pretty(settings)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TAXI_MANIFEST: &str = r#"
[project]
name = "taxi_zones"

[[models]]
name = "my_parent"
function = "join_trips_zones"

[[models.inputs]]
param = "trips"
table = "taxi_fhvhv"
columns = ["pickup_datetime", "PULocationID", "DOLocationID", "trip_miles"]
filter = "pickup_datetime >= '2023-03-15T00:00:00-05:00' AND pickup_datetime < '2023-04-01T00:00:00-05:00'"

[[models.inputs]]
param = "zones"
table = "taxi_metadata"

[[models]]
name = "my_child"
function = "filter_positive_miles"
inputs = [{ param = "my_trips", table = "my_parent" }]
"#;

    #[test]
    fn test_project_dir_follows_settings_file() {
        let mut settings = LakeflowSettings::default();
        ConfigLoader::resolve_project_dir(&mut settings, Path::new("/srv/lakeflow/lakeflow.toml"));
        assert_eq!(
            settings.pipeline.project_dir,
            PathBuf::from("/srv/lakeflow/pipelines/taxi_zones")
        );

        let mut settings = LakeflowSettings::default();
        ConfigLoader::resolve_project_dir(&mut settings, Path::new("lakeflow.toml"));
        assert_eq!(settings.pipeline.project_dir, PathBuf::from("pipelines/taxi_zones"));

        let mut settings = LakeflowSettings::default();
        settings.pipeline.project_dir = PathBuf::from("/opt/project");
        ConfigLoader::resolve_project_dir(&mut settings, Path::new("conf/lakeflow.toml"));
        assert_eq!(settings.pipeline.project_dir, PathBuf::from("/opt/project"));
    }

    #[test]
    fn test_missing_settings_file_uses_defaults() {
        let settings =
            ConfigLoader::load_settings_or_default(Path::new("/nonexistent/lakeflow.toml"))
                .unwrap();
        assert_eq!(settings, LakeflowSettings::default());
    }

    #[test]
    fn test_round_trip_toml() {
        let mut settings = LakeflowSettings::default();
        settings.platform.user = Some("alice".into());
        let serialized = ConfigLoader::to_toml(&settings).unwrap();
        let back = ConfigLoader::load_settings_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_USER, "bob"),
            (ENV_WAREHOUSE, "/data/wh"),
            (ENV_NAMESPACE, ""),
        ]);
        let mut settings = LakeflowSettings::default();
        ConfigLoader::apply_env_overrides(&mut settings, |k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.platform.user.as_deref(), Some("bob"));
        assert_eq!(settings.platform.warehouse_dir, PathBuf::from("/data/wh"));
        // empty values are ignored
        assert_eq!(settings.platform.namespace, "bauplan");
    }

    #[test]
    fn test_load_manifest_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE_NAME), TAXI_MANIFEST).unwrap();

        let manifest = ConfigLoader::load_manifest(dir.path()).unwrap();
        assert_eq!(manifest.project.name, "taxi_zones");
        assert_eq!(manifest.models.len(), 2);
    }

    #[test]
    fn test_load_manifest_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::load_manifest(dir.path()).unwrap_err();
        assert!(err.to_string().contains("pipeline.toml"));
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = TAXI_MANIFEST.replace("name = \"my_child\"", "name = \"my_parent\"");
        let result = ConfigLoader::load_manifest_from_str(&content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }
}
