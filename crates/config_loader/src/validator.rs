//! 配置校验模块
//!
//! 校验规则：
//! - 设置项：字段非空，表名/命名空间是合法标识符，基础分支名合法
//! - 项目清单：模型名唯一，参数名唯一，输入表与投影列合法
//!
//! 函数是否已注册、依赖是否成环由 transform 的执行计划负责。

use std::collections::HashSet;

use ::validator::Validate;
use contracts::{
    validate_branch_name, validate_identifier, ContractError, LakeflowSettings, ProjectManifest,
    TableRef,
};

/// 校验 LakeflowSettings
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate_settings(settings: &LakeflowSettings) -> Result<(), ContractError> {
    settings
        .validate()
        .map_err(|e| ContractError::config_validation("settings", e.to_string()))?;

    let platform = &settings.platform;
    validate_branch_name(&platform.base_ref)
        .map_err(|e| ContractError::config_validation("platform.base_ref", e.to_string()))?;
    validate_identifier("namespace", &platform.namespace)
        .map_err(|e| ContractError::config_validation("platform.namespace", e.to_string()))?;
    if let Some(user) = &platform.user {
        validate_branch_name(user)
            .map_err(|e| ContractError::config_validation("platform.user", e.to_string()))?;
    }

    let pipeline = &settings.pipeline;
    validate_identifier("table", &pipeline.source_table)
        .map_err(|e| ContractError::config_validation("pipeline.source_table", e.to_string()))?;
    validate_identifier("table", &pipeline.output_table)
        .map_err(|e| ContractError::config_validation("pipeline.output_table", e.to_string()))?;

    let dashboard = &settings.dashboard;
    validate_branch_name(&dashboard.branch_suffix).map_err(|e| {
        ContractError::config_validation("dashboard.branch_suffix", e.to_string())
    })?;
    validate_identifier("table", &dashboard.table)
        .map_err(|e| ContractError::config_validation("dashboard.table", e.to_string()))?;

    Ok(())
}

/// 校验 ProjectManifest
pub fn validate_manifest(manifest: &ProjectManifest) -> Result<(), ContractError> {
    if manifest.project.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "project.name",
            "project name cannot be empty",
        ));
    }
    if manifest.models.is_empty() {
        return Err(ContractError::config_validation(
            "models",
            "project declares no models",
        ));
    }

    validate_model_names(manifest)?;
    for model in &manifest.models {
        validate_model(model)?;
    }
    Ok(())
}

/// 校验模型名唯一性
fn validate_model_names(manifest: &ProjectManifest) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for model in &manifest.models {
        validate_identifier("model", &model.name)
            .map_err(|e| ContractError::manifest(&model.name, e.to_string()))?;
        if !seen.insert(model.name.as_str()) {
            return Err(ContractError::manifest(&model.name, "duplicate model name"));
        }
    }
    Ok(())
}

/// 校验单个模型
fn validate_model(model: &contracts::ModelSpec) -> Result<(), ContractError> {
    if model.function.trim().is_empty() {
        return Err(ContractError::manifest(&model.name, "function cannot be empty"));
    }

    let mut params = HashSet::new();
    for input in &model.inputs {
        validate_identifier("parameter", &input.param)
            .map_err(|e| ContractError::manifest(&model.name, e.to_string()))?;
        if !params.insert(input.param.as_str()) {
            return Err(ContractError::manifest(
                &model.name,
                format!("duplicate input parameter '{}'", input.param),
            ));
        }

        TableRef::parse(&input.table, contracts::DEFAULT_NAMESPACE)
            .map_err(|e| ContractError::manifest(&model.name, e.to_string()))?;

        if let Some(columns) = &input.columns {
            if columns.is_empty() {
                return Err(ContractError::manifest(
                    &model.name,
                    format!("input '{}' projects no columns", input.param),
                ));
            }
            for column in columns {
                validate_identifier("column", column)
                    .map_err(|e| ContractError::manifest(&model.name, e.to_string()))?;
            }
        }

        if let Some(filter) = &input.filter {
            if filter.trim().is_empty() || filter.contains(';') {
                return Err(ContractError::manifest(
                    &model.name,
                    format!("input '{}' has an invalid filter", input.param),
                ));
            }
        }
    }
    Ok(())
}
