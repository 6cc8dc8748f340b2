//! LakeflowSettings - Config Loader 输出
//!
//! 描述平台连接、编排流程和仪表盘的全部可配置项。所有字段都有默认值，
//! 因此空配置文件（或没有配置文件）也是合法的。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{DEFAULT_BASE_REF, DEFAULT_NAMESPACE};

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct LakeflowSettings {
    /// 平台设置
    #[serde(default)]
    #[validate(nested)]
    pub platform: PlatformSettings,

    /// 编排流程设置
    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineSettings,

    /// 仪表盘设置
    #[serde(default)]
    #[validate(nested)]
    pub dashboard: DashboardSettings,
}

/// 平台设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PlatformSettings {
    /// 本地仓库目录
    #[serde(default = "default_warehouse_dir")]
    pub warehouse_dir: PathBuf,

    /// 调用者身份 (None = 读取环境变量)
    #[serde(default)]
    pub user: Option<String>,

    /// 默认命名空间
    #[serde(default = "default_namespace")]
    #[validate(length(min = 1))]
    pub namespace: String,

    /// 基础分支
    #[serde(default = "default_base_ref")]
    #[validate(length(min = 1))]
    pub base_ref: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            warehouse_dir: default_warehouse_dir(),
            user: None,
            namespace: default_namespace(),
            base_ref: default_base_ref(),
        }
    }
}

/// 编排流程设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PipelineSettings {
    /// 导入的源表名
    #[serde(default = "default_source_table")]
    #[validate(length(min = 1))]
    pub source_table: String,

    /// 存放源数据位置的环境变量名
    #[serde(default = "default_source_uri_env")]
    #[validate(length(min = 1))]
    pub source_uri_env: String,

    /// 项目目录（包含 pipeline.toml）
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,

    /// 用于校验的输出表
    #[serde(default = "default_output_table")]
    #[validate(length(min = 1))]
    pub output_table: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            source_table: default_source_table(),
            source_uri_env: default_source_uri_env(),
            project_dir: default_project_dir(),
            output_table: default_output_table(),
        }
    }
}

/// 仪表盘设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DashboardSettings {
    /// 分支名后缀，完整分支为 `<username>.<suffix>`
    #[serde(default = "default_branch_suffix")]
    #[validate(length(min = 1))]
    pub branch_suffix: String,

    /// 查询的表
    #[serde(default = "default_output_table")]
    #[validate(length(min = 1))]
    pub table: String,

    /// 条形图最大宽度（字符）
    #[serde(default = "default_chart_width")]
    #[validate(range(min = 10, max = 200))]
    pub chart_width: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            branch_suffix: default_branch_suffix(),
            table: default_output_table(),
            chart_width: default_chart_width(),
        }
    }
}

fn default_warehouse_dir() -> PathBuf {
    PathBuf::from(".lakehouse")
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_base_ref() -> String {
    DEFAULT_BASE_REF.to_string()
}

fn default_source_table() -> String {
    "taxi_metadata".to_string()
}

fn default_source_uri_env() -> String {
    "TAXI_ZONE_LOOKUP_FILE".to_string()
}

fn default_project_dir() -> PathBuf {
    PathBuf::from("pipelines/taxi_zones")
}

fn default_output_table() -> String {
    "my_child".to_string()
}

fn default_branch_suffix() -> String {
    "taxi_zones_prefect".to_string()
}

fn default_chart_width() -> usize {
    40
}
