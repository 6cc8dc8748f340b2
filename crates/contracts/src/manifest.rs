//! ProjectManifest - 转换项目描述
//!
//! 描述一个项目目录中的模型：每个模型绑定一个已注册的纯函数，
//! 声明输入（源表或其他模型的输出）以及物化策略。

use serde::{Deserialize, Serialize};

use crate::Materialization;

/// 项目清单文件名
pub const MANIFEST_FILE_NAME: &str = "pipeline.toml";

/// 完整的项目清单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// 项目信息
    pub project: ProjectInfo,

    /// 模型定义列表（顺序无关，执行顺序由依赖决定）
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

/// 项目元信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// 项目名称
    pub name: String,

    /// 描述 (可选)
    #[serde(default)]
    pub description: Option<String>,
}

/// 单个模型定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// 模型名称，同时也是输出表名
    pub name: String,

    /// 注册表中的函数名
    pub function: String,

    /// 物化策略
    #[serde(default)]
    pub materialization: Materialization,

    /// 输入声明
    #[serde(default)]
    pub inputs: Vec<ModelInput>,
}

impl ModelSpec {
    /// 按参数名查找输入
    pub fn input(&self, param: &str) -> Option<&ModelInput> {
        self.inputs.iter().find(|i| i.param == param)
    }
}

/// 模型输入声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    /// 传给函数的参数名 (e.g., "trips")
    pub param: String,

    /// 读取的表名或上游模型名
    pub table: String,

    /// 列投影 (None = 全部列)
    #[serde(default)]
    pub columns: Option<Vec<String>>,

    /// 由平台在读取时下推的 SQL 谓词
    #[serde(default)]
    pub filter: Option<String>,
}

impl ModelInput {
    /// 读取整张表的输入
    pub fn table(param: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            table: table.into(),
            columns: None,
            filter: None,
        }
    }

    /// 设置列投影
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// 设置下推谓词
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_from_toml() {
        let content = r#"
[project]
name = "taxi_zones"

[[models]]
name = "my_child"
function = "filter_positive_miles"
inputs = [{ param = "my_trips", table = "my_parent" }]

[[models]]
name = "my_parent"
function = "join_trips_zones"
materialization = "replace"

[[models.inputs]]
param = "trips"
table = "taxi_fhvhv"
columns = ["DOLocationID", "trip_miles"]
filter = "trip_miles IS NOT NULL"

[[models.inputs]]
param = "zones"
table = "taxi_metadata"
"#;
        let manifest: ProjectManifest = toml::from_str(content).unwrap();
        assert_eq!(manifest.project.name, "taxi_zones");
        assert_eq!(manifest.models.len(), 2);

        let parent = &manifest.models[1];
        assert_eq!(parent.materialization, Materialization::Replace);
        let trips = parent.input("trips").unwrap();
        assert_eq!(trips.columns.as_ref().unwrap().len(), 2);
        assert_eq!(trips.filter.as_deref(), Some("trip_miles IS NOT NULL"));
        assert!(parent.input("zones").unwrap().columns.is_none());
    }

    #[test]
    fn test_model_input_builder() {
        let input = ModelInput::table("trips", "taxi_fhvhv")
            .with_columns(["DOLocationID"])
            .with_filter("1 = 1");
        assert_eq!(input.columns, Some(vec!["DOLocationID".to_string()]));
        assert_eq!(input.filter.as_deref(), Some("1 = 1"));
    }
}
