//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 随仓库发布的项目清单与内置定义一致
//! - 内存平台上的完整编排流程
//! - 文件仓库上的完整流程（CSV 源、跨实例持久化、仪表盘）

#[cfg(test)]
mod contract_tests {
    use std::path::PathBuf;

    use config_loader::ConfigLoader;
    use transform::taxi_zones_manifest;

    fn repo_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
    }

    #[test]
    fn test_shipped_manifest_matches_builtin() {
        let manifest = ConfigLoader::load_manifest(&repo_root().join("pipelines/taxi_zones")).unwrap();
        assert_eq!(manifest, taxi_zones_manifest());
    }

    #[test]
    fn test_shipped_settings_are_defaults() {
        let settings = ConfigLoader::load_settings_from_path(&repo_root().join("lakeflow.toml")).unwrap();
        assert_eq!(settings, contracts::LakeflowSettings::default());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use contracts::LakeflowSettings;
    use datafusion::arrow::array::{Float64Array, Int64Array, StringArray};
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use datafusion::arrow::record_batch::RecordBatch;
    use orchestrator::{
        BoroughMiles, Dashboard, DashboardOutcome, OrchestrationError, OrchestratorConfig,
        PipelineOrchestrator, Stage,
    };
    use platform::{
        DataPlatformClient, LocalPlatform, MockConfig, MockPlatformClient, PlatformOp,
    };
    use tempfile::TempDir;
    use transform::{taxi_zones_manifest, StepRegistry, TRIPS_TABLE};

    const ZONES_URI: &str = "mem://taxi_zone_lookup.csv";

    fn repo_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
    }

    fn trips() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("pickup_datetime", DataType::Utf8, false),
            Field::new("PULocationID", DataType::Int64, false),
            Field::new("DOLocationID", DataType::Int64, false),
            Field::new("trip_miles", DataType::Float64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![
                    "2023-03-20T08:00:00-05:00",
                    "2023-03-21T09:30:00-05:00",
                ])),
                Arc::new(Int64Array::from(vec![50, 60])),
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(Float64Array::from(vec![5.0, -1.0])),
            ],
        )
        .unwrap()
    }

    fn zones() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("LocationID", DataType::Int64, false),
            Field::new("Borough", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec!["Manhattan", "Bronx"])),
            ],
        )
        .unwrap()
    }

    /// 端到端：trips {1, 5.0}, {2, -1.0} + zones {1, Manhattan}, {2, Bronx}
    ///
    /// join 2 行 -> filter 1 行 -> dashboard 只剩 Manhattan 5.0
    #[tokio::test]
    async fn test_e2e_mock_pipeline() {
        let client = MockPlatformClient::with_config(MockConfig {
            manifest: Some(taxi_zones_manifest()),
            ..Default::default()
        });
        client.seed_table("main", TRIPS_TABLE, &trips()).unwrap();
        client.register_source(ZONES_URI, zones());

        let orchestrator = PipelineOrchestrator::new(&client, OrchestratorConfig::default());
        let report = orchestrator.run("alice.e2e", ZONES_URI).await.unwrap();

        let models: Vec<_> = report
            .materialized
            .iter()
            .map(|m| (m.name.as_str(), m.rows))
            .collect();
        assert_eq!(models, vec![("my_parent", 2), ("my_child", 1)]);
        assert_eq!(report.output_rows, Some(1));

        let parent = client.read_table("main", "my_parent").unwrap().unwrap();
        assert_eq!(parent.num_rows(), 2);

        let outcome = Dashboard::new(&client, "main", "my_child").load().await;
        assert_eq!(
            outcome,
            DashboardOutcome::Rows {
                branch: "main".into(),
                table: "my_child".into(),
                rows: vec![BoroughMiles {
                    borough: "Manhattan".into(),
                    total_miles: 5.0,
                }],
            }
        );

        // 成功后工作分支被删除
        assert_eq!(client.branches(), vec!["main".to_string()]);
    }

    #[tokio::test]
    async fn test_e2e_prefix_violation_touches_nothing() {
        let client = MockPlatformClient::with_config(MockConfig {
            manifest: Some(taxi_zones_manifest()),
            ..Default::default()
        });
        client.register_source(ZONES_URI, zones());

        let orchestrator = PipelineOrchestrator::new(&client, OrchestratorConfig::default());
        let err = orchestrator.run("mallory.e2e", ZONES_URI).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::BranchPrefix { .. }));
        assert_eq!(client.calls(), vec![PlatformOp::CurrentUser]);
    }

    fn fs_settings(warehouse: &Path) -> LakeflowSettings {
        let mut settings = LakeflowSettings::default();
        settings.platform.warehouse_dir = warehouse.to_path_buf();
        settings.platform.user = Some("alice".to_string());
        settings.pipeline.project_dir = repo_root().join("pipelines/taxi_zones");
        settings
    }

    fn data_file(name: &str) -> String {
        repo_root().join("data").join(name).display().to_string()
    }

    fn miles_of<'a>(rows: &'a [BoroughMiles], borough: &str) -> Option<&'a BoroughMiles> {
        rows.iter().find(|r| r.borough == borough)
    }

    /// 文件仓库上的完整流程：load -> run -> dashboard
    #[tokio::test]
    async fn test_e2e_filesystem_warehouse() {
        let warehouse = TempDir::new().unwrap();
        let settings = fs_settings(warehouse.path());

        // seed taxi_fhvhv on main, as `lakeflow load` does
        let platform = LocalPlatform::from_settings(&settings, StepRegistry::builtin()).unwrap();
        let trips_uri = data_file("fhvhv_trips.csv");
        platform
            .create_table(TRIPS_TABLE, &trips_uri, "main", true)
            .await
            .unwrap();
        platform
            .import_data(TRIPS_TABLE, &trips_uri, "main")
            .await
            .unwrap();

        let orchestrator =
            PipelineOrchestrator::new(&platform, OrchestratorConfig::from_settings(&settings));
        let zones_uri = data_file("taxi_zone_lookup.csv");
        let report = orchestrator
            .run("alice.taxi_zones_prefect", &zones_uri)
            .await
            .unwrap();
        // 10 trips fall in the pickup window, one of them with zero miles
        assert_eq!(report.materialized[0].rows, 10);
        assert_eq!(report.output_rows, Some(9));

        // running again on the same branch works
        orchestrator
            .run("alice.taxi_zones_prefect", &zones_uri)
            .await
            .unwrap();

        // a second instance sees the merged tables
        let reopened = LocalPlatform::from_settings(&settings, StepRegistry::builtin()).unwrap();
        assert!(!reopened.branch_exists("alice.taxi_zones_prefect").await.unwrap());

        let outcome = Dashboard::new(&reopened, "main", "my_child").load().await;
        let DashboardOutcome::Rows { rows, .. } = outcome else {
            panic!("expected rows, got {outcome:?}");
        };
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].borough, "Queens");
        assert!((rows[0].total_miles - 25.1).abs() < 1e-9);
        assert!(miles_of(&rows, "Unknown").is_none());
        let manhattan = miles_of(&rows, "Manhattan").unwrap();
        assert!((manhattan.total_miles - 17.65).abs() < 1e-9);
        assert!(rows
            .windows(2)
            .all(|w| w[0].total_miles >= w[1].total_miles));

        // the dashboard branch is gone after a successful merge
        let outcome = Dashboard::for_current_user(&reopened, &settings.dashboard)
            .await
            .unwrap()
            .load()
            .await;
        assert!(matches!(outcome, DashboardOutcome::Error { .. }));
    }

    #[tokio::test]
    async fn test_e2e_filesystem_rejects_remote_source() {
        let warehouse = TempDir::new().unwrap();
        let settings = fs_settings(warehouse.path());
        let platform = LocalPlatform::from_settings(&settings, StepRegistry::builtin()).unwrap();

        let orchestrator =
            PipelineOrchestrator::new(&platform, OrchestratorConfig::from_settings(&settings));
        let err = orchestrator
            .run("alice.remote", "s3://alpha-hello-bauplan/taxi_zone_lookup.csv")
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::ImportSource));
        // no compensation: the branch is left for inspection
        assert!(platform.branch_exists("alice.remote").await.unwrap());
    }
}
