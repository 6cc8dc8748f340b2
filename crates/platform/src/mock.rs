//! Mock 数据平台客户端
//!
//! 基于内存存储的 `LocalPlatform`，额外支持：
//! - 注入失败场景（指定操作返回错误）
//! - 空操作（指定操作报告成功但不产生效果，用于触发后置断言）
//! - 覆盖作业状态 / 丢弃作业 ID
//! - 记录调用序列，便于断言"没有发生任何平台调用"

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use contracts::{JobStatus, ProjectManifest, RunState, TableRef, UserInfo, DEFAULT_BASE_REF};
use datafusion::arrow::record_batch::RecordBatch;
use tracing::instrument;
use transform::StepRegistry;

use crate::client::{DataPlatformClient, PlatformOp};
use crate::error::{PlatformError, Result};
use crate::local::LocalPlatform;
use crate::store::{MemoryStore, TableStore};

/// Mock 客户端配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 调用者用户名
    pub user: String,
    /// 应该失败的操作
    pub fail_ops: Vec<PlatformOp>,
    /// 报告成功但不执行的操作
    pub noop_ops: Vec<PlatformOp>,
    /// 覆盖 run_pipeline 返回的作业状态
    pub job_status: Option<JobStatus>,
    /// run_pipeline 返回时去掉作业 ID
    pub omit_job_id: bool,
    /// 内存中的项目清单（设置后 run_pipeline 忽略 project_dir）
    pub manifest: Option<ProjectManifest>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            user: "alice".to_string(),
            fail_ops: Vec::new(),
            noop_ops: Vec::new(),
            job_status: None,
            omit_job_id: false,
            manifest: None,
        }
    }
}

/// Mock 数据平台客户端
pub struct MockPlatformClient {
    /// 配置（可注入失败场景）
    config: MockConfig,
    /// 实际执行的内存平台
    inner: LocalPlatform<MemoryStore>,
    /// 以 URI 注册的内存源数据
    sources: Mutex<HashMap<String, RecordBatch>>,
    /// 调用记录
    calls: Mutex<Vec<PlatformOp>>,
}

impl MockPlatformClient {
    /// 创建默认 mock 客户端
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock 客户端
    ///
    /// 基础分支 `main` 预先存在。
    pub fn with_config(config: MockConfig) -> Self {
        let store = MemoryStore::new();
        // MemoryStore 新建时不会失败；分支名是常量
        let _ = store.ensure_branch(DEFAULT_BASE_REF);
        let inner = LocalPlatform::new(
            store,
            UserInfo::new(config.user.clone()),
            StepRegistry::builtin(),
        );
        Self {
            config,
            inner,
            sources: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 注册一个内存源，import 时按 URI 读取
    pub fn register_source(&self, uri: impl Into<String>, batch: RecordBatch) {
        lock(&self.sources).insert(uri.into(), batch);
    }

    /// 直接写入一张表（不计入调用记录）
    pub fn seed_table(&self, branch: &str, table: &str, batch: &RecordBatch) -> Result<()> {
        let table = TableRef::parse(table, self.inner.namespace())?;
        self.inner.store().ensure_branch(branch)?;
        self.inner.store().write_table(branch, &table, batch)
    }

    /// 直接读取一张表（不计入调用记录）
    pub fn read_table(&self, branch: &str, table: &str) -> Result<Option<RecordBatch>> {
        let table = TableRef::parse(table, self.inner.namespace())?;
        self.inner.store().read_table(branch, &table)
    }

    /// 当前所有分支
    pub fn branches(&self) -> Vec<String> {
        self.inner.store().list_branches().unwrap_or_default()
    }

    /// 调用序列
    pub fn calls(&self) -> Vec<PlatformOp> {
        lock(&self.calls).clone()
    }

    /// 会改变状态的调用
    pub fn mutating_calls(&self) -> Vec<PlatformOp> {
        self.calls()
            .into_iter()
            .filter(|op| op.is_mutating())
            .collect()
    }

    /// 某操作被调用的次数
    pub fn call_count(&self, op: PlatformOp) -> usize {
        lock(&self.calls).iter().filter(|c| **c == op).count()
    }

    /// 清空调用记录
    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    /// 记录调用并检查注入；返回 true 表示该操作应当空执行
    fn enter(&self, op: PlatformOp) -> Result<bool> {
        lock(&self.calls).push(op);
        if self.config.fail_ops.contains(&op) {
            return Err(PlatformError::Injected { op });
        }
        Ok(self.config.noop_ops.contains(&op))
    }

    fn registered_source(&self, uri: &str) -> Option<RecordBatch> {
        lock(&self.sources).get(uri).cloned()
    }
}

impl Default for MockPlatformClient {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DataPlatformClient for MockPlatformClient {
    async fn current_user(&self) -> Result<UserInfo> {
        self.enter(PlatformOp::CurrentUser)?;
        self.inner.current_user().await
    }

    async fn branch_exists(&self, name: &str) -> Result<bool> {
        self.enter(PlatformOp::BranchExists)?;
        self.inner.branch_exists(name).await
    }

    #[instrument(name = "mock_platform_create_branch", skip(self))]
    async fn create_branch(&self, name: &str, from_ref: &str) -> Result<()> {
        if self.enter(PlatformOp::CreateBranch)? {
            return Ok(());
        }
        self.inner.create_branch(name, from_ref).await
    }

    #[instrument(name = "mock_platform_delete_branch", skip(self))]
    async fn delete_branch(&self, name: &str) -> Result<()> {
        if self.enter(PlatformOp::DeleteBranch)? {
            return Ok(());
        }
        self.inner.delete_branch(name).await
    }

    #[instrument(name = "mock_platform_merge_branch", skip(self))]
    async fn merge_branch(&self, source_ref: &str, into_branch: &str) -> Result<()> {
        if self.enter(PlatformOp::MergeBranch)? {
            return Ok(());
        }
        self.inner.merge_branch(source_ref, into_branch).await
    }

    #[instrument(name = "mock_platform_create_table", skip(self))]
    async fn create_table(
        &self,
        table: &str,
        source_uri: &str,
        branch: &str,
        replace: bool,
    ) -> Result<()> {
        if self.enter(PlatformOp::CreateTable)? {
            return Ok(());
        }
        match self.registered_source(source_uri) {
            Some(batch) => {
                self.inner
                    .create_table_with_schema(table, &batch.schema(), branch, replace)
            }
            None => {
                self.inner
                    .create_table(table, source_uri, branch, replace)
                    .await
            }
        }
    }

    #[instrument(name = "mock_platform_import_data", skip(self))]
    async fn import_data(&self, table: &str, source_uri: &str, branch: &str) -> Result<()> {
        if self.enter(PlatformOp::ImportData)? {
            return Ok(());
        }
        match self.registered_source(source_uri) {
            Some(batch) => self.inner.append_batch(table, &batch, branch).map(|_| ()),
            None => self.inner.import_data(table, source_uri, branch).await,
        }
    }

    #[instrument(name = "mock_platform_run_pipeline", skip(self, project_dir))]
    async fn run_pipeline(&self, project_dir: &Path, ref_name: &str) -> Result<RunState> {
        self.enter(PlatformOp::RunPipeline)?;
        let mut state = match &self.config.manifest {
            Some(manifest) => self.inner.run_manifest(manifest, ref_name).await?,
            None => self.inner.run_pipeline(project_dir, ref_name).await?,
        };
        if let Some(status) = self.config.job_status {
            state.job_status = status;
        }
        if self.config.omit_job_id {
            state.job_id = None;
        }
        Ok(state)
    }

    #[instrument(name = "mock_platform_query", skip(self, sql))]
    async fn query(
        &self,
        sql: &str,
        ref_name: &str,
        namespace: Option<&str>,
    ) -> Result<RecordBatch> {
        self.enter(PlatformOp::Query)?;
        self.inner.query(sql, ref_name, namespace).await
    }
}
