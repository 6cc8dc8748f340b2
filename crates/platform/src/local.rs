//! Local reference platform
//!
//! Implements `DataPlatformClient` on top of a `TableStore`, the DataFusion
//! SQL engine and the step registry. With `FsStore` it persists across
//! processes, so `lakeflow run` and `lakeflow dashboard` see the same data.

use std::path::Path;

use config_loader::ConfigLoader;
use contracts::{
    validate_branch_name, LakeflowSettings, ProjectManifest, RunState, TableRef, UserInfo,
    DEFAULT_BASE_REF, DEFAULT_NAMESPACE,
};
use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::datatypes::Schema;
use datafusion::arrow::record_batch::RecordBatch;
use tracing::{info, instrument, warn};
use transform::{ExecutionPlan, StepRegistry};

use crate::client::DataPlatformClient;
use crate::engine::SqlEngine;
use crate::error::{PlatformError, Result};
use crate::runner::PipelineRunner;
use crate::source::SourceUri;
use crate::store::{FsStore, TableStore};

/// Local platform
pub struct LocalPlatform<S: TableStore> {
    store: S,
    user: UserInfo,
    namespace: String,
    base_ref: String,
    registry: StepRegistry,
    engine: SqlEngine,
}

impl LocalPlatform<FsStore> {
    /// Open the warehouse described by `settings`
    ///
    /// The caller identity is `platform.user`, else `$USER` / `$USERNAME`.
    pub fn from_settings(settings: &LakeflowSettings, registry: StepRegistry) -> Result<Self> {
        let platform = &settings.platform;
        let user = resolve_user(platform.user.as_deref(), |key| std::env::var(key).ok())?;

        let store = FsStore::open(&platform.warehouse_dir)?;
        store.ensure_branch(&platform.base_ref)?;
        info!(
            warehouse = %platform.warehouse_dir.display(),
            user = %user,
            "local platform opened"
        );

        Ok(Self::new(store, UserInfo::new(user), registry)
            .with_namespace(&platform.namespace)
            .with_base_ref(&platform.base_ref))
    }
}

/// Configured user first, then `USER` / `USERNAME`; blank values count as unset
fn resolve_user<F>(configured: Option<&str>, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    configured
        .map(str::to_string)
        .or_else(|| lookup("USER").filter(|u| !u.trim().is_empty()))
        .or_else(|| lookup("USERNAME").filter(|u| !u.trim().is_empty()))
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| PlatformError::Identity {
            message: "set platform.user, LAKEFLOW_USER or USER".into(),
        })
}

impl<S: TableStore> LocalPlatform<S> {
    /// Create a platform over `store`
    pub fn new(store: S, user: UserInfo, registry: StepRegistry) -> Self {
        Self {
            store,
            user,
            namespace: DEFAULT_NAMESPACE.to_string(),
            base_ref: DEFAULT_BASE_REF.to_string(),
            registry,
            engine: SqlEngine::new(),
        }
    }

    /// Set the default namespace (builder style)
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the protected base ref (builder style)
    pub fn with_base_ref(mut self, base_ref: impl Into<String>) -> Self {
        self.base_ref = base_ref.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn table_ref(&self, table: &str) -> Result<TableRef> {
        Ok(TableRef::parse(table, &self.namespace)?)
    }

    fn require_branch(&self, branch: &str) -> Result<()> {
        if self.store.branch_exists(branch)? {
            Ok(())
        } else {
            Err(PlatformError::branch_not_found(branch))
        }
    }

    /// Create `table` with `schema` and no rows
    pub fn create_table_with_schema(
        &self,
        table: &str,
        schema: &Schema,
        branch: &str,
        replace: bool,
    ) -> Result<()> {
        self.require_branch(branch)?;
        let table = self.table_ref(table)?;
        if !replace && self.store.read_table(branch, &table)?.is_some() {
            return Err(PlatformError::TableExists {
                table: table.to_string(),
                branch: branch.to_string(),
            });
        }
        let empty = RecordBatch::new_empty(std::sync::Arc::new(schema.clone()));
        self.store.write_table(branch, &table, &empty)?;
        info!(table = %table, branch, replace, "table created");
        Ok(())
    }

    /// Append `batch` to an existing table
    ///
    /// Column names and types must match the table schema in order.
    pub fn append_batch(&self, table: &str, batch: &RecordBatch, branch: &str) -> Result<usize> {
        self.require_branch(branch)?;
        let table_ref = self.table_ref(table)?;
        let existing = self
            .store
            .read_table(branch, &table_ref)?
            .ok_or_else(|| PlatformError::table_not_found(&table_ref, branch))?;

        let schema = existing.schema();
        check_compatible(table, &schema, &batch.schema())?;
        let incoming = RecordBatch::try_new(schema.clone(), batch.columns().to_vec())?;
        let merged = concat_batches(&schema, [&existing, &incoming])?;

        self.store.write_table(branch, &table_ref, &merged)?;
        info!(
            table = %table_ref,
            branch,
            imported = batch.num_rows(),
            total = merged.num_rows(),
            "data imported"
        );
        Ok(merged.num_rows())
    }

    /// Execute an already-loaded manifest on `ref_name`
    pub async fn run_manifest(&self, manifest: &ProjectManifest, ref_name: &str) -> Result<RunState> {
        let plan = ExecutionPlan::build(manifest, &self.registry)?;
        let job_id = uuid::Uuid::new_v4().to_string();
        info!(
            job_id = %job_id,
            project = plan.project(),
            ref_name,
            "pipeline run started"
        );
        PipelineRunner::new(&self.store, &self.engine, &self.namespace)
            .execute(&plan, ref_name, &job_id)
            .await
    }

    /// Tables visible to a query on `ref_name` in `namespace`
    fn visible_tables(&self, ref_name: &str, namespace: &str) -> Result<Vec<(String, RecordBatch)>> {
        let mut tables = Vec::new();
        for table in self.store.list_tables(ref_name)? {
            if table.namespace != namespace {
                continue;
            }
            if let Some(batch) = self.store.read_table(ref_name, &table)? {
                tables.push((table.name, batch));
            }
        }
        Ok(tables)
    }
}

impl<S: TableStore> DataPlatformClient for LocalPlatform<S> {
    async fn current_user(&self) -> Result<UserInfo> {
        Ok(self.user.clone())
    }

    async fn branch_exists(&self, name: &str) -> Result<bool> {
        self.store.branch_exists(name)
    }

    #[instrument(name = "local_platform_create_branch", skip(self))]
    async fn create_branch(&self, name: &str, from_ref: &str) -> Result<()> {
        validate_branch_name(name)?;
        self.store.create_branch(name, from_ref)?;
        info!(branch = name, from_ref, "branch created");
        Ok(())
    }

    #[instrument(name = "local_platform_delete_branch", skip(self))]
    async fn delete_branch(&self, name: &str) -> Result<()> {
        if name == self.base_ref {
            return Err(PlatformError::ProtectedBranch {
                branch: name.to_string(),
            });
        }
        self.store.delete_branch(name)?;
        info!(branch = name, "branch deleted");
        Ok(())
    }

    #[instrument(name = "local_platform_merge_branch", skip(self))]
    async fn merge_branch(&self, source_ref: &str, into_branch: &str) -> Result<()> {
        self.require_branch(into_branch)?;
        let tables = self.store.list_tables(source_ref)?;
        for table in &tables {
            if let Some(batch) = self.store.read_table(source_ref, table)? {
                self.store.write_table(into_branch, table, &batch)?;
            }
        }
        info!(source_ref, into_branch, tables = tables.len(), "branch merged");
        Ok(())
    }

    #[instrument(name = "local_platform_create_table", skip(self))]
    async fn create_table(
        &self,
        table: &str,
        source_uri: &str,
        branch: &str,
        replace: bool,
    ) -> Result<()> {
        let source = SourceUri::parse(source_uri)?.read().await?;
        self.create_table_with_schema(table, &source.schema(), branch, replace)
    }

    #[instrument(name = "local_platform_import_data", skip(self))]
    async fn import_data(&self, table: &str, source_uri: &str, branch: &str) -> Result<()> {
        let source = SourceUri::parse(source_uri)?.read().await?;
        self.append_batch(table, &source, branch).map(|_| ())
    }

    #[instrument(name = "local_platform_run_pipeline", skip(self, project_dir), fields(project_dir = %project_dir.display()))]
    async fn run_pipeline(&self, project_dir: &Path, ref_name: &str) -> Result<RunState> {
        let manifest = ConfigLoader::load_manifest(project_dir)?;
        self.run_manifest(&manifest, ref_name).await
    }

    #[instrument(name = "local_platform_query", skip(self, sql))]
    async fn query(
        &self,
        sql: &str,
        ref_name: &str,
        namespace: Option<&str>,
    ) -> Result<RecordBatch> {
        self.require_branch(ref_name)?;
        let namespace = namespace.unwrap_or(&self.namespace);
        let tables = self.visible_tables(ref_name, namespace)?;
        if tables.is_empty() {
            warn!(ref_name, namespace, "query against a namespace with no tables");
        }
        self.engine.query(sql, tables).await
    }
}

/// Column names and types must line up for an append
fn check_compatible(table: &str, existing: &Schema, incoming: &Schema) -> Result<()> {
    let mismatch = |message: String| PlatformError::SchemaMismatch {
        table: table.to_string(),
        message,
    };

    if existing.fields().len() != incoming.fields().len() {
        return Err(mismatch(format!(
            "expected {} columns, got {}",
            existing.fields().len(),
            incoming.fields().len()
        )));
    }
    for (want, got) in existing.fields().iter().zip(incoming.fields()) {
        if want.name() != got.name() || want.data_type() != got.data_type() {
            return Err(mismatch(format!(
                "expected column {} {}, got {} {}",
                want.name(),
                want.data_type(),
                got.name(),
                got.data_type()
            )));
        }
    }
    Ok(())
}
