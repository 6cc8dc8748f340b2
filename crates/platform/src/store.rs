//! Table storage
//!
//! A store keeps, per branch, a set of tables (one record batch each).
//! Branch creation copies every table of the source ref; there is no
//! copy-on-write and no commit history.
//!
//! - `MemoryStore`: process-local, used by the mock client and tests
//! - `FsStore`: Arrow IPC files under `<root>/refs/<branch>/<namespace>/<table>.arrow`

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use contracts::{validate_branch_name, TableRef};
use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::ipc::reader::FileReader;
use datafusion::arrow::ipc::writer::FileWriter;
use datafusion::arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::error::{PlatformError, Result};

const TABLE_EXTENSION: &str = "arrow";

/// Branch-scoped table storage
pub trait TableStore: Send + Sync {
    /// Check if a branch exists
    fn branch_exists(&self, branch: &str) -> Result<bool>;

    /// All branch names, sorted
    fn list_branches(&self) -> Result<Vec<String>>;

    /// Create an empty branch if it is missing
    fn ensure_branch(&self, branch: &str) -> Result<()>;

    /// Create `branch` as a copy of `from`
    fn create_branch(&self, branch: &str, from: &str) -> Result<()>;

    /// Delete a branch and all its tables
    fn delete_branch(&self, branch: &str) -> Result<()>;

    /// Tables on a branch, sorted
    fn list_tables(&self, branch: &str) -> Result<Vec<TableRef>>;

    /// Read a table; `None` when absent
    fn read_table(&self, branch: &str, table: &TableRef) -> Result<Option<RecordBatch>>;

    /// Write (replace) a table
    fn write_table(&self, branch: &str, table: &TableRef, batch: &RecordBatch) -> Result<()>;
}

type Branches = BTreeMap<String, BTreeMap<TableRef, RecordBatch>>;

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    branches: Mutex<Branches>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Branches>> {
        self.branches
            .lock()
            .map_err(|_| PlatformError::storage("memory store lock poisoned"))
    }
}

impl TableStore for MemoryStore {
    fn branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(branch))
    }

    fn list_branches(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn ensure_branch(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        self.lock()?.entry(branch.to_string()).or_default();
        Ok(())
    }

    fn create_branch(&self, branch: &str, from: &str) -> Result<()> {
        validate_branch_name(branch)?;
        let mut branches = self.lock()?;
        if branches.contains_key(branch) {
            return Err(PlatformError::BranchExists {
                branch: branch.to_string(),
            });
        }
        let tables = branches
            .get(from)
            .cloned()
            .ok_or_else(|| PlatformError::branch_not_found(from))?;
        branches.insert(branch.to_string(), tables);
        Ok(())
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        self.lock()?
            .remove(branch)
            .map(|_| ())
            .ok_or_else(|| PlatformError::branch_not_found(branch))
    }

    fn list_tables(&self, branch: &str) -> Result<Vec<TableRef>> {
        let branches = self.lock()?;
        let tables = branches
            .get(branch)
            .ok_or_else(|| PlatformError::branch_not_found(branch))?;
        Ok(tables.keys().cloned().collect())
    }

    fn read_table(&self, branch: &str, table: &TableRef) -> Result<Option<RecordBatch>> {
        let branches = self.lock()?;
        let tables = branches
            .get(branch)
            .ok_or_else(|| PlatformError::branch_not_found(branch))?;
        Ok(tables.get(table).cloned())
    }

    fn write_table(&self, branch: &str, table: &TableRef, batch: &RecordBatch) -> Result<()> {
        let mut branches = self.lock()?;
        let tables = branches
            .get_mut(branch)
            .ok_or_else(|| PlatformError::branch_not_found(branch))?;
        tables.insert(table.clone(), batch.clone());
        Ok(())
    }
}

/// Filesystem store (Arrow IPC files)
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) a warehouse at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("refs"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn branch_dir(&self, branch: &str) -> Result<PathBuf> {
        validate_branch_name(branch)?;
        Ok(self.root.join("refs").join(branch))
    }

    fn table_path(&self, branch: &str, table: &TableRef) -> Result<PathBuf> {
        Ok(self
            .branch_dir(branch)?
            .join(&table.namespace)
            .join(format!("{}.{}", table.name, TABLE_EXTENSION)))
    }

    fn existing_branch_dir(&self, branch: &str) -> Result<PathBuf> {
        let dir = self.branch_dir(branch)?;
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(PlatformError::branch_not_found(branch))
        }
    }
}

impl TableStore for FsStore {
    fn branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.branch_dir(branch)?.is_dir())
    }

    fn list_branches(&self) -> Result<Vec<String>> {
        let mut branches = Vec::new();
        for entry in fs::read_dir(self.root.join("refs"))? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                branches.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        branches.sort();
        Ok(branches)
    }

    fn ensure_branch(&self, branch: &str) -> Result<()> {
        fs::create_dir_all(self.branch_dir(branch)?)?;
        Ok(())
    }

    fn create_branch(&self, branch: &str, from: &str) -> Result<()> {
        let target = self.branch_dir(branch)?;
        if target.exists() {
            return Err(PlatformError::BranchExists {
                branch: branch.to_string(),
            });
        }
        let source = self.existing_branch_dir(from)?;
        copy_dir(&source, &target)?;
        debug!(branch, from, "branch directory copied");
        Ok(())
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        let dir = self.existing_branch_dir(branch)?;
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    fn list_tables(&self, branch: &str) -> Result<Vec<TableRef>> {
        let dir = self.existing_branch_dir(branch)?;
        let mut tables = Vec::new();
        for ns in fs::read_dir(dir)? {
            let ns = ns?;
            if !ns.file_type()?.is_dir() {
                continue;
            }
            let namespace = ns.file_name().to_string_lossy().into_owned();
            for file in fs::read_dir(ns.path())? {
                let path = file?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXTENSION) {
                    continue;
                }
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    tables.push(TableRef::new(namespace.clone(), name));
                }
            }
        }
        tables.sort();
        Ok(tables)
    }

    fn read_table(&self, branch: &str, table: &TableRef) -> Result<Option<RecordBatch>> {
        self.existing_branch_dir(branch)?;
        let path = self.table_path(branch, table)?;
        if !path.exists() {
            return Ok(None);
        }

        let reader = FileReader::try_new(File::open(&path)?, None)?;
        let schema = reader.schema();
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Some(concat_batches(&schema, &batches)?))
    }

    fn write_table(&self, branch: &str, table: &TableRef, batch: &RecordBatch) -> Result<()> {
        self.existing_branch_dir(branch)?;
        let path = self.table_path(branch, table)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // write-then-rename so readers never see a half-written table
        let tmp = path.with_extension("arrow.tmp");
        {
            let mut writer = FileWriter::try_new(File::create(&tmp)?, &batch.schema())?;
            writer.write(batch)?;
            writer.finish()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(branch, table = %table, rows = batch.num_rows(), "table written");
        Ok(())
    }
}

fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
