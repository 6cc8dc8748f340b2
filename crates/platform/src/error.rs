//! Platform error types

use contracts::ContractError;
use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use thiserror::Error;
use transform::TransformError;

use crate::client::PlatformOp;

/// Data platform error
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Ref does not exist
    #[error("branch '{branch}' does not exist")]
    BranchNotFound { branch: String },

    /// Ref already exists
    #[error("branch '{branch}' already exists")]
    BranchExists { branch: String },

    /// Base ref cannot be deleted
    #[error("branch '{branch}' is the base ref and cannot be deleted")]
    ProtectedBranch { branch: String },

    /// Table missing from a branch
    #[error("table '{table}' not found on branch '{branch}'")]
    TableNotFound { table: String, branch: String },

    /// Table present and `replace` not requested
    #[error("table '{table}' already exists on branch '{branch}'")]
    TableExists { table: String, branch: String },

    /// Imported data does not fit the table
    #[error("schema mismatch importing into '{table}': {message}")]
    SchemaMismatch { table: String, message: String },

    /// Source location cannot be read by this platform
    #[error("unsupported source uri '{uri}': {reason}")]
    UnsupportedUri { uri: String, reason: String },

    /// Caller identity could not be determined
    #[error("cannot determine user identity: {message}")]
    Identity { message: String },

    /// Query planning or execution failed
    #[error("query failed: {0}")]
    Query(#[from] DataFusionError),

    /// Storage layer failure
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Failure injected by the mock client
    #[error("injected failure for {op:?}")]
    Injected { op: PlatformOp },

    /// Project manifest or plan error
    #[error("project error: {0}")]
    Project(#[from] TransformError),

    /// Contract error (names, config)
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Arrow error
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlatformError {
    pub fn branch_not_found(branch: impl Into<String>) -> Self {
        Self::BranchNotFound {
            branch: branch.into(),
        }
    }

    pub fn table_not_found(table: impl ToString, branch: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.to_string(),
            branch: branch.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn unsupported_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, PlatformError>;
