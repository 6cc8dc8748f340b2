//! # Platform
//!
//! 数据平台客户端模块。
//!
//! Responsibilities:
//! - Define the `DataPlatformClient` contract (branches, tables, runs, SQL)
//! - Persist branches and tables (`FsStore` on disk, `MemoryStore` in memory)
//! - Read CSV / Parquet sources
//! - Execute manifest pipelines against the step registry
//! - Provide `MockPlatformClient` with fault injection for tests

pub mod client;
pub mod engine;
pub mod error;
pub mod local;
pub mod mock;
pub mod runner;
pub mod source;
pub mod store;

pub use client::{DataPlatformClient, LocalDataPlatformClient, PlatformOp};
pub use engine::SqlEngine;
pub use error::{PlatformError, Result};
pub use local::LocalPlatform;
pub use mock::{MockConfig, MockPlatformClient};
pub use runner::PipelineRunner;
pub use source::{SourceFormat, SourceUri};
pub use store::{FsStore, MemoryStore, TableStore};
