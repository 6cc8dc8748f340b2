//! Transform error types

use datafusion::arrow::datatypes::DataType;
use datafusion::arrow::error::ArrowError;
use thiserror::Error;

/// Transformation step and planning errors
#[derive(Debug, Error)]
pub enum TransformError {
    /// A step asked for an input parameter that was not provided
    #[error("model '{model}' has no input named '{param}'")]
    MissingInput { model: String, param: String },

    /// A required column is absent from an input batch
    #[error("column '{column}' not found in input '{input}'")]
    MissingColumn { column: String, input: String },

    /// A column has a type the step cannot operate on
    #[error("column '{column}' has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: DataType },

    /// Manifest references a function that is not registered
    #[error("model '{model}' uses unknown function '{function}'")]
    UnknownFunction { model: String, function: String },

    /// Two models share a name
    #[error("duplicate model '{model}'")]
    DuplicateModel { model: String },

    /// Model dependencies form a cycle
    #[error("dependency cycle between models: {models:?}")]
    DependencyCycle { models: Vec<String> },

    /// Arrow compute error
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl TransformError {
    pub fn missing_column(column: impl Into<String>, input: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
            input: input.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, TransformError>;
