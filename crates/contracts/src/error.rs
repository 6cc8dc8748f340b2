//! Layered error definitions
//!
//! Categorized by source: config / manifest / reference

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Manifest Errors =====
    /// Project manifest is malformed or inconsistent
    #[error("manifest error in model '{model}': {message}")]
    Manifest { model: String, message: String },

    // ===== Reference Errors =====
    /// Table or branch name is not a valid identifier
    #[error("invalid {kind} name '{name}': {message}")]
    InvalidName {
        kind: &'static str,
        name: String,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create manifest error
    pub fn manifest(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Manifest {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create invalid-name error
    pub fn invalid_name(
        kind: &'static str,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidName {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }
}
