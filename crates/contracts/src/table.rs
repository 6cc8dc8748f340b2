//! Table and branch references
//!
//! Tables are addressed as `name` or `namespace.name`; branches by a flat
//! name that may contain dots (`alice.taxi_zones`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Namespace used when a table reference carries none
pub const DEFAULT_NAMESPACE: &str = "bauplan";

/// Base branch every pipeline branch forks from and merges into
pub const DEFAULT_BASE_REF: &str = "main";

/// Fully qualified table reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub namespace: String,
    pub name: String,
}

impl TableRef {
    /// Create a reference in an explicit namespace
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse `name` or `namespace.name`, filling in `default_namespace`
    pub fn parse(raw: &str, default_namespace: &str) -> Result<Self, ContractError> {
        let (namespace, name) = match raw.split_once('.') {
            Some((ns, name)) => (ns, name),
            None => (default_namespace, raw),
        };
        validate_identifier("namespace", namespace)?;
        validate_identifier("table", name)?;
        Ok(Self::new(namespace, name))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Output materialization policy of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Materialization {
    /// Each run fully overwrites the previous output
    #[default]
    Replace,
}

/// Validate a SQL-safe identifier (table, namespace, column)
///
/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_identifier(kind: &'static str, name: &str) -> Result<(), ContractError> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(ContractError::invalid_name(kind, name, "must not be empty")),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err(ContractError::invalid_name(
                kind,
                name,
                "must start with a letter or underscore",
            ))
        }
        _ => {}
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(ContractError::invalid_name(
            kind,
            name,
            format!("unexpected character '{bad}'"),
        ));
    }
    Ok(())
}

/// Validate a branch name
///
/// Branch names become directory names in the local warehouse, so path
/// separators and parent references are rejected.
pub fn validate_branch_name(name: &str) -> Result<(), ContractError> {
    if name.is_empty() {
        return Err(ContractError::invalid_name("branch", name, "must not be empty"));
    }
    if name.starts_with('.') || name.contains("..") {
        return Err(ContractError::invalid_name(
            "branch",
            name,
            "must not start with '.' or contain '..'",
        ));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(ContractError::invalid_name(
            "branch",
            name,
            format!("unexpected character '{bad}'"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_table_uses_default_namespace() {
        let table = TableRef::parse("my_child", DEFAULT_NAMESPACE).unwrap();
        assert_eq!(table.namespace, "bauplan");
        assert_eq!(table.name, "my_child");
        assert_eq!(table.to_string(), "bauplan.my_child");
    }

    #[test]
    fn test_parse_qualified_table() {
        let table = TableRef::parse("raw.taxi_fhvhv", DEFAULT_NAMESPACE).unwrap();
        assert_eq!(table, TableRef::new("raw", "taxi_fhvhv"));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(validate_identifier("table", "taxi_metadata").is_ok());
        assert!(validate_identifier("table", "_tmp1").is_ok());
        assert!(validate_identifier("table", "").is_err());
        assert!(validate_identifier("table", "1abc").is_err());
        assert!(validate_identifier("table", "drop;table").is_err());
    }

    #[test]
    fn test_branch_name_rules() {
        assert!(validate_branch_name("alice.taxi_zones_prefect").is_ok());
        assert!(validate_branch_name("main").is_ok());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("../etc").is_err());
        assert!(validate_branch_name("alice/feature").is_err());
    }
}
