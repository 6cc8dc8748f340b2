//! Named pure-function registry
//!
//! Each transformation step is a plain `fn` registered under the name the
//! project manifest refers to. Inputs and materialization live in the
//! manifest; the registry only maps names to code.

use std::collections::BTreeMap;

use datafusion::arrow::record_batch::RecordBatch;

use crate::error::{Result, TransformError};
use crate::steps;

/// A transformation step: named inputs in, one batch out
pub type StepFn = fn(&StepInputs) -> Result<RecordBatch>;

/// Named inputs handed to a step
#[derive(Debug, Clone)]
pub struct StepInputs {
    model: String,
    batches: BTreeMap<String, RecordBatch>,
}

impl StepInputs {
    /// Create an empty input set for `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            batches: BTreeMap::new(),
        }
    }

    /// Add an input (builder style)
    pub fn with(mut self, param: impl Into<String>, batch: RecordBatch) -> Self {
        self.insert(param, batch);
        self
    }

    /// Add an input
    pub fn insert(&mut self, param: impl Into<String>, batch: RecordBatch) {
        self.batches.insert(param.into(), batch);
    }

    /// Look up an input by parameter name
    pub fn get(&self, param: &str) -> Result<&RecordBatch> {
        self.batches
            .get(param)
            .ok_or_else(|| TransformError::MissingInput {
                model: self.model.clone(),
                param: param.to_string(),
            })
    }

    /// Model these inputs belong to
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Registry of step functions by name
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    steps: BTreeMap<String, StepFn>,
}

impl StepRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the taxi-zone steps
    pub fn builtin() -> Self {
        Self::new()
            .register(steps::JOIN_TRIPS_ZONES, steps::join_trips_zones)
            .register(steps::FILTER_POSITIVE_MILES, steps::filter_positive_miles)
    }

    /// Register a step (builder style); a later registration replaces an earlier one
    pub fn register(mut self, name: impl Into<String>, step: StepFn) -> Self {
        self.steps.insert(name.into(), step);
        self
    }

    /// Look up a step by name
    pub fn get(&self, name: &str) -> Option<StepFn> {
        self.steps.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }
}
