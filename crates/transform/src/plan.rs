//! Execution planning
//!
//! Resolves manifest models against the registry and orders them so every
//! model runs after the models it reads from. Order comes from declared
//! inputs only; manifest position merely breaks ties.

use std::collections::{BTreeSet, HashMap};

use contracts::{ModelSpec, ProjectManifest};

use crate::error::{Result, TransformError};
use crate::registry::{StepFn, StepRegistry};

/// A model bound to its step function
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub model: ModelSpec,
    pub function: StepFn,
    /// Upstream models this step reads
    pub depends_on: Vec<String>,
}

impl PlannedStep {
    pub fn name(&self) -> &str {
        &self.model.name
    }
}

/// Ordered list of steps for one project
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    project: String,
    steps: Vec<PlannedStep>,
}

impl ExecutionPlan {
    /// Build a plan from a manifest
    ///
    /// # Errors
    /// - duplicate model names
    /// - functions missing from the registry
    /// - dependency cycles (including self-reads)
    pub fn build(manifest: &ProjectManifest, registry: &StepRegistry) -> Result<Self> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, model) in manifest.models.iter().enumerate() {
            if index.insert(model.name.as_str(), i).is_some() {
                return Err(TransformError::DuplicateModel {
                    model: model.name.clone(),
                });
            }
        }

        let mut functions = Vec::with_capacity(manifest.models.len());
        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(manifest.models.len());
        for model in &manifest.models {
            let function =
                registry
                    .get(&model.function)
                    .ok_or_else(|| TransformError::UnknownFunction {
                        model: model.name.clone(),
                        function: model.function.clone(),
                    })?;
            functions.push(function);

            let mut upstream: Vec<usize> = model
                .inputs
                .iter()
                .filter_map(|input| index.get(input.table.as_str()).copied())
                .collect();
            upstream.sort_unstable();
            upstream.dedup();
            deps.push(upstream);
        }

        // Kahn's algorithm; the ready set is ordered by manifest position
        let mut remaining: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); deps.len()];
        for (model, upstream) in deps.iter().enumerate() {
            for &u in upstream {
                dependents[u].push(model);
            }
        }

        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, n)| **n == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(deps.len());
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &d in &dependents[next] {
                remaining[d] -= 1;
                if remaining[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if order.len() != deps.len() {
            let models = remaining
                .iter()
                .enumerate()
                .filter(|(_, n)| **n > 0)
                .map(|(i, _)| manifest.models[i].name.clone())
                .collect();
            return Err(TransformError::DependencyCycle { models });
        }

        let steps = order
            .into_iter()
            .map(|i| PlannedStep {
                model: manifest.models[i].clone(),
                function: functions[i],
                depends_on: deps[i]
                    .iter()
                    .map(|&u| manifest.models[u].name.clone())
                    .collect(),
            })
            .collect();

        Ok(Self {
            project: manifest.project.name.clone(),
            steps,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    /// Tables read by the plan that no model produces
    pub fn source_tables(&self) -> BTreeSet<&str> {
        let produced: BTreeSet<&str> = self.steps.iter().map(PlannedStep::name).collect();
        self.steps
            .iter()
            .flat_map(|s| s.model.inputs.iter().map(|i| i.table.as_str()))
            .filter(|t| !produced.contains(t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Materialization, ModelInput, ProjectInfo};

    fn model(name: &str, function: &str, inputs: &[(&str, &str)]) -> ModelSpec {
        ModelSpec {
            name: name.into(),
            function: function.into(),
            materialization: Materialization::Replace,
            inputs: inputs
                .iter()
                .map(|(param, table)| ModelInput::table(*param, *table))
                .collect(),
        }
    }

    fn manifest(models: Vec<ModelSpec>) -> ProjectManifest {
        ProjectManifest {
            project: ProjectInfo {
                name: "taxi_zones".into(),
                description: None,
            },
            models,
        }
    }

    #[test]
    fn test_order_follows_dependencies_not_position() {
        // child declared first
        let manifest = manifest(vec![
            model("my_child", "filter_positive_miles", &[("my_trips", "my_parent")]),
            model(
                "my_parent",
                "join_trips_zones",
                &[("trips", "taxi_fhvhv"), ("zones", "taxi_metadata")],
            ),
        ]);

        let plan = ExecutionPlan::build(&manifest, &StepRegistry::builtin()).unwrap();
        let names: Vec<_> = plan.steps().iter().map(PlannedStep::name).collect();
        assert_eq!(names, vec!["my_parent", "my_child"]);
        assert_eq!(plan.steps()[1].depends_on, vec!["my_parent".to_string()]);
        assert_eq!(
            plan.source_tables().into_iter().collect::<Vec<_>>(),
            vec!["taxi_fhvhv", "taxi_metadata"]
        );
    }

    #[test]
    fn test_unknown_function() {
        let manifest = manifest(vec![model("a", "no_such_step", &[])]);
        let err = ExecutionPlan::build(&manifest, &StepRegistry::builtin()).unwrap_err();
        assert!(matches!(err, TransformError::UnknownFunction { .. }));
    }

    #[test]
    fn test_cycle_detected() {
        let manifest = manifest(vec![
            model("a", "filter_positive_miles", &[("my_trips", "b")]),
            model("b", "filter_positive_miles", &[("my_trips", "a")]),
            model("c", "filter_positive_miles", &[("my_trips", "raw")]),
        ]);
        let err = ExecutionPlan::build(&manifest, &StepRegistry::builtin()).unwrap_err();
        match err {
            TransformError::DependencyCycle { models } => {
                assert_eq!(models, vec!["a".to_string(), "b".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let manifest = manifest(vec![model("a", "filter_positive_miles", &[("my_trips", "a")])]);
        let err = ExecutionPlan::build(&manifest, &StepRegistry::builtin()).unwrap_err();
        assert!(matches!(err, TransformError::DependencyCycle { .. }));
    }

    #[test]
    fn test_duplicate_model() {
        let manifest = manifest(vec![
            model("a", "filter_positive_miles", &[]),
            model("a", "filter_positive_miles", &[]),
        ]);
        let err = ExecutionPlan::build(&manifest, &StepRegistry::builtin()).unwrap_err();
        assert!(matches!(err, TransformError::DuplicateModel { .. }));
    }
}
