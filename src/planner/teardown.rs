//! Teardown planner.
//!
//! An undeployment plan is the exact reverse of the deployment plan for the
//! same graph, with every step relabeled as a delete. Reversing preserves
//! the dependency property in the opposite direction: nothing is deleted
//! before everything that depends on it.

use tracing::debug;

use crate::error::Result;
use crate::graph::ResolvedGraph;

use super::order::Planner;
use super::plan::{DeploymentPlan, Operation, PlanStep};

/// Builds the undeployment plan for a resolved graph.
///
/// # Errors
///
/// Fails for the same reasons deployment planning does; an undeployable
/// graph is never partially torn down.
pub fn plan_undeploy(graph: &ResolvedGraph) -> Result<DeploymentPlan> {
    let forward = Planner::new().plan(graph)?;
    Ok(reverse_plan(&forward))
}

/// Reverses a deployment plan into its undeployment form.
///
/// Step dependency indices are remapped so they still point at the steps
/// they pointed at before reversal.
#[must_use]
pub fn reverse_plan(forward: &DeploymentPlan) -> DeploymentPlan {
    let last = forward.steps.len().saturating_sub(1);
    let steps: Vec<PlanStep> = forward
        .steps
        .iter()
        .rev()
        .map(|step| PlanStep {
            kind: step.kind,
            entity: step.entity.clone(),
            operation: Operation::Delete,
            dependencies: step.dependencies.iter().map(|&d| last - d).collect(),
        })
        .collect();

    debug!("Reversed plan into {} delete steps", steps.len());
    DeploymentPlan::new(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Merger;
    use crate::manifest::ManifestParser;
    use crate::planner::plan::EntityKind;
    use std::path::Path;

    fn graph_from(yaml: &str) -> ResolvedGraph {
        let manifest = ManifestParser::new()
            .parse_manifest_str(yaml, Path::new("manifest.yaml"))
            .unwrap();
        Merger::new().merge(&manifest, None).unwrap()
    }

    const EXAMPLE: &str = r"
packages:
  greeting:
    actions:
      hello:
        function: src/hello.js
    sequences:
      pipeline:
        actions: hello
    triggers:
      gong: {}
    rules:
      on-gong:
        trigger: gong
        action: hello
";

    #[test]
    fn test_undeploy_is_reversed_deploy() {
        let graph = graph_from(EXAMPLE);
        let deploy = Planner::new().plan(&graph).unwrap();
        let undeploy = plan_undeploy(&graph).unwrap();

        let mut reversed = deploy.entity_order();
        reversed.reverse();
        assert_eq!(undeploy.entity_order(), reversed);
    }

    #[test]
    fn test_all_steps_relabeled_delete() {
        let graph = graph_from(EXAMPLE);
        let undeploy = plan_undeploy(&graph).unwrap();

        assert!(!undeploy.is_empty());
        assert!(undeploy
            .steps
            .iter()
            .all(|s| s.operation == Operation::Delete));
    }

    #[test]
    fn test_rule_deleted_before_trigger_and_action() {
        let graph = graph_from(EXAMPLE);
        let undeploy = plan_undeploy(&graph).unwrap();

        let rule = undeploy
            .index_of(EntityKind::Rule, "greeting", "on-gong")
            .unwrap();
        let trigger = undeploy
            .index_of(EntityKind::Trigger, "greeting", "gong")
            .unwrap();
        let action = undeploy
            .index_of(EntityKind::Action, "greeting", "hello")
            .unwrap();

        assert!(rule < trigger);
        assert!(rule < action);
    }

    #[test]
    fn test_package_deleted_last() {
        let graph = graph_from(EXAMPLE);
        let undeploy = plan_undeploy(&graph).unwrap();

        let pkg = undeploy
            .index_of(EntityKind::Package, "greeting", "greeting")
            .unwrap();
        assert_eq!(pkg, undeploy.len() - 1);
    }

    #[test]
    fn test_dependency_indices_remapped() {
        let graph = graph_from(EXAMPLE);
        let undeploy = plan_undeploy(&graph).unwrap();

        // Every remapped index must still be a valid step position.
        for step in &undeploy.steps {
            for &dep in &step.dependencies {
                assert!(dep < undeploy.len());
            }
        }
    }
}
