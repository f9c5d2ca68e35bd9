//! Dependency planner.
//!
//! Linearizes a resolved graph into an ordered deployment plan honoring
//! entity-kind precedence and explicit dependency declarations:
//!
//! 1. Packages, dependencies before dependents.
//! 2. Bindings, after the packages they live in.
//! 3. Actions, then sequences in topological order of their references.
//! 4. Triggers.
//! 5. Rules, after both their trigger and their action.
//! 6. API routes, after the actions backing them.
//!
//! Order is deterministic: declaration order, then name. Cycles in package
//! dependencies or sequence references abort planning; no partial plan is
//! ever returned.

use std::collections::HashMap;
use tracing::debug;

use crate::error::{PlanError, Result, StratusError};
use crate::graph::{EntityRef, ResolvedGraph, ResolvedPackage};

use super::plan::{DeploymentPlan, EntityKind, Operation, PlanStep};

/// Dependency planner producing ordered deployment plans.
#[derive(Debug, Default)]
pub struct Planner;

/// Node state during cycle-detecting depth-first traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

impl Planner {
    /// Creates a new planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the deployment plan for a resolved graph.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::CyclicDependency`] naming the cycle members when
    /// package dependencies or sequence references form a cycle, and
    /// [`PlanError::UnknownDependency`] when a dependency names an undeclared
    /// package.
    pub fn plan(&self, graph: &ResolvedGraph) -> Result<DeploymentPlan> {
        let package_order = package_topo_order(graph)?;
        let mut steps: Vec<PlanStep> = Vec::new();

        // Step index bookkeeping so later steps can cite the edges that
        // justified their position.
        let mut package_step: HashMap<String, usize> = HashMap::new();
        let mut invocable_step: HashMap<(String, String), usize> = HashMap::new();
        let mut trigger_step: HashMap<(String, String), usize> = HashMap::new();

        for &pkg_idx in &package_order {
            let package = &graph.packages[pkg_idx];
            let mut deps: Vec<usize> = package
                .dependencies
                .iter()
                .filter_map(|d| package_step.get(d).copied())
                .collect();
            deps.sort_unstable();

            package_step.insert(package.name.clone(), steps.len());
            steps.push(PlanStep {
                kind: EntityKind::Package,
                entity: EntityRef::new(&package.name, &package.name),
                operation: Operation::CreateOrUpdate,
                dependencies: deps,
            });
        }

        for &pkg_idx in &package_order {
            let package = &graph.packages[pkg_idx];
            let pkg_step = package_step[&package.name];
            for binding in &package.bindings {
                steps.push(PlanStep {
                    kind: EntityKind::Binding,
                    entity: EntityRef::new(&package.name, &binding.name),
                    operation: Operation::CreateOrUpdate,
                    dependencies: vec![pkg_step],
                });
            }
        }

        for &pkg_idx in &package_order {
            let package = &graph.packages[pkg_idx];
            let pkg_step = package_step[&package.name];
            for action in &package.actions {
                invocable_step.insert((package.name.clone(), action.name.clone()), steps.len());
                steps.push(PlanStep {
                    kind: EntityKind::Action,
                    entity: EntityRef::new(&package.name, &action.name),
                    operation: Operation::CreateOrUpdate,
                    dependencies: vec![pkg_step],
                });
            }
        }

        for &pkg_idx in &package_order {
            let package = &graph.packages[pkg_idx];
            let pkg_step = package_step[&package.name];
            for seq_idx in sequence_topo_order(package)? {
                let sequence = &package.sequences[seq_idx];
                let mut deps = vec![pkg_step];
                for component in &sequence.components {
                    if let Some(&idx) =
                        invocable_step.get(&(package.name.clone(), component.clone()))
                    {
                        deps.push(idx);
                    }
                }
                invocable_step.insert((package.name.clone(), sequence.name.clone()), steps.len());
                steps.push(PlanStep {
                    kind: EntityKind::Sequence,
                    entity: EntityRef::new(&package.name, &sequence.name),
                    operation: Operation::CreateOrUpdate,
                    dependencies: deps,
                });
            }
        }

        for &pkg_idx in &package_order {
            let package = &graph.packages[pkg_idx];
            let pkg_step = package_step[&package.name];
            for trigger in &package.triggers {
                trigger_step.insert((package.name.clone(), trigger.name.clone()), steps.len());
                steps.push(PlanStep {
                    kind: EntityKind::Trigger,
                    entity: EntityRef::new(&package.name, &trigger.name),
                    operation: Operation::CreateOrUpdate,
                    dependencies: vec![pkg_step],
                });
            }
        }

        for &pkg_idx in &package_order {
            let package = &graph.packages[pkg_idx];
            let pkg_step = package_step[&package.name];
            for rule in &package.rules {
                let mut deps = vec![pkg_step];
                if let Some(&idx) = trigger_step.get(&(package.name.clone(), rule.trigger.clone()))
                {
                    deps.push(idx);
                }
                if let Some(&idx) =
                    invocable_step.get(&(package.name.clone(), rule.action.clone()))
                {
                    deps.push(idx);
                }
                steps.push(PlanStep {
                    kind: EntityKind::Rule,
                    entity: EntityRef::new(&package.name, &rule.name),
                    operation: Operation::CreateOrUpdate,
                    dependencies: deps,
                });
            }
        }

        for &pkg_idx in &package_order {
            let package = &graph.packages[pkg_idx];
            let pkg_step = package_step[&package.name];
            for route in &package.apis {
                let mut deps = vec![pkg_step];
                if let Some(&idx) =
                    invocable_step.get(&(package.name.clone(), route.action.clone()))
                {
                    deps.push(idx);
                }
                steps.push(PlanStep {
                    kind: EntityKind::Api,
                    entity: EntityRef::new(&package.name, &route.api_name),
                    operation: Operation::CreateOrUpdate,
                    dependencies: deps,
                });
            }
        }

        debug!("Planned {} steps", steps.len());
        Ok(DeploymentPlan::new(steps))
    }
}

/// Topologically orders packages so dependencies precede dependents.
///
/// Declaration order is the tie-breaker: packages are visited in declaration
/// order and each package is emitted right after its dependencies.
fn package_topo_order(graph: &ResolvedGraph) -> Result<Vec<usize>> {
    let index_by_name: HashMap<&str, usize> = graph
        .packages
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.as_str(), i))
        .collect();

    for package in &graph.packages {
        for dep in &package.dependencies {
            if !index_by_name.contains_key(dep.as_str()) {
                return Err(StratusError::Plan(PlanError::UnknownDependency {
                    package: package.name.clone(),
                    dependency: dep.clone(),
                }));
            }
        }
    }

    let mut state = vec![VisitState::Unvisited; graph.packages.len()];
    let mut order = Vec::with_capacity(graph.packages.len());
    let mut path: Vec<usize> = Vec::new();

    for start in 0..graph.packages.len() {
        visit_package(start, graph, &index_by_name, &mut state, &mut path, &mut order)?;
    }

    Ok(order)
}

/// Depth-first visit for package ordering with cycle reporting.
fn visit_package(
    node: usize,
    graph: &ResolvedGraph,
    index_by_name: &HashMap<&str, usize>,
    state: &mut [VisitState],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<()> {
    match state[node] {
        VisitState::Done => return Ok(()),
        VisitState::InProgress => {
            return Err(cycle_error(
                path,
                node,
                |i| graph.packages[i].name.clone(),
            ));
        }
        VisitState::Unvisited => {}
    }

    state[node] = VisitState::InProgress;
    path.push(node);

    for dep in &graph.packages[node].dependencies {
        let dep_idx = index_by_name[dep.as_str()];
        visit_package(dep_idx, graph, index_by_name, state, path, order)?;
    }

    path.pop();
    state[node] = VisitState::Done;
    order.push(node);
    Ok(())
}

/// Topologically orders a package's sequences by their sequence-to-sequence
/// references, declaration order breaking ties.
fn sequence_topo_order(package: &ResolvedPackage) -> Result<Vec<usize>> {
    let index_by_name: HashMap<&str, usize> = package
        .sequences
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let mut state = vec![VisitState::Unvisited; package.sequences.len()];
    let mut order = Vec::with_capacity(package.sequences.len());
    let mut path: Vec<usize> = Vec::new();

    for start in 0..package.sequences.len() {
        visit_sequence(start, package, &index_by_name, &mut state, &mut path, &mut order)?;
    }

    Ok(order)
}

/// Depth-first visit for sequence ordering with cycle reporting.
fn visit_sequence(
    node: usize,
    package: &ResolvedPackage,
    index_by_name: &HashMap<&str, usize>,
    state: &mut [VisitState],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<()> {
    match state[node] {
        VisitState::Done => return Ok(()),
        VisitState::InProgress => {
            return Err(cycle_error(path, node, |i| {
                format!("{}/{}", package.name, package.sequences[i].name)
            }));
        }
        VisitState::Unvisited => {}
    }

    state[node] = VisitState::InProgress;
    path.push(node);

    for component in &package.sequences[node].components {
        if let Some(&comp_idx) = index_by_name.get(component.as_str()) {
            visit_sequence(comp_idx, package, index_by_name, state, path, order)?;
        }
    }

    path.pop();
    state[node] = VisitState::Done;
    order.push(node);
    Ok(())
}

/// Builds a [`PlanError::CyclicDependency`] from the traversal path,
/// starting at the first occurrence of the repeated node.
fn cycle_error(path: &[usize], repeated: usize, name_of: impl Fn(usize) -> String) -> StratusError {
    let start = path.iter().position(|&n| n == repeated).unwrap_or(0);
    let mut members: Vec<String> = path[start..].iter().map(|&n| name_of(n)).collect();
    members.push(name_of(repeated));
    StratusError::Plan(PlanError::CyclicDependency { members })
}
