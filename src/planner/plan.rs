//! Deployment plan types.
//!
//! A plan is an ordered list of steps derived from a resolved graph. Plans
//! are immutable once constructed; deploy consumes them front to back,
//! undeploy consumes the reversed, relabeled form.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::graph::EntityRef;

/// Entity kinds, in deploy precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    /// A package.
    Package,
    /// A binding importing another package under a local alias.
    Binding,
    /// An action.
    Action,
    /// A sequence of actions.
    Sequence,
    /// A trigger.
    Trigger,
    /// A rule binding a trigger to an action.
    Rule,
    /// An API gateway route.
    Api,
}

/// The operation a plan step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    /// Create the entity, or update it in place if it already exists.
    CreateOrUpdate,
    /// Delete the entity if it exists.
    Delete,
}

/// A single step of a deployment plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity reference.
    pub entity: EntityRef,
    /// Operation to perform.
    pub operation: Operation,
    /// Indices of earlier steps that justified this step's position.
    pub dependencies: Vec<usize>,
}

/// An ordered, dependency-respecting deployment plan.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentPlan {
    /// When the plan was constructed.
    pub created_at: DateTime<Utc>,
    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
}

impl DeploymentPlan {
    /// Creates a plan from ordered steps.
    #[must_use]
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            created_at: Utc::now(),
            steps,
        }
    }

    /// Returns true if the plan has no steps.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the number of steps.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns the index of the step for the given entity, if planned.
    #[must_use]
    pub fn index_of(&self, kind: EntityKind, package: &str, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| {
            s.kind == kind && s.entity.package == package && s.entity.name == name
        })
    }

    /// Returns the `(kind, package, name)` triple of every step, in order.
    ///
    /// Used to compare plans structurally regardless of timestamps.
    #[must_use]
    pub fn entity_order(&self) -> Vec<(EntityKind, String, String)> {
        self.steps
            .iter()
            .map(|s| (s.kind, s.entity.package.clone(), s.entity.name.clone()))
            .collect()
    }
}

impl PlanStep {
    /// Returns a human-readable description of the step.
    #[must_use]
    pub fn description(&self) -> String {
        format!("{} {} '{}'", self.operation, self.kind, self.entity)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Package => "package",
            Self::Binding => "binding",
            Self::Action => "action",
            Self::Sequence => "sequence",
            Self::Trigger => "trigger",
            Self::Rule => "rule",
            Self::Api => "api",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateOrUpdate => write!(f, "deploy"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

impl std::fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "Nothing to do");
        }

        writeln!(f, "Deployment Plan ({} steps):", self.steps.len())?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {i}. {}", step.description())?;
        }
        Ok(())
    }
}
