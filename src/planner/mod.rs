//! Deployment planning and plan execution.

pub mod executor;
pub mod order;
pub mod plan;
pub mod teardown;

pub use executor::{ExecutionReport, PlanExecutor, StepOutcome, StepResult};
pub use order::Planner;
pub use plan::{DeploymentPlan, EntityKind, Operation, PlanStep};
pub use teardown::{plan_undeploy, reverse_plan};
