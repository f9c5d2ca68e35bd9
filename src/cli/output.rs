//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plans, reports,
//! and validation summaries to the user in text or JSON form.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::graph::ResolvedGraph;
use crate::planner::{DeploymentPlan, ExecutionReport, Operation, StepOutcome};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan step row for table display.
#[derive(Tabled)]
struct PlanStepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Entity")]
    entity: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &DeploymentPlan) -> String {
        if plan.is_empty() {
            return format!("{} Nothing to do - the manifest declares no entities.\n", "✓".green());
        }

        let mut output = String::new();
        let _ = writeln!(output, "\nDeployment Plan ({} steps)\n", plan.len());

        let rows: Vec<PlanStepRow> = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| PlanStepRow {
                index: i + 1,
                operation: Self::format_operation(step.operation),
                kind: step.kind.to_string(),
                entity: step.entity.qualified(),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let deploys = plan
            .steps
            .iter()
            .filter(|s| s.operation == Operation::CreateOrUpdate)
            .count();
        let deletes = plan.len() - deploys;
        let _ = write!(
            output,
            "\nPlan: {} to deploy, {} to delete\n",
            deploys.to_string().green(),
            deletes.to_string().red()
        );

        output
    }

    /// Formats an execution report for display.
    #[must_use]
    pub fn format_report(&self, report: &ExecutionReport) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "completed": report.completed,
                    "failed": report.failed,
                    "unattempted": report.unattempted,
                    "aborted": report.aborted,
                    "success": report.success,
                    "steps": report
                        .results
                        .iter()
                        .map(|r| serde_json::json!({
                            "index": r.index,
                            "entity": r.step.entity.qualified(),
                            "outcome": Self::outcome_name(&r.outcome),
                            "error": r.error,
                        }))
                        .collect::<Vec<_>>(),
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats an execution report as text.
    fn format_report_text(report: &ExecutionReport) -> String {
        let mut output = String::new();

        for result in &report.results {
            let marker = match result.outcome {
                StepOutcome::Created => "+".green().to_string(),
                StepOutcome::Updated => "~".yellow().to_string(),
                StepOutcome::Deleted => "-".red().to_string(),
                StepOutcome::AlreadyAbsent => "·".dimmed().to_string(),
                StepOutcome::Failed => "✗".red().to_string(),
            };
            let _ = writeln!(
                output,
                "  {marker} {} {} '{}'",
                Self::outcome_name(&result.outcome),
                result.step.kind,
                result.step.entity
            );
            if let Some(error) = &result.error {
                let _ = writeln!(output, "      {error}");
            }
        }

        let status = if report.success {
            "✓".green().to_string()
        } else {
            "✗".red().to_string()
        };
        let _ = write!(output, "\n{status} {report}\n");
        output
    }

    /// Formats a validation summary.
    #[must_use]
    pub fn format_summary(&self, graph: &ResolvedGraph) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "project": graph.project_name,
                    "packages": graph.packages.len(),
                    "entities": graph.entity_count(),
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Documents are valid.\n\n", "✓".green());
                if let Some(name) = &graph.project_name {
                    let _ = writeln!(output, "  Project: {name}");
                }
                let _ = writeln!(output, "  Packages: {}", graph.packages.len());
                let _ = writeln!(output, "  Entities: {}", graph.entity_count());
                output
            }
        }
    }

    /// Formats an operation with color.
    fn format_operation(operation: Operation) -> String {
        match operation {
            Operation::CreateOrUpdate => "+deploy".green().to_string(),
            Operation::Delete => "-delete".red().to_string(),
        }
    }

    const fn outcome_name(outcome: &StepOutcome) -> &'static str {
        match outcome {
            StepOutcome::Created => "created",
            StepOutcome::Updated => "updated",
            StepOutcome::Deleted => "deleted",
            StepOutcome::AlreadyAbsent => "absent",
            StepOutcome::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityRef;
    use crate::planner::{EntityKind, PlanStep};

    fn sample_plan() -> DeploymentPlan {
        DeploymentPlan::new(vec![
            PlanStep {
                kind: EntityKind::Package,
                entity: EntityRef::new("greeting", "greeting"),
                operation: Operation::CreateOrUpdate,
                dependencies: vec![],
            },
            PlanStep {
                kind: EntityKind::Action,
                entity: EntityRef::new("greeting", "hello"),
                operation: Operation::CreateOrUpdate,
                dependencies: vec![0],
            },
        ])
    }

    #[test]
    fn test_text_plan_lists_entities() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let text = formatter.format_plan(&sample_plan());
        assert!(text.contains("greeting/hello"));
        assert!(text.contains("2 to deploy"));
    }

    #[test]
    fn test_json_plan_is_valid_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json = formatter.format_plan(&sample_plan());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["steps"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_plan_message() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let text = formatter.format_plan(&DeploymentPlan::new(vec![]));
        assert!(text.contains("Nothing to do"));
    }
}
