//! Plan executor.
//!
//! Walks a plan front to back against a [`RemoteClient`], turning each step
//! into an idempotent create-or-update or delete. Execution is fail-fast:
//! the first failing step stops the run, and the report accounts for every
//! step as completed, failed, or unattempted so the caller can resume
//! manually.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::content::ContentReader;
use crate::error::{RemoteError, Result, StratusError};
use crate::graph::{ResolvedGraph, ResolvedPackage};
use crate::remote::{key_values, Collection, EntityAddress, EntityPayload, FeedLifecycle, RemoteClient};

use super::plan::{DeploymentPlan, EntityKind, Operation, PlanStep};

/// What happened to a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The entity did not exist and was created.
    Created,
    /// The entity existed and was updated in place.
    Updated,
    /// The entity existed and was deleted.
    Deleted,
    /// A delete step found the entity already absent.
    AlreadyAbsent,
    /// The step failed; execution stopped here.
    Failed,
}

/// Result of executing a single step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Step index within the plan.
    pub index: usize,
    /// The step that was executed.
    pub step: PlanStep,
    /// What happened.
    pub outcome: StepOutcome,
    /// Error message when the step failed.
    pub error: Option<String>,
}

/// Result of executing a whole plan.
#[derive(Debug)]
pub struct ExecutionReport {
    /// Per-step results, in execution order.
    pub results: Vec<StepResult>,
    /// Steps that completed.
    pub completed: usize,
    /// Steps that failed (at most one, execution is fail-fast).
    pub failed: usize,
    /// Steps never attempted because an earlier step failed or the run was
    /// aborted.
    pub unattempted: usize,
    /// Whether the run stopped because the abort flag was raised.
    pub aborted: bool,
    /// Whether every step completed.
    pub success: bool,
}

/// Executes deployment plans against the platform.
pub struct PlanExecutor<'a> {
    /// Remote platform client.
    client: &'a dyn RemoteClient,
    /// The resolved graph steps draw their payloads from.
    graph: &'a ResolvedGraph,
    /// Action source loader.
    content: ContentReader,
    /// Raised externally to stop the run between steps.
    abort: Arc<AtomicBool>,
}

impl<'a> PlanExecutor<'a> {
    /// Creates a new executor.
    #[must_use]
    pub fn new(client: &'a dyn RemoteClient, graph: &'a ResolvedGraph, content: ContentReader) -> Self {
        Self {
            client,
            graph,
            content,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a handle that aborts the run when set.
    ///
    /// The flag is checked between steps; the in-flight step always runs to
    /// completion so no entity is left half-written.
    #[must_use]
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Executes a plan front to back.
    ///
    /// Step failures are reported, not returned: the `Err` path is reserved
    /// for malformed plans referencing entities absent from the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if a step references an entity the graph does not
    /// contain.
    pub async fn execute(&self, plan: &DeploymentPlan) -> Result<ExecutionReport> {
        info!("Executing plan with {} steps", plan.len());

        let mut results = Vec::with_capacity(plan.len());
        let mut completed = 0;
        let mut failed = 0;
        let mut aborted = false;

        for (index, step) in plan.steps.iter().enumerate() {
            if self.abort.load(Ordering::SeqCst) {
                warn!("Abort requested, stopping before step {index}");
                aborted = true;
                break;
            }

            info!("Step {index}: {}", step.description());
            match self.execute_step(step).await {
                Ok(outcome) => {
                    completed += 1;
                    results.push(StepResult {
                        index,
                        step: step.clone(),
                        outcome,
                        error: None,
                    });
                }
                Err(e) => {
                    error!("Step {index} ({}) failed: {e}", step.description());
                    failed += 1;
                    results.push(StepResult {
                        index,
                        step: step.clone(),
                        outcome: StepOutcome::Failed,
                        error: Some(e.to_string()),
                    });
                    break;
                }
            }
        }

        let unattempted = plan.len() - results.len();
        Ok(ExecutionReport {
            results,
            completed,
            failed,
            unattempted,
            aborted,
            success: failed == 0 && !aborted && unattempted == 0,
        })
    }

    /// Executes one step: create-or-update on deploy, delete-if-present on
    /// undeploy.
    async fn execute_step(&self, step: &PlanStep) -> Result<StepOutcome> {
        let package = self.package_of(step)?;
        let address = entity_address(package, step);

        match step.operation {
            Operation::CreateOrUpdate => {
                let payload = self.build_payload(package, step).await?;
                let outcome = if self.client.exists(&address).await? {
                    self.client.update(&address, &payload).await?;
                    StepOutcome::Updated
                } else {
                    self.client.create(&address, &payload).await?;
                    StepOutcome::Created
                };
                if step.kind == EntityKind::Trigger {
                    self.notify_feed(package, step, &address, FeedLifecycle::Create)
                        .await?;
                }
                Ok(outcome)
            }
            Operation::Delete => {
                if !self.client.exists(&address).await? {
                    Ok(StepOutcome::AlreadyAbsent)
                } else {
                    if step.kind == EntityKind::Trigger {
                        self.notify_feed(package, step, &address, FeedLifecycle::Delete)
                            .await?;
                    }
                    self.client.delete(&address).await?;
                    Ok(StepOutcome::Deleted)
                }
            }
        }
    }

    /// Notifies the feed action behind a fed trigger, if there is one.
    async fn notify_feed(
        &self,
        package: &ResolvedPackage,
        step: &PlanStep,
        address: &EntityAddress,
        event: FeedLifecycle,
    ) -> Result<()> {
        let Some(trigger) = package.trigger(&step.entity.name) else {
            return Ok(());
        };
        let Some(feed) = &trigger.feed else {
            return Ok(());
        };

        info!("Notifying feed {feed} of {} for trigger {address}", event.as_str());
        self.client
            .invoke_feed(feed, address, event, &key_values(&trigger.inputs))
            .await
    }

    /// Builds the wire payload for a step.
    async fn build_payload(&self, package: &ResolvedPackage, step: &PlanStep) -> Result<EntityPayload> {
        let name = &step.entity.name;
        match step.kind {
            EntityKind::Package => Ok(EntityPayload::from_package(package)),
            EntityKind::Binding => package
                .bindings
                .iter()
                .find(|b| &b.name == name)
                .map(EntityPayload::from_binding)
                .ok_or_else(|| missing_entity(step)),
            EntityKind::Action => {
                let action = package.action(name).ok_or_else(|| missing_entity(step))?;
                let (runtime, code) = self.content.resolve(action).await?;
                Ok(EntityPayload::from_action(action, runtime, code))
            }
            EntityKind::Sequence => {
                let sequence = package.sequence(name).ok_or_else(|| missing_entity(step))?;
                let components = sequence
                    .components
                    .iter()
                    .map(|c| qualify_invocable(package, c))
                    .collect();
                Ok(EntityPayload::from_sequence(sequence, components))
            }
            EntityKind::Trigger => package
                .trigger(name)
                .map(EntityPayload::from_trigger)
                .ok_or_else(|| missing_entity(step)),
            EntityKind::Rule => {
                let rule = package
                    .rules
                    .iter()
                    .find(|r| &r.name == name)
                    .ok_or_else(|| missing_entity(step))?;
                let trigger = if rule.trigger.starts_with('/') {
                    rule.trigger.clone()
                } else {
                    format!("/{}/{}", package.namespace, rule.trigger)
                };
                let action = qualify_invocable(package, &rule.action);
                Ok(EntityPayload::from_rule(rule, trigger, action))
            }
            EntityKind::Api => {
                let route = package
                    .apis
                    .iter()
                    .find(|r| &r.api_name == name)
                    .ok_or_else(|| missing_entity(step))?;
                let action = qualify_invocable(package, &route.action);
                Ok(EntityPayload::from_api(route, action))
            }
        }
    }

    /// Looks up the package a step belongs to.
    fn package_of(&self, step: &PlanStep) -> Result<&ResolvedPackage> {
        self.graph
            .package(&step.entity.package)
            .ok_or_else(|| missing_entity(step))
    }
}

impl ExecutionReport {
    /// Returns the failing step's error, if the run failed.
    #[must_use]
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.results
            .iter()
            .find(|r| r.outcome == StepOutcome::Failed)
    }

    /// Converts a failed run into the error the caller propagates.
    #[must_use]
    pub fn failure_error(&self) -> Option<StratusError> {
        self.first_failure().map(|r| {
            StratusError::Remote(RemoteError::StepFailed {
                kind: r.step.kind.to_string(),
                name: r.step.entity.qualified(),
                step_index: r.index,
                message: r.error.clone().unwrap_or_default(),
            })
        })
    }
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} completed, {} failed, {} unattempted",
            self.completed, self.failed, self.unattempted
        )?;
        if self.aborted {
            write!(f, " (aborted)")?;
        }
        Ok(())
    }
}

/// Qualifies an action or sequence reference against its package.
///
/// References already starting with `/` point outside the package and pass
/// through untouched.
fn qualify_invocable(package: &ResolvedPackage, name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{}/{}/{}", package.namespace, package.name, name)
    }
}

/// Maps a step to its platform address.
///
/// Actions and sequences live inside their package on the platform;
/// triggers and rules are namespace-level entities.
fn entity_address(package: &ResolvedPackage, step: &PlanStep) -> EntityAddress {
    let namespace = &package.namespace;
    match step.kind {
        EntityKind::Package | EntityKind::Binding => {
            EntityAddress::new(namespace, Collection::Packages, &step.entity.name)
        }
        EntityKind::Action | EntityKind::Sequence => EntityAddress::new(
            namespace,
            Collection::Actions,
            format!("{}/{}", package.name, step.entity.name),
        ),
        EntityKind::Trigger => EntityAddress::new(namespace, Collection::Triggers, &step.entity.name),
        EntityKind::Rule => EntityAddress::new(namespace, Collection::Rules, &step.entity.name),
        EntityKind::Api => EntityAddress::new(namespace, Collection::Apis, &step.entity.name),
    }
}

fn missing_entity(step: &PlanStep) -> StratusError {
    StratusError::internal(format!(
        "plan step references unknown {} '{}'",
        step.kind,
        step.entity.qualified()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Merger;
    use crate::manifest::ManifestParser;
    use crate::planner::order::Planner;
    use crate::planner::teardown::plan_undeploy;
    use crate::remote::KeyValue;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    /// In-memory platform recording every call in order.
    struct RecordingClient {
        existing: Mutex<HashSet<String>>,
        log: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl RecordingClient {
        fn empty() -> Self {
            Self {
                existing: Mutex::new(HashSet::new()),
                log: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(name: &str) -> Self {
            Self {
                fail_on: Some(name.to_string()),
                ..Self::empty()
            }
        }

        fn key(address: &EntityAddress) -> String {
            format!("{}:{}", address.collection.path_segment(), address.name)
        }

        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn check_failure(&self, address: &EntityAddress) -> Result<()> {
            if self.fail_on.as_deref() == Some(address.name.as_str()) {
                return Err(StratusError::Remote(RemoteError::api_error(
                    500,
                    "induced failure",
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteClient for RecordingClient {
        async fn exists(&self, address: &EntityAddress) -> Result<bool> {
            Ok(self.existing.lock().unwrap().contains(&Self::key(address)))
        }

        async fn create(&self, address: &EntityAddress, _payload: &EntityPayload) -> Result<()> {
            self.check_failure(address)?;
            self.existing.lock().unwrap().insert(Self::key(address));
            self.record(format!("create {}", Self::key(address)));
            Ok(())
        }

        async fn update(&self, address: &EntityAddress, _payload: &EntityPayload) -> Result<()> {
            self.check_failure(address)?;
            self.record(format!("update {}", Self::key(address)));
            Ok(())
        }

        async fn delete(&self, address: &EntityAddress) -> Result<()> {
            self.check_failure(address)?;
            self.existing.lock().unwrap().remove(&Self::key(address));
            self.record(format!("delete {}", Self::key(address)));
            Ok(())
        }

        async fn invoke_feed(
            &self,
            feed: &str,
            trigger: &EntityAddress,
            event: FeedLifecycle,
            _inputs: &[KeyValue],
        ) -> Result<()> {
            self.record(format!("feed {} {} {}", event.as_str(), feed, trigger.name));
            Ok(())
        }
    }

    const MANIFEST: &str = r"
packages:
  greeting:
    actions:
      hello:
        code: 'function main() { return {}; }'
        runtime: 'nodejs:default'
    triggers:
      gong: {}
    rules:
      on-gong:
        trigger: gong
        action: hello
";

    fn graph_from(yaml: &str) -> ResolvedGraph {
        let manifest = ManifestParser::new()
            .parse_manifest_str(yaml, Path::new("manifest.yaml"))
            .unwrap();
        Merger::new().merge(&manifest, None).unwrap()
    }

    fn executor<'a>(client: &'a RecordingClient, graph: &'a ResolvedGraph) -> PlanExecutor<'a> {
        PlanExecutor::new(client, graph, ContentReader::new("."))
    }

    #[tokio::test]
    async fn test_fresh_deploy_creates_everything() {
        let graph = graph_from(MANIFEST);
        let plan = Planner::new().plan(&graph).unwrap();
        let client = RecordingClient::empty();

        let report = executor(&client, &graph).execute(&plan).await.unwrap();

        assert!(report.success);
        assert_eq!(report.completed, plan.len());
        assert_eq!(
            client.log(),
            vec![
                "create packages:greeting",
                "create actions:greeting/hello",
                "create triggers:gong",
                "create rules:on-gong",
            ]
        );
    }

    #[tokio::test]
    async fn test_second_deploy_only_updates() {
        let graph = graph_from(MANIFEST);
        let plan = Planner::new().plan(&graph).unwrap();
        let client = RecordingClient::empty();

        executor(&client, &graph).execute(&plan).await.unwrap();
        client.log.lock().unwrap().clear();

        let report = executor(&client, &graph).execute(&plan).await.unwrap();
        assert!(report.success);
        assert!(client.log().iter().all(|entry| entry.starts_with("update ")));
    }

    #[tokio::test]
    async fn test_fail_fast_accounting() {
        let graph = graph_from(MANIFEST);
        let plan = Planner::new().plan(&graph).unwrap();
        let client = RecordingClient::failing_on("gong");

        let report = executor(&client, &graph).execute(&plan).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.unattempted, 1);

        let failure = report.first_failure().unwrap();
        assert_eq!(failure.step.entity.name, "gong");
        assert!(report.failure_error().is_some());
    }

    #[tokio::test]
    async fn test_undeploy_deletes_in_reverse() {
        let graph = graph_from(MANIFEST);
        let deploy = Planner::new().plan(&graph).unwrap();
        let client = RecordingClient::empty();

        executor(&client, &graph).execute(&deploy).await.unwrap();
        client.log.lock().unwrap().clear();

        let undeploy = plan_undeploy(&graph).unwrap();
        let report = executor(&client, &graph).execute(&undeploy).await.unwrap();

        assert!(report.success);
        assert_eq!(
            client.log(),
            vec![
                "delete rules:on-gong",
                "delete triggers:gong",
                "delete actions:greeting/hello",
                "delete packages:greeting",
            ]
        );
    }

    #[tokio::test]
    async fn test_undeploy_of_absent_entities_succeeds() {
        let graph = graph_from(MANIFEST);
        let undeploy = plan_undeploy(&graph).unwrap();
        let client = RecordingClient::empty();

        let report = executor(&client, &graph).execute(&undeploy).await.unwrap();

        assert!(report.success);
        assert!(report
            .results
            .iter()
            .all(|r| r.outcome == StepOutcome::AlreadyAbsent));
        assert!(client.log().is_empty());
    }

    #[tokio::test]
    async fn test_abort_before_start() {
        let graph = graph_from(MANIFEST);
        let plan = Planner::new().plan(&graph).unwrap();
        let client = RecordingClient::empty();

        let exec = executor(&client, &graph);
        exec.abort_handle().store(true, Ordering::SeqCst);
        let report = exec.execute(&plan).await.unwrap();

        assert!(report.aborted);
        assert!(!report.success);
        assert_eq!(report.unattempted, plan.len());
        assert!(client.log().is_empty());
    }

    #[tokio::test]
    async fn test_fed_trigger_lifecycle() {
        let graph = graph_from(
            r"
packages:
  clock:
    triggers:
      every-minute:
        feed: /whisk.system/alarms/alarm
        inputs:
          cron: '* * * * *'
",
        );
        let plan = Planner::new().plan(&graph).unwrap();
        let client = RecordingClient::empty();

        executor(&client, &graph).execute(&plan).await.unwrap();
        assert!(client.log().contains(&String::from(
            "feed CREATE /whisk.system/alarms/alarm every-minute"
        )));

        client.log.lock().unwrap().clear();
        let undeploy = plan_undeploy(&graph).unwrap();
        executor(&client, &graph).execute(&undeploy).await.unwrap();

        let log = client.log();
        let feed_pos = log
            .iter()
            .position(|e| e == "feed DELETE /whisk.system/alarms/alarm every-minute")
            .unwrap();
        let delete_pos = log
            .iter()
            .position(|e| e == "delete triggers:every-minute")
            .unwrap();
        assert!(feed_pos < delete_pos);
    }
}
