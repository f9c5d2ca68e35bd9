//! Deployment service façade.
//!
//! [`ServiceDeployer`] drives the whole lifecycle: load and validate the
//! documents, merge them into a resolved graph, derive a plan, and execute
//! it. Operations must run in order; calling one out of order is a typed
//! error, never a panic.

use std::path::PathBuf;
use tracing::{info, warn};

use crate::content::ContentReader;
use crate::error::{Result, StateError, StratusError};
use crate::graph::{Merger, ResolvedGraph, DEFAULT_NAMESPACE};
use crate::manifest::{
    find_deployment_file, find_manifest_file, ManifestParser, ManifestValidator,
};
use crate::planner::{plan_undeploy, DeploymentPlan, ExecutionReport, PlanExecutor, Planner};
use crate::remote::RemoteClient;

/// Environment variable carrying the platform credential.
pub const ENV_AUTH: &str = "STRATUS_AUTH";

/// Environment variable carrying the platform API host.
pub const ENV_API_HOST: &str = "STRATUS_API_HOST";

/// Environment variable carrying the target namespace.
pub const ENV_NAMESPACE: &str = "STRATUS_NAMESPACE";

/// Deployer configuration.
#[derive(Debug, Clone, Default)]
pub struct DeployerConfig {
    /// Project root the default documents and action sources resolve
    /// against.
    pub project_path: PathBuf,
    /// Explicit manifest path; overrides the default file search.
    pub manifest_path: Option<PathBuf>,
    /// Explicit deployment file path; overrides the default file search.
    pub deployment_path: Option<PathBuf>,
    /// Target namespace; overrides the environment.
    pub namespace: Option<String>,
    /// Ask for confirmation before executing.
    pub interactive: bool,
}

impl DeployerConfig {
    /// Creates a configuration rooted at a project directory.
    #[must_use]
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            ..Self::default()
        }
    }

    /// Sets an explicit manifest path.
    #[must_use]
    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    /// Sets an explicit deployment file path.
    #[must_use]
    pub fn with_deployment(mut self, path: impl Into<PathBuf>) -> Self {
        self.deployment_path = Some(path.into());
        self
    }

    /// Sets the target namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Enables interactive confirmation.
    #[must_use]
    pub const fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Resolves the target namespace: explicit setting, then environment,
    /// then the platform default.
    #[must_use]
    pub fn resolved_namespace(&self) -> String {
        self.namespace
            .clone()
            .or_else(|| std::env::var(ENV_NAMESPACE).ok())
            .unwrap_or_else(|| String::from(DEFAULT_NAMESPACE))
    }
}

/// Confirmation seam for interactive runs.
pub trait Prompter {
    /// Asks the user to confirm executing the summarized plan.
    fn confirm(&self, summary: &str) -> bool;
}

/// Prompter reading a y/n answer from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm(&self, summary: &str) -> bool {
        use std::io::{BufRead, Write};

        println!("{summary}");
        print!("Proceed? [y/N] ");
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim(), "y" | "Y" | "yes")
    }
}

/// Lifecycle phase of a deployer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing loaded yet.
    Uninitialized,
    /// Documents loaded, validated, and merged.
    Checked,
    /// A plan exists.
    Planned,
    /// The plan was executed.
    Executed,
}

impl Phase {
    const fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Checked => "checked",
            Self::Planned => "planned",
            Self::Executed => "executed",
        }
    }
}

/// Which lifecycle the current plan belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanKind {
    Deploy,
    Undeploy,
}

/// Outcome of a deploy or undeploy run.
#[derive(Debug)]
pub enum DeployOutcome {
    /// Every step completed; the report accounts for each one.
    Completed(ExecutionReport),
    /// The run stopped early; the report still accounts for every step as
    /// completed, failed, or unattempted, and
    /// [`failure_error`](ExecutionReport::failure_error) yields the failing
    /// step's error.
    Failed(ExecutionReport),
    /// The user declined the confirmation prompt; nothing was executed.
    Cancelled,
}

/// Drives the full deployment lifecycle for one project.
pub struct ServiceDeployer {
    config: DeployerConfig,
    prompter: Box<dyn Prompter>,
    phase: Phase,
    graph: Option<ResolvedGraph>,
    plan: Option<DeploymentPlan>,
    plan_kind: Option<PlanKind>,
}

impl ServiceDeployer {
    /// Creates a deployer for the given configuration.
    #[must_use]
    pub fn new(config: DeployerConfig) -> Self {
        Self {
            config,
            prompter: Box::new(StdinPrompter),
            phase: Phase::Uninitialized,
            graph: None,
            plan: None,
            plan_kind: None,
        }
    }

    /// Replaces the confirmation prompter.
    #[must_use]
    pub fn with_prompter(mut self, prompter: Box<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// Loads, validates, and merges the project documents.
    ///
    /// Touches no network; a checked deployer proves the documents are
    /// internally consistent.
    ///
    /// # Errors
    ///
    /// Returns parse, schema, or merge errors from the documents.
    pub fn check(&mut self) -> Result<&ResolvedGraph> {
        let parser = ManifestParser::new().with_base_path(&self.config.project_path);
        parser.load_dotenv()?;

        let manifest_path = match &self.config.manifest_path {
            Some(path) => path.clone(),
            None => find_manifest_file(&self.config.project_path)?,
        };
        let manifest = parser.parse_manifest(&manifest_path)?;

        let validation = ManifestValidator::new().validate(&manifest)?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        let deployment_path = self
            .config
            .deployment_path
            .clone()
            .or_else(|| find_deployment_file(&self.config.project_path));
        let deployment = match &deployment_path {
            Some(path) => Some(parser.parse_deployment(path)?),
            None => None,
        };

        let graph = Merger::new()
            .with_default_namespace(self.config.resolved_namespace())
            .merge(&manifest, deployment.as_ref())?;

        info!(
            "Checked project with {} packages, {} entities",
            graph.packages.len(),
            graph.entity_count()
        );

        self.plan = None;
        self.plan_kind = None;
        self.phase = Phase::Checked;
        Ok(self.graph.insert(graph))
    }

    /// Derives the deployment plan from the checked graph.
    ///
    /// # Errors
    ///
    /// Returns a state error when called before [`check`](Self::check), or a
    /// planning error for cyclic or dangling dependencies.
    pub fn construct_deployment_plan(&mut self) -> Result<&DeploymentPlan> {
        self.construct_plan(PlanKind::Deploy, "construct_deployment_plan")
    }

    /// Derives the undeployment plan from the checked graph.
    ///
    /// # Errors
    ///
    /// Returns a state error when called before [`check`](Self::check), or a
    /// planning error for cyclic or dangling dependencies.
    pub fn construct_undeployment_plan(&mut self) -> Result<&DeploymentPlan> {
        self.construct_plan(PlanKind::Undeploy, "construct_undeployment_plan")
    }

    fn construct_plan(&mut self, kind: PlanKind, operation: &str) -> Result<&DeploymentPlan> {
        let graph = self.graph_checked(operation)?;
        let plan = match kind {
            PlanKind::Deploy => Planner::new().plan(graph)?,
            PlanKind::Undeploy => plan_undeploy(graph)?,
        };

        self.plan_kind = Some(kind);
        self.phase = Phase::Planned;
        Ok(self.plan.insert(plan))
    }

    /// Executes the deployment plan.
    ///
    /// Step failures do not surface as `Err`: a stopped run comes back as
    /// [`DeployOutcome::Failed`] so the caller still sees the full per-step
    /// accounting.
    ///
    /// # Errors
    ///
    /// Returns a state error when no deployment plan exists.
    pub async fn deploy(&mut self, client: &dyn RemoteClient) -> Result<DeployOutcome> {
        self.execute(client, PlanKind::Deploy, "deploy").await
    }

    /// Executes the undeployment plan.
    ///
    /// Step failures do not surface as `Err`: a stopped run comes back as
    /// [`DeployOutcome::Failed`] so the caller still sees the full per-step
    /// accounting.
    ///
    /// # Errors
    ///
    /// Returns a state error when no undeployment plan exists.
    pub async fn undeploy(&mut self, client: &dyn RemoteClient) -> Result<DeployOutcome> {
        self.execute(client, PlanKind::Undeploy, "undeploy").await
    }

    async fn execute(
        &mut self,
        client: &dyn RemoteClient,
        kind: PlanKind,
        operation: &str,
    ) -> Result<DeployOutcome> {
        if self.phase != Phase::Planned || self.plan_kind != Some(kind) {
            return Err(StratusError::State(StateError::invalid(
                operation,
                self.phase.name(),
                "planned",
            )));
        }

        // The checks above guarantee both are present.
        let (Some(graph), Some(plan)) = (&self.graph, &self.plan) else {
            return Err(StratusError::State(StateError::invalid(
                operation,
                self.phase.name(),
                "planned",
            )));
        };

        if self.config.interactive && !self.prompter.confirm(&plan.to_string()) {
            info!("{operation} cancelled at the confirmation prompt");
            return Ok(DeployOutcome::Cancelled);
        }

        let content = ContentReader::new(&self.config.project_path);
        let executor = PlanExecutor::new(client, graph, content);
        let report = executor.execute(plan).await?;

        info!("{operation} finished: {report}");
        if !report.success {
            // The plan stays in place so the caller can retry after fixing
            // the failing step.
            return Ok(DeployOutcome::Failed(report));
        }

        self.phase = Phase::Executed;
        Ok(DeployOutcome::Completed(report))
    }

    /// Returns the resolved graph, available after a successful check.
    #[must_use]
    pub const fn graph(&self) -> Option<&ResolvedGraph> {
        self.graph.as_ref()
    }

    /// Returns the current plan, available after planning.
    #[must_use]
    pub const fn plan(&self) -> Option<&DeploymentPlan> {
        self.plan.as_ref()
    }

    fn graph_checked(&self, operation: &str) -> Result<&ResolvedGraph> {
        self.graph.as_ref().ok_or_else(|| {
            StratusError::State(StateError::invalid(
                operation,
                self.phase.name(),
                "checked",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RemoteError, StateError};
    use crate::remote::{EntityAddress, EntityPayload, FeedLifecycle, KeyValue};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Client that accepts everything as a fresh create.
    #[derive(Default)]
    struct AcceptAllClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteClient for AcceptAllClient {
        async fn exists(&self, _address: &EntityAddress) -> Result<bool> {
            Ok(false)
        }
        async fn create(&self, _address: &EntityAddress, _payload: &EntityPayload) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn update(&self, _address: &EntityAddress, _payload: &EntityPayload) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _address: &EntityAddress) -> Result<()> {
            Ok(())
        }
        async fn invoke_feed(
            &self,
            _feed: &str,
            _trigger: &EntityAddress,
            _event: FeedLifecycle,
            _inputs: &[KeyValue],
        ) -> Result<()> {
            Ok(())
        }
    }

    struct DenyingPrompter;

    impl Prompter for DenyingPrompter {
        fn confirm(&self, _summary: &str) -> bool {
            false
        }
    }

    fn project_with_manifest(yaml: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.yaml"), yaml).unwrap();
        dir
    }

    const MANIFEST: &str = r"
packages:
  greeting:
    actions:
      hello:
        code: 'function main() { return {}; }'
        runtime: 'nodejs:default'
";

    #[test]
    fn test_check_builds_graph() {
        let dir = project_with_manifest(MANIFEST);
        let mut deployer = ServiceDeployer::new(DeployerConfig::new(dir.path()));

        let graph = deployer.check().unwrap();
        assert_eq!(graph.packages.len(), 1);
        assert!(deployer.graph().is_some());
    }

    #[test]
    fn test_plan_before_check_is_state_error() {
        let dir = project_with_manifest(MANIFEST);
        let mut deployer = ServiceDeployer::new(DeployerConfig::new(dir.path()));

        let err = deployer.construct_deployment_plan().unwrap_err();
        assert!(matches!(
            err,
            StratusError::State(StateError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_deploy_before_plan_is_state_error() {
        let dir = project_with_manifest(MANIFEST);
        let mut deployer = ServiceDeployer::new(DeployerConfig::new(dir.path()));
        deployer.check().unwrap();

        let client = AcceptAllClient::default();
        let err = deployer.deploy(&client).await.unwrap_err();
        assert!(matches!(err, StratusError::State(_)));
    }

    #[tokio::test]
    async fn test_deploy_with_undeploy_plan_is_state_error() {
        let dir = project_with_manifest(MANIFEST);
        let mut deployer = ServiceDeployer::new(DeployerConfig::new(dir.path()));
        deployer.check().unwrap();
        deployer.construct_undeployment_plan().unwrap();

        let client = AcceptAllClient::default();
        let err = deployer.deploy(&client).await.unwrap_err();
        assert!(matches!(err, StratusError::State(_)));
    }

    #[tokio::test]
    async fn test_full_deploy_lifecycle() {
        let dir = project_with_manifest(MANIFEST);
        let mut deployer = ServiceDeployer::new(DeployerConfig::new(dir.path()));
        deployer.check().unwrap();

        let plan_len = deployer.construct_deployment_plan().unwrap().len();
        assert_eq!(plan_len, 2);

        let client = AcceptAllClient::default();
        let outcome = deployer.deploy(&client).await.unwrap();
        match outcome {
            DeployOutcome::Completed(report) => {
                assert!(report.success);
                assert_eq!(report.completed, plan_len);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), plan_len);
    }

    #[tokio::test]
    async fn test_interactive_decline_cancels() {
        let dir = project_with_manifest(MANIFEST);
        let config = DeployerConfig::new(dir.path()).with_interactive(true);
        let mut deployer =
            ServiceDeployer::new(config).with_prompter(Box::new(DenyingPrompter));
        deployer.check().unwrap();
        deployer.construct_deployment_plan().unwrap();

        let client = AcceptAllClient::default();
        let outcome = deployer.deploy(&client).await.unwrap();
        assert!(matches!(outcome, DeployOutcome::Cancelled));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_step_surfaces_step_error() {
        struct FailingClient;

        #[async_trait]
        impl RemoteClient for FailingClient {
            async fn exists(&self, _address: &EntityAddress) -> Result<bool> {
                Ok(false)
            }
            async fn create(
                &self,
                _address: &EntityAddress,
                _payload: &EntityPayload,
            ) -> Result<()> {
                Err(StratusError::Remote(RemoteError::api_error(500, "boom")))
            }
            async fn update(
                &self,
                _address: &EntityAddress,
                _payload: &EntityPayload,
            ) -> Result<()> {
                Ok(())
            }
            async fn delete(&self, _address: &EntityAddress) -> Result<()> {
                Ok(())
            }
            async fn invoke_feed(
                &self,
                _feed: &str,
                _trigger: &EntityAddress,
                _event: FeedLifecycle,
                _inputs: &[KeyValue],
            ) -> Result<()> {
                Ok(())
            }
        }

        let dir = project_with_manifest(MANIFEST);
        let mut deployer = ServiceDeployer::new(DeployerConfig::new(dir.path()));
        deployer.check().unwrap();
        deployer.construct_deployment_plan().unwrap();

        // A stopped run still hands back the full per-step accounting.
        let outcome = deployer.deploy(&FailingClient).await.unwrap();
        let DeployOutcome::Failed(report) = outcome else {
            panic!("expected a failed outcome");
        };
        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.unattempted, 1);
        assert!(matches!(
            report.failure_error(),
            Some(StratusError::Remote(RemoteError::StepFailed {
                step_index: 0,
                ..
            }))
        ));
    }

    #[test]
    fn test_missing_manifest_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut deployer = ServiceDeployer::new(DeployerConfig::new(dir.path()));
        assert!(deployer.check().is_err());
    }

    #[test]
    fn test_namespace_resolution_prefers_explicit() {
        let config = DeployerConfig::new(".").with_namespace("prod");
        assert_eq!(config.resolved_namespace(), "prod");
    }
}
