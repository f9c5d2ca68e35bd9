//! Stratus CLI entrypoint.
//!
//! This is the main entrypoint for the stratus command-line tool.

use std::process::ExitCode;

use stratus_deploy::cli::{Cli, Commands, OutputFormatter};
use stratus_deploy::deployer::{
    DeployOutcome, DeployerConfig, ServiceDeployer, ENV_API_HOST, ENV_AUTH,
};
use stratus_deploy::error::{Result, StratusError};
use stratus_deploy::graph::{Merger, ResolvedGraph};
use stratus_deploy::manifest::{
    find_deployment_file, find_manifest_file, ManifestParser, ManifestValidator,
};
use stratus_deploy::remote::HttpRemoteClient;

use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config = deployer_config(&cli);

    match &cli.command {
        Commands::Validate { warnings } => cmd_validate(&cli, *warnings, &formatter),
        Commands::Plan { undeploy } => cmd_plan(config, *undeploy, &formatter),
        Commands::Deploy { yes } => cmd_deploy(config, *yes, &formatter).await,
        Commands::Undeploy { yes } => cmd_undeploy(config, *yes, &formatter).await,
    }
}

/// Builds the deployer configuration from global CLI flags.
fn deployer_config(cli: &Cli) -> DeployerConfig {
    let mut config = DeployerConfig::new(&cli.project);
    if let Some(manifest) = &cli.manifest {
        config = config.with_manifest(manifest);
    }
    if let Some(deployment) = &cli.deployment {
        config = config.with_deployment(deployment);
    }
    if let Some(namespace) = &cli.namespace {
        config = config.with_namespace(namespace);
    }
    config
}

/// Validates the project documents and prints a summary.
fn cmd_validate(cli: &Cli, show_warnings: bool, formatter: &OutputFormatter) -> Result<()> {
    let parser = ManifestParser::new().with_base_path(&cli.project);
    parser.load_dotenv()?;

    let manifest_path = match &cli.manifest {
        Some(path) => path.clone(),
        None => find_manifest_file(&cli.project)?,
    };
    let manifest = parser.parse_manifest(&manifest_path)?;

    let result = ManifestValidator::new().validate(&manifest)?;
    if show_warnings && !result.warnings.is_empty() {
        eprintln!("Warnings:");
        for warning in &result.warnings {
            eprintln!("  - {warning}");
        }
        eprintln!();
    }

    let deployment_path = cli
        .deployment
        .clone()
        .or_else(|| find_deployment_file(&cli.project));
    let deployment = match &deployment_path {
        Some(path) => Some(parser.parse_deployment(path)?),
        None => None,
    };

    let mut merger = Merger::new();
    if let Some(namespace) = &cli.namespace {
        merger = merger.with_default_namespace(namespace);
    }
    let graph = merger.merge(&manifest, deployment.as_ref())?;

    eprintln!("{}", formatter.format_summary(&graph));
    Ok(())
}

/// Shows the deployment or undeployment plan.
fn cmd_plan(config: DeployerConfig, undeploy: bool, formatter: &OutputFormatter) -> Result<()> {
    let mut deployer = ServiceDeployer::new(config);
    deployer.check()?;

    let plan = if undeploy {
        deployer.construct_undeployment_plan()?
    } else {
        deployer.construct_deployment_plan()?
    };

    eprintln!("{}", formatter.format_plan(plan));
    Ok(())
}

/// Deploys the project.
async fn cmd_deploy(
    config: DeployerConfig,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut deployer = ServiceDeployer::new(config.with_interactive(!auto_approve));
    deployer.check()?;
    let plan = deployer.construct_deployment_plan()?;
    eprintln!("{}", formatter.format_plan(plan));

    let client = create_remote_client(deployer.graph())?;
    report_outcome(deployer.deploy(&client).await?, formatter)
}

/// Removes everything the project deploys.
async fn cmd_undeploy(
    config: DeployerConfig,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut deployer = ServiceDeployer::new(config.with_interactive(!auto_approve));
    deployer.check()?;
    let plan = deployer.construct_undeployment_plan()?;
    eprintln!("{}", formatter.format_plan(plan));

    let client = create_remote_client(deployer.graph())?;
    report_outcome(deployer.undeploy(&client).await?, formatter)
}

/// Prints the outcome of a deploy or undeploy run.
///
/// A failed run renders the full per-step report before the failing step's
/// error is propagated.
fn report_outcome(outcome: DeployOutcome, formatter: &OutputFormatter) -> Result<()> {
    match outcome {
        DeployOutcome::Completed(report) => {
            eprintln!("{}", formatter.format_report(&report));
            Ok(())
        }
        DeployOutcome::Failed(report) => {
            eprintln!("{}", formatter.format_report(&report));
            Err(report.failure_error().unwrap_or_else(|| {
                StratusError::internal("execution stopped before completing")
            }))
        }
        DeployOutcome::Cancelled => {
            eprintln!("Cancelled.");
            Ok(())
        }
    }
}

/// Creates the platform client from the environment.
///
/// The credential comes from `STRATUS_AUTH`, falling back to a credential
/// declared in the deployment file.
fn create_remote_client(graph: Option<&ResolvedGraph>) -> Result<HttpRemoteClient> {
    let api_host = std::env::var(ENV_API_HOST)
        .map_err(|_| StratusError::internal(format!("{ENV_API_HOST} is not set")))?;

    let auth = std::env::var(ENV_AUTH)
        .ok()
        .or_else(|| graph.and_then(|g| g.packages.iter().find_map(|p| p.credential.clone())))
        .ok_or_else(|| {
            StratusError::internal(format!(
                "{ENV_AUTH} is not set and no document declares a credential"
            ))
        })?;

    HttpRemoteClient::new(&api_host, &auth)
}
