//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stratus - declarative serverless deployment manager.
#[derive(Parser, Debug)]
#[command(name = "stratus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project directory containing the manifest.
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Path to the manifest file (defaults to manifest.yaml in the project).
    #[arg(short, long, global = true, env = "STRATUS_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Path to the deployment file (defaults to deployment.yaml in the
    /// project).
    #[arg(short, long, global = true, env = "STRATUS_DEPLOYMENT")]
    pub deployment: Option<PathBuf>,

    /// Target namespace.
    #[arg(short, long, global = true, env = "STRATUS_NAMESPACE")]
    pub namespace: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the manifest and deployment files.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Generate and display the deployment plan.
    Plan {
        /// Plan an undeployment instead of a deployment.
        #[arg(long)]
        undeploy: bool,
    },

    /// Deploy the project to the platform.
    Deploy {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove everything the manifest deploys, in reverse order.
    Undeploy {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
