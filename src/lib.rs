// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stratus Deploy
//!
//! A declarative, idempotent deployment engine for serverless platforms.
//!
//! ## Overview
//!
//! Stratus turns a YAML manifest describing packages, actions, sequences,
//! triggers, rules, and API routes into a dependency-ordered plan, then
//! applies it to the platform so that repeated runs converge instead of
//! erroring:
//!
//! - Declare the desired entities in `manifest.yaml`
//! - Override environment-specific values in `deployment.yaml`
//! - Deploy with create-or-update semantics, undeploy in exact reverse order
//!
//! ## Architecture
//!
//! A run flows through four stages:
//!
//! 1. **Parse**: load the manifest and deployment documents
//! 2. **Merge**: resolve overrides and references into an entity graph
//! 3. **Plan**: linearize the graph into dependency-ordered steps
//! 4. **Execute**: apply each step idempotently against the platform
//!
//! ## Modules
//!
//! - [`manifest`]: document models, parsing, and schema validation
//! - [`graph`]: the resolved entity graph and the merger that builds it
//! - [`planner`]: plan derivation, teardown, and execution
//! - [`remote`]: platform REST client and wire payloads
//! - [`content`]: action source loading and runtime inference
//! - [`deployer`]: the lifecycle façade tying the stages together
//! - [`cli`]: command-line interface
//!
//! ## Example
//!
//! ```yaml
//! packages:
//!   greeting:
//!     actions:
//!       hello:
//!         function: src/hello.js
//!         inputs:
//!           name: stranger
//!     triggers:
//!       gong: {}
//!     rules:
//!       on-gong:
//!         trigger: gong
//!         action: hello
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod content;
pub mod deployer;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod planner;
pub mod remote;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use content::ContentReader;
pub use deployer::{DeployOutcome, DeployerConfig, ServiceDeployer};
pub use error::{Result, StratusError};
pub use graph::{Merger, ResolvedGraph};
pub use manifest::{ManifestDoc, ManifestParser, ManifestValidator};
pub use planner::{DeploymentPlan, PlanExecutor, Planner};
pub use remote::{HttpRemoteClient, RemoteClient};
