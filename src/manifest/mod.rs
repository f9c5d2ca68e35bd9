//! Manifest and deployment document models.
//!
//! Typed, read-only views of the two source documents plus the parser and
//! schema validator that produce them.

pub mod deployment;
pub mod parser;
pub mod spec;
pub mod validator;

pub use deployment::{DeploymentAction, DeploymentDoc, DeploymentPackage, DeploymentProject};
pub use parser::{
    find_deployment_file, find_manifest_file, ManifestParser, DEFAULT_DEPLOYMENT_FILES,
    DEFAULT_MANIFEST_FILES,
};
pub use spec::{
    ActionSpec, ApiRoute, DependencySpec, LimitsSpec, ManifestDoc, PackageSpec, Parameter,
    ParameterSpec, ProjectHeader, RuleSpec, SequenceSpec, TriggerSpec, WebExport,
};
pub use validator::{ManifestValidator, ValidationResult};
