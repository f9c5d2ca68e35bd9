//! Error types for the Stratus deployment engine.
//!
//! This module provides the error hierarchy for the whole deployment
//! lifecycle: document parsing, schema validation, manifest/deployment
//! merging, planning, and remote execution.

use std::path::PathBuf;
use thiserror::Error;

/// Which source document an error originated from.
///
/// Every user-facing error names the document it came from so the caller can
/// fix the right file without knowing engine internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    /// The manifest file (`manifest.yaml`).
    Manifest,
    /// The deployment file (`deployment.yaml`).
    Deployment,
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manifest => write!(f, "manifest"),
            Self::Deployment => write!(f, "deployment"),
        }
    }
}

/// The main error type for the Stratus deployment engine.
#[derive(Debug, Error)]
pub enum StratusError {
    /// Document parsing errors.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Schema validation errors.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Manifest/deployment merge errors.
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Deployer lifecycle misuse.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Remote platform errors.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while reading or parsing a manifest or deployment document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document file was not found.
    #[error("{document} file not found: {path}")]
    FileNotFound {
        /// Which document was being loaded.
        document: Document,
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The document could not be read.
    #[error("Failed to read {document} file {path}: {message}")]
    ReadFailed {
        /// Which document was being loaded.
        document: Document,
        /// Path to the unreadable file.
        path: PathBuf,
        /// Underlying IO error description.
        message: String,
    },

    /// The document is not valid YAML.
    #[error("Failed to parse {document} file {path}: {message}")]
    Malformed {
        /// Which document was being parsed.
        document: Document,
        /// Path to the malformed file.
        path: PathBuf,
        /// YAML error description.
        message: String,
    },
}

/// Errors raised when a parsed document violates the schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A required field is missing.
    #[error("{document}: {entity} is missing required field '{field}'")]
    MissingField {
        /// Which document declared the entity.
        document: Document,
        /// Fully qualified entity name.
        entity: String,
        /// The missing field.
        field: String,
    },

    /// An action has neither inline code nor a source reference.
    #[error("manifest: action '{action}' has no source (expected 'function' or inline 'code')")]
    MissingActionSource {
        /// Fully qualified action name.
        action: String,
    },

    /// The runtime kind is not recognized.
    #[error("manifest: action '{action}' uses unknown runtime '{runtime}'")]
    UnknownRuntime {
        /// Fully qualified action name.
        action: String,
        /// The unrecognized runtime kind.
        runtime: String,
    },

    /// The runtime kind could not be inferred from the source extension.
    #[error("manifest: cannot infer runtime for action '{action}' from source '{src}'")]
    UnknownRuntimeExtension {
        /// Fully qualified action name.
        action: String,
        /// The source reference whose extension was not recognized.
        src: String,
    },

    /// The web-export mode is not one of the accepted spellings.
    #[error(
        "manifest: entity '{entity}' has invalid web-export value '{value}' \
         (valid values: true, yes, raw, false, no)"
    )]
    InvalidWebExport {
        /// Fully qualified entity name.
        entity: String,
        /// The rejected value.
        value: String,
    },

    /// A resource limit is outside the platform's accepted range.
    #[error("manifest: action '{action}' limit '{limit}' = {value} is outside [{min}, {max}]")]
    LimitOutOfRange {
        /// Fully qualified action name.
        action: String,
        /// Limit name (timeout, memory, logsize).
        limit: String,
        /// Declared value.
        value: i64,
        /// Minimum accepted value.
        min: i64,
        /// Maximum accepted value.
        max: i64,
    },

    /// Two entities of the same kind share a name within one scope.
    #[error("{document}: duplicate {kind} name '{name}' in {scope}")]
    DuplicateName {
        /// Which document declared the duplicates.
        document: Document,
        /// Entity kind (action, sequence, trigger, rule, package).
        kind: String,
        /// The duplicated name.
        name: String,
        /// Containing scope (package or project).
        scope: String,
    },
}

/// Errors raised while merging the deployment file into the manifest model.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The deployment file references a package absent from the manifest.
    #[error("deployment: package '{package}' is not declared in the manifest")]
    UnknownPackage {
        /// The dangling package name.
        package: String,
    },

    /// The deployment file references an action absent from the manifest.
    #[error("deployment: action '{package}/{action}' is not declared in the manifest")]
    UnknownAction {
        /// Package named by the deployment file.
        package: String,
        /// The dangling action name.
        action: String,
    },

    /// The deployment file references a trigger absent from the manifest.
    #[error("deployment: trigger '{package}/{trigger}' is not declared in the manifest")]
    UnknownTrigger {
        /// Package named by the deployment file.
        package: String,
        /// The dangling trigger name.
        trigger: String,
    },

    /// A rule references a trigger that does not exist.
    #[error("manifest: rule '{rule}' references unknown trigger '{trigger}'")]
    UnresolvedTrigger {
        /// Fully qualified rule name.
        rule: String,
        /// The dangling trigger name.
        trigger: String,
    },

    /// A rule references an action or sequence that does not exist.
    #[error("manifest: rule '{rule}' references unknown action '{action}'")]
    UnresolvedRuleAction {
        /// Fully qualified rule name.
        rule: String,
        /// The dangling action name.
        action: String,
    },

    /// A sequence component references an action that does not exist.
    #[error("manifest: sequence '{sequence}' references unknown action '{component}'")]
    UnresolvedComponent {
        /// Fully qualified sequence name.
        sequence: String,
        /// The dangling component action name.
        component: String,
    },

    /// An API route references an action that does not exist.
    #[error("manifest: API '{api}' references unknown action '{action}'")]
    UnresolvedApiAction {
        /// API name.
        api: String,
        /// The dangling action name.
        action: String,
    },

    /// The manifest and deployment files declare different project names.
    #[error(
        "project name mismatch: manifest declares '{manifest}' but deployment declares '{deployment}'"
    )]
    ProjectNameMismatch {
        /// Project name from the manifest.
        manifest: String,
        /// Project name from the deployment file.
        deployment: String,
    },
}

/// Errors raised while constructing a deployment plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A dependency or sequence-reference cycle was detected.
    #[error("cyclic dependency detected: {}", members.join(" -> "))]
    CyclicDependency {
        /// Entities participating in the cycle, in traversal order.
        members: Vec<String>,
    },

    /// A package dependency names a package absent from the manifest.
    #[error("package '{package}' depends on unknown package '{dependency}'")]
    UnknownDependency {
        /// The depending package.
        package: String,
        /// The dangling dependency name.
        dependency: String,
    },
}

/// Deployer lifecycle misuse: calling operations out of order.
#[derive(Debug, Error)]
pub enum StateError {
    /// An operation was invoked before its prerequisite.
    #[error("{operation} called in state {state} (expected {expected})")]
    InvalidState {
        /// The offending operation.
        operation: String,
        /// The deployer's current state.
        state: String,
        /// The state the operation requires.
        expected: String,
    },
}

/// Remote platform errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Authentication failed.
    #[error("platform authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("platform API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("platform API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("network error communicating with the platform: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("invalid response from the platform API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// A plan step failed against the remote platform.
    ///
    /// Carries enough context (kind, fully qualified name, step index) for
    /// the caller to resume manually after a fail-fast stop.
    #[error("step {step_index} ({kind} '{name}') failed: {message}")]
    StepFailed {
        /// Entity kind of the failing step.
        kind: String,
        /// Fully qualified entity name.
        name: String,
        /// Zero-based index of the step within the plan.
        step_index: usize,
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for Stratus operations.
pub type Result<T> = std::result::Result<T, StratusError>;

impl StratusError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Remote(RemoteError::RateLimited { .. } | RemoteError::NetworkError { .. })
        )
    }

    /// Returns the server-supplied retry delay in seconds, if the error
    /// carries one.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Remote(RemoteError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl StateError {
    /// Creates an invalid-state error.
    #[must_use]
    pub fn invalid(
        operation: impl Into<String>,
        state: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.into(),
            expected: expected.into(),
        }
    }
}

impl RemoteError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}
