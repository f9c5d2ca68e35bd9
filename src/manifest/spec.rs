//! Manifest document types for the deployment engine.
//!
//! This module defines the structs that map to the `manifest.yaml` file:
//! application -> packages -> {actions, sequences, triggers, rules,
//! dependencies, APIs}. These types are declarative and fully describe the
//! desired state of the remote platform.
//!
//! Maps use [`IndexMap`] so declaration order survives parsing; the planner
//! relies on that order for deterministic plans.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Version given to packages that do not declare one.
pub const DEFAULT_PACKAGE_VERSION: &str = "0.0.1";

/// License given to packages that do not declare one.
pub const DEFAULT_PACKAGE_LICENSE: &str = "unlicensed";

/// The root structure of a parsed manifest document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ManifestDoc {
    /// Optional project header.
    #[serde(default)]
    pub project: Option<ProjectHeader>,
    /// Packages declared by the application, in declaration order.
    #[serde(default)]
    pub packages: IndexMap<String, PackageSpec>,
}

/// Project-level header shared by manifest and deployment documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectHeader {
    /// Project name.
    #[serde(default)]
    pub name: String,
    /// Project version.
    #[serde(default)]
    pub version: Option<String>,
}

/// A single package declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageSpec {
    /// Package version (defaults to [`DEFAULT_PACKAGE_VERSION`]).
    #[serde(default)]
    pub version: Option<String>,
    /// Package license (defaults to [`DEFAULT_PACKAGE_LICENSE`]).
    #[serde(default)]
    pub license: Option<String>,
    /// Namespace-scoped credential string.
    #[serde(default)]
    pub credential: Option<String>,
    /// Target namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Dependent packages keyed by local alias.
    #[serde(default)]
    pub dependencies: IndexMap<String, DependencySpec>,
    /// Actions keyed by name.
    #[serde(default)]
    pub actions: IndexMap<String, ActionSpec>,
    /// Sequences keyed by name.
    #[serde(default)]
    pub sequences: IndexMap<String, SequenceSpec>,
    /// Triggers keyed by name.
    #[serde(default)]
    pub triggers: IndexMap<String, TriggerSpec>,
    /// Rules keyed by name.
    #[serde(default)]
    pub rules: IndexMap<String, RuleSpec>,
    /// API gateway routes: api name -> base path -> relative path ->
    /// action name -> HTTP method.
    #[serde(default)]
    pub apis: IndexMap<String, IndexMap<String, IndexMap<String, IndexMap<String, String>>>>,
    /// Package-level annotations.
    #[serde(default)]
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// An action declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActionSpec {
    /// Path or URL of the action source file.
    #[serde(default)]
    pub function: Option<String>,
    /// Inline source code (alternative to `function`).
    #[serde(default)]
    pub code: Option<String>,
    /// Runtime kind tag (e.g. `nodejs:default`); inferred from the source
    /// file extension when omitted.
    #[serde(default)]
    pub runtime: Option<String>,
    /// Action version.
    #[serde(default)]
    pub version: Option<String>,
    /// Entry point within the source file.
    #[serde(default)]
    pub main: Option<String>,
    /// Input parameter mapping.
    #[serde(default)]
    pub inputs: IndexMap<String, ParameterSpec>,
    /// Output parameter mapping.
    #[serde(default)]
    pub outputs: IndexMap<String, ParameterSpec>,
    /// Resource limits.
    #[serde(default)]
    pub limits: Option<LimitsSpec>,
    /// Web-export mode, one of `true`/`yes`/`raw`/`false`/`no`.
    #[serde(default, rename = "web-export")]
    pub web_export: Option<String>,
    /// Action annotations.
    #[serde(default)]
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// Resource limits for an action.
///
/// Ranges are validated against the platform's accepted bounds: timeout in
/// milliseconds, memory and log size in megabytes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitsSpec {
    /// Execution timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<i64>,
    /// Memory limit in MB.
    #[serde(default, rename = "memorySize")]
    pub memory: Option<i64>,
    /// Log size limit in MB.
    #[serde(default, rename = "logSize")]
    pub logsize: Option<i64>,
}

/// A sequence declaration: an ordered chain of action references.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SequenceSpec {
    /// Comma-separated list of component action names, in invocation order.
    pub actions: String,
    /// Web-export mode, same surface as actions.
    #[serde(default, rename = "web-export")]
    pub web_export: Option<String>,
    /// Sequence annotations.
    #[serde(default)]
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// A trigger declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TriggerSpec {
    /// Fully qualified feed action name (external event source), if any.
    #[serde(default)]
    pub feed: Option<String>,
    /// Trigger parameter mapping.
    #[serde(default)]
    pub inputs: IndexMap<String, ParameterSpec>,
    /// Trigger annotations.
    #[serde(default)]
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// A rule declaration binding one trigger to one action or sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleSpec {
    /// Name of the trigger that fires this rule.
    pub trigger: String,
    /// Name of the action or sequence the rule invokes.
    pub action: String,
    /// Rule annotations.
    #[serde(default)]
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// A package dependency declaration.
///
/// A location starting with `/` is a binding to a package already present on
/// the platform (e.g. `/whisk.system/utils`); anything else names another
/// package declared in the same manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DependencySpec {
    /// Dependency location.
    #[serde(default)]
    pub location: String,
    /// Dependency version.
    #[serde(default)]
    pub version: Option<String>,
    /// Parameter overrides applied to the binding.
    #[serde(default)]
    pub inputs: IndexMap<String, ParameterSpec>,
    /// Binding annotations.
    #[serde(default)]
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// A parameter declaration, in either shorthand or record form.
///
/// The shorthand form is a single line (`name: value`); the record form
/// carries type/default/required metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParameterSpec {
    /// Multi-line record form.
    Full(Parameter),
    /// Single-line shorthand: the value itself.
    Shorthand(serde_json::Value),
}

/// The record form of a parameter declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    /// Declared type tag (string, integer, float, boolean, json).
    #[serde(default, rename = "type")]
    pub param_type: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Explicit value.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// Whether a value must be supplied by the deployment file.
    #[serde(default)]
    pub required: bool,
    /// Default value used when no explicit value is given.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// Web-export mode of an action or sequence.
///
/// Closed set parsed from the accepted spellings `true`/`yes`/`raw`/`false`/
/// `no` (case-insensitive); anything else is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WebExport {
    /// Not reachable over unauthenticated HTTP.
    #[default]
    Disabled,
    /// Reachable over unauthenticated HTTP.
    Enabled,
    /// Reachable over unauthenticated HTTP with raw request/response bodies.
    EnabledRaw,
}

impl WebExport {
    /// Parses a web-export mode from its manifest spelling.
    ///
    /// # Errors
    ///
    /// Returns the invalid value when it is not one of the accepted
    /// spellings.
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.to_lowercase().as_str() {
            "true" | "yes" => Ok(Self::Enabled),
            "raw" => Ok(Self::EnabledRaw),
            "false" | "no" => Ok(Self::Disabled),
            other => Err(other.to_string()),
        }
    }
}

impl ParameterSpec {
    /// Returns the effective value: the explicit value, falling back to the
    /// declared default.
    #[must_use]
    pub fn effective_value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Shorthand(value) => Some(value),
            Self::Full(param) => param.value.as_ref().or(param.default.as_ref()),
        }
    }

    /// Returns true if the parameter must be supplied by the deployment file.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        match self {
            Self::Shorthand(_) => false,
            Self::Full(param) => param.required,
        }
    }
}

impl SequenceSpec {
    /// Returns the component action names in invocation order.
    #[must_use]
    pub fn components(&self) -> Vec<String> {
        self.actions
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

impl DependencySpec {
    /// Returns true if this dependency is a binding to a package already on
    /// the platform rather than to a package in this manifest.
    #[must_use]
    pub fn is_binding(&self) -> bool {
        self.location.starts_with('/')
    }

    /// For bindings, the source `(namespace, package)` the binding imports.
    #[must_use]
    pub fn binding_source(&self) -> Option<(String, String)> {
        if !self.is_binding() {
            return None;
        }
        let mut parts = self.location.trim_start_matches('/').splitn(2, '/');
        let namespace = parts.next()?.to_string();
        let package = parts.next()?.to_string();
        Some((namespace, package))
    }
}

impl ManifestDoc {
    /// Returns the project name, if a project header is present.
    #[must_use]
    pub fn project_name(&self) -> Option<&str> {
        self.project
            .as_ref()
            .map(|p| p.name.as_str())
            .filter(|n| !n.is_empty())
    }

    /// Returns package names in declaration order.
    #[must_use]
    pub fn package_names(&self) -> Vec<&str> {
        self.packages.keys().map(String::as_str).collect()
    }
}

impl PackageSpec {
    /// Returns the package version, applying the platform default.
    #[must_use]
    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_PACKAGE_VERSION)
    }

    /// Returns the package license, applying the platform default.
    #[must_use]
    pub fn license_or_default(&self) -> &str {
        self.license.as_deref().unwrap_or(DEFAULT_PACKAGE_LICENSE)
    }

    /// Flattens the nested API route map into a list of routes.
    #[must_use]
    pub fn api_routes(&self) -> Vec<ApiRoute> {
        let mut routes = Vec::new();
        for (api_name, base_paths) in &self.apis {
            for (base_path, rel_paths) in base_paths {
                for (rel_path, actions) in rel_paths {
                    for (action, method) in actions {
                        routes.push(ApiRoute {
                            api_name: api_name.clone(),
                            base_path: base_path.clone(),
                            rel_path: rel_path.clone(),
                            action: action.clone(),
                            method: method.clone(),
                        });
                    }
                }
            }
        }
        routes
    }
}

/// A flattened API gateway route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoute {
    /// API name.
    pub api_name: String,
    /// Gateway base path.
    pub base_path: String,
    /// Path relative to the base path.
    pub rel_path: String,
    /// Backing action name.
    pub action: String,
    /// HTTP method.
    pub method: String,
}
