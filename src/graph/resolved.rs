//! The resolved entity graph.
//!
//! Produced once per invocation by the merger and immutable thereafter: the
//! planner derives plans from it, the executor reads entity payloads out of
//! it, and nothing mutates it. All references inside a resolved graph are
//! closed — dangling references fail the merge instead.

use indexmap::IndexMap;
use serde::Serialize;

use crate::manifest::{ApiRoute, LimitsSpec, WebExport};

/// Namespace used when neither document nor environment names one.
pub const DEFAULT_NAMESPACE: &str = "_";

/// A fully resolved, reference-closed entity graph.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    /// Project name, when either document declared one.
    pub project_name: Option<String>,
    /// Packages in declaration order.
    pub packages: Vec<ResolvedPackage>,
}

/// A package with all overrides applied.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Package license.
    pub license: String,
    /// Target namespace.
    pub namespace: String,
    /// Resolved credential (deployment file wins over manifest).
    pub credential: Option<String>,
    /// Package parameter mapping (from the deployment file).
    pub inputs: IndexMap<String, serde_json::Value>,
    /// Names of manifest packages this package depends on.
    pub dependencies: Vec<String>,
    /// Bindings importing platform packages under a local alias.
    pub bindings: Vec<ResolvedBinding>,
    /// Actions in declaration order.
    pub actions: Vec<ResolvedAction>,
    /// Sequences in declaration order.
    pub sequences: Vec<ResolvedSequence>,
    /// Triggers in declaration order.
    pub triggers: Vec<ResolvedTrigger>,
    /// Rules in declaration order.
    pub rules: Vec<ResolvedRule>,
    /// API gateway routes in declaration order.
    pub apis: Vec<ApiRoute>,
    /// Package annotations.
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// An action with merged inputs and a parsed web-export mode.
#[derive(Debug, Clone)]
pub struct ResolvedAction {
    /// Action name.
    pub name: String,
    /// Source reference (path or URL), unless the code is inline.
    pub source: Option<String>,
    /// Inline source code.
    pub code: Option<String>,
    /// Runtime kind; `None` means infer from the source extension.
    pub runtime: Option<String>,
    /// Entry point within the source file.
    pub main: Option<String>,
    /// Action version.
    pub version: Option<String>,
    /// Merged input values (deployment overrides over manifest defaults).
    pub inputs: IndexMap<String, serde_json::Value>,
    /// Resource limits.
    pub limits: Option<LimitsSpec>,
    /// Web-export mode.
    pub web_export: WebExport,
    /// Action annotations.
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// A sequence whose component references all resolved.
#[derive(Debug, Clone)]
pub struct ResolvedSequence {
    /// Sequence name.
    pub name: String,
    /// Component action references, in invocation order.
    pub components: Vec<String>,
    /// Web-export mode.
    pub web_export: WebExport,
    /// Sequence annotations.
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// A trigger with merged inputs.
#[derive(Debug, Clone)]
pub struct ResolvedTrigger {
    /// Trigger name.
    pub name: String,
    /// Fully qualified feed action name, if any.
    pub feed: Option<String>,
    /// Merged input values.
    pub inputs: IndexMap<String, serde_json::Value>,
    /// Trigger annotations.
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// A rule whose trigger and action references both resolved.
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    /// Rule name.
    pub name: String,
    /// Referenced trigger name.
    pub trigger: String,
    /// Referenced action or sequence name.
    pub action: String,
    /// Rule annotations.
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// A binding importing a platform package under a local alias.
#[derive(Debug, Clone)]
pub struct ResolvedBinding {
    /// Local alias the binding is created under.
    pub name: String,
    /// Namespace of the source package.
    pub source_namespace: String,
    /// Name of the source package.
    pub source_package: String,
    /// Parameter overrides applied to the binding.
    pub inputs: IndexMap<String, serde_json::Value>,
    /// Binding annotations.
    pub annotations: IndexMap<String, serde_json::Value>,
}

/// A reference to an entity within the resolved graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityRef {
    /// Containing package name.
    pub package: String,
    /// Entity name within the package.
    pub name: String,
}

impl EntityRef {
    /// Creates a new entity reference.
    #[must_use]
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Returns the fully qualified `package/name` form.
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.package, self.name)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.package, self.name)
    }
}

impl ResolvedGraph {
    /// Looks up a package by name.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&ResolvedPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Returns the total number of plannable entities in the graph.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.packages
            .iter()
            .map(|p| {
                1 + p.bindings.len()
                    + p.actions.len()
                    + p.sequences.len()
                    + p.triggers.len()
                    + p.rules.len()
                    + p.apis.len()
            })
            .sum()
    }
}

impl ResolvedPackage {
    /// Looks up an action by name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ResolvedAction> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Looks up a sequence by name.
    #[must_use]
    pub fn sequence(&self, name: &str) -> Option<&ResolvedSequence> {
        self.sequences.iter().find(|s| s.name == name)
    }

    /// Looks up a trigger by name.
    #[must_use]
    pub fn trigger(&self, name: &str) -> Option<&ResolvedTrigger> {
        self.triggers.iter().find(|t| t.name == name)
    }
}
