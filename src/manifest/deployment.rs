//! Deployment document types.
//!
//! The deployment file supplies environment-specific values for entities
//! already declared in the manifest: per-package credentials and namespaces,
//! and per-action (or per-trigger) input overrides. It never introduces new
//! entities.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::spec::ParameterSpec;

/// The root structure of a parsed deployment document.
///
/// Packages may appear under a `project` header or at the top level; the
/// project form wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeploymentDoc {
    /// Optional project header with nested packages.
    #[serde(default)]
    pub project: Option<DeploymentProject>,
    /// Top-level package overrides, in declaration order.
    #[serde(default)]
    pub packages: IndexMap<String, DeploymentPackage>,
}

/// Project header of a deployment document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeploymentProject {
    /// Project name; must match the manifest's project name when both are set.
    #[serde(default)]
    pub name: String,
    /// Project version.
    #[serde(default)]
    pub version: Option<String>,
    /// Package overrides scoped to the project.
    #[serde(default)]
    pub packages: IndexMap<String, DeploymentPackage>,
}

/// Environment-specific overrides for one package.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeploymentPackage {
    /// Credential override; replaces the manifest-declared credential.
    #[serde(default)]
    pub credential: Option<String>,
    /// Namespace override.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Package-level parameter overrides, attached to the package entity
    /// itself (not copied onto its actions).
    #[serde(default)]
    pub inputs: IndexMap<String, ParameterSpec>,
    /// Per-action input overrides.
    #[serde(default)]
    pub actions: IndexMap<String, DeploymentAction>,
    /// Per-trigger input overrides.
    #[serde(default)]
    pub triggers: IndexMap<String, DeploymentTrigger>,
}

/// Input overrides for one action.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeploymentAction {
    /// Input overrides keyed by parameter name.
    #[serde(default)]
    pub inputs: IndexMap<String, ParameterSpec>,
}

/// Input overrides for one trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeploymentTrigger {
    /// Input overrides keyed by parameter name.
    #[serde(default)]
    pub inputs: IndexMap<String, ParameterSpec>,
}

impl DeploymentDoc {
    /// Returns the project name, if a project header is present.
    #[must_use]
    pub fn project_name(&self) -> Option<&str> {
        self.project
            .as_ref()
            .map(|p| p.name.as_str())
            .filter(|n| !n.is_empty())
    }

    /// Returns the effective package overrides.
    ///
    /// Packages nested under the project header take precedence over the
    /// top-level form.
    #[must_use]
    pub fn effective_packages(&self) -> &IndexMap<String, DeploymentPackage> {
        match &self.project {
            Some(project) if !project.packages.is_empty() => &project.packages,
            _ => &self.packages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_packages_win() {
        let mut top = IndexMap::new();
        top.insert(String::from("ignored"), DeploymentPackage::default());

        let mut nested = IndexMap::new();
        nested.insert(String::from("used"), DeploymentPackage::default());

        let doc = DeploymentDoc {
            project: Some(DeploymentProject {
                name: String::from("demo"),
                version: None,
                packages: nested,
            }),
            packages: top,
        };

        assert!(doc.effective_packages().contains_key("used"));
        assert!(!doc.effective_packages().contains_key("ignored"));
    }

    #[test]
    fn test_top_level_packages_fallback() {
        let mut top = IndexMap::new();
        top.insert(String::from("pkg"), DeploymentPackage::default());

        let doc = DeploymentDoc {
            project: None,
            packages: top,
        };

        assert!(doc.effective_packages().contains_key("pkg"));
        assert_eq!(doc.project_name(), None);
    }
}
