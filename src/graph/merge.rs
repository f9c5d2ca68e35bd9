//! Manifest/deployment merger.
//!
//! Combines the manifest model with the optional deployment model into one
//! resolved entity graph. The merge is total: it either returns a graph with
//! every reference closed and every override applied, or it fails — partial
//! graphs are never returned.
//!
//! Precedence: deployment-file values win over manifest values for
//! credentials, namespaces, and any input named by an override; everything
//! else keeps its manifest value.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{MergeError, Result, SchemaError, StratusError};
use crate::manifest::{
    ActionSpec, DeploymentDoc, DeploymentPackage, ManifestDoc, PackageSpec, ParameterSpec,
    SequenceSpec, TriggerSpec, WebExport,
};

use super::resolved::{
    ResolvedAction, ResolvedBinding, ResolvedGraph, ResolvedPackage, ResolvedRule,
    ResolvedSequence, ResolvedTrigger, DEFAULT_NAMESPACE,
};

/// Merger combining manifest and deployment models.
#[derive(Debug)]
pub struct Merger {
    /// Namespace applied to packages that do not declare one.
    default_namespace: String,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

impl Merger {
    /// Creates a merger with the platform default namespace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_namespace: String::from(DEFAULT_NAMESPACE),
        }
    }

    /// Sets the namespace applied to packages that do not declare one.
    #[must_use]
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    /// Merges a manifest and an optional deployment document into a resolved
    /// graph.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeError`] when the deployment file references an entity
    /// absent from the manifest, when a rule or sequence reference dangles,
    /// or when the two documents disagree on the project name.
    pub fn merge(
        &self,
        manifest: &ManifestDoc,
        deployment: Option<&DeploymentDoc>,
    ) -> Result<ResolvedGraph> {
        let project_name = check_project_names(manifest, deployment)?;

        if let Some(deployment) = deployment {
            check_override_targets(manifest, deployment)?;
        }

        let empty = IndexMap::new();
        let overrides = deployment.map_or(&empty, DeploymentDoc::effective_packages);

        let mut packages = Vec::with_capacity(manifest.packages.len());
        for (package_name, package) in &manifest.packages {
            let package_overrides = overrides.get(package_name);
            packages.push(self.merge_package(package_name, package, package_overrides)?);
        }

        let graph = ResolvedGraph {
            project_name,
            packages,
        };
        debug!(
            "Merged graph: {} packages, {} entities",
            graph.packages.len(),
            graph.entity_count()
        );
        Ok(graph)
    }

    /// Merges one package with its deployment overrides.
    fn merge_package(
        &self,
        name: &str,
        package: &PackageSpec,
        overrides: Option<&DeploymentPackage>,
    ) -> Result<ResolvedPackage> {
        let credential = overrides
            .and_then(|o| o.credential.clone())
            .or_else(|| package.credential.clone())
            .map(|c| interpolate_env(&c));

        let namespace = overrides
            .and_then(|o| o.namespace.clone())
            .or_else(|| package.namespace.clone())
            .map_or_else(|| self.default_namespace.clone(), |n| interpolate_env(&n));

        let inputs = overrides.map_or_else(IndexMap::new, |o| merge_inputs(&o.inputs, None));

        let mut dependencies = Vec::new();
        let mut bindings = Vec::new();
        for (alias, dependency) in &package.dependencies {
            if let Some((source_namespace, source_package)) = dependency.binding_source() {
                bindings.push(ResolvedBinding {
                    name: alias.clone(),
                    source_namespace,
                    source_package,
                    inputs: merge_inputs(&dependency.inputs, None),
                    annotations: dependency.annotations.clone(),
                });
            } else {
                let target = if dependency.location.is_empty() {
                    alias.clone()
                } else {
                    dependency.location.clone()
                };
                dependencies.push(target);
            }
        }

        let mut actions = Vec::with_capacity(package.actions.len());
        for (action_name, action) in &package.actions {
            let action_overrides = overrides.and_then(|o| o.actions.get(action_name));
            actions.push(merge_action(
                name,
                action_name,
                action,
                action_overrides.map(|o| &o.inputs),
            )?);
        }

        let mut sequences = Vec::with_capacity(package.sequences.len());
        for (seq_name, sequence) in &package.sequences {
            sequences.push(resolve_sequence(name, seq_name, sequence, package)?);
        }

        let mut triggers = Vec::with_capacity(package.triggers.len());
        for (trigger_name, trigger) in &package.triggers {
            let trigger_overrides = overrides.and_then(|o| o.triggers.get(trigger_name));
            triggers.push(merge_trigger(
                trigger_name,
                trigger,
                trigger_overrides.map(|o| &o.inputs),
            ));
        }

        let mut rules = Vec::with_capacity(package.rules.len());
        for (rule_name, rule) in &package.rules {
            let qualified = format!("{name}/{rule_name}");
            if rule.trigger.contains('/') {
                // Externally qualified triggers are assumed to exist remotely.
            } else if !package.triggers.contains_key(&rule.trigger) {
                return Err(StratusError::Merge(MergeError::UnresolvedTrigger {
                    rule: qualified,
                    trigger: rule.trigger.clone(),
                }));
            }
            if !rule.action.contains('/')
                && !package.actions.contains_key(&rule.action)
                && !package.sequences.contains_key(&rule.action)
            {
                return Err(StratusError::Merge(MergeError::UnresolvedRuleAction {
                    rule: qualified,
                    action: rule.action.clone(),
                }));
            }
            rules.push(ResolvedRule {
                name: rule_name.clone(),
                trigger: rule.trigger.clone(),
                action: rule.action.clone(),
                annotations: rule.annotations.clone(),
            });
        }

        let apis = package.api_routes();
        for route in &apis {
            if !route.action.contains('/')
                && !package.actions.contains_key(&route.action)
                && !package.sequences.contains_key(&route.action)
            {
                return Err(StratusError::Merge(MergeError::UnresolvedApiAction {
                    api: route.api_name.clone(),
                    action: route.action.clone(),
                }));
            }
        }

        Ok(ResolvedPackage {
            name: name.to_string(),
            version: package.version_or_default().to_string(),
            license: package.license_or_default().to_string(),
            namespace,
            credential,
            inputs,
            dependencies,
            bindings,
            actions,
            sequences,
            triggers,
            rules,
            apis,
            annotations: package.annotations.clone(),
        })
    }
}

/// Checks that manifest and deployment agree on the project name when both
/// declare one.
fn check_project_names(
    manifest: &ManifestDoc,
    deployment: Option<&DeploymentDoc>,
) -> Result<Option<String>> {
    let manifest_name = manifest.project_name();
    let deployment_name = deployment.and_then(DeploymentDoc::project_name);

    match (manifest_name, deployment_name) {
        (Some(m), Some(d)) if m != d => Err(StratusError::Merge(MergeError::ProjectNameMismatch {
            manifest: m.to_string(),
            deployment: d.to_string(),
        })),
        (m, d) => Ok(m.or(d).map(String::from)),
    }
}

/// Verifies every deployment override targets an entity declared in the
/// manifest before any merging begins.
fn check_override_targets(manifest: &ManifestDoc, deployment: &DeploymentDoc) -> Result<()> {
    for (package_name, overrides) in deployment.effective_packages() {
        let Some(package) = manifest.packages.get(package_name) else {
            return Err(StratusError::Merge(MergeError::UnknownPackage {
                package: package_name.clone(),
            }));
        };

        for action_name in overrides.actions.keys() {
            if !package.actions.contains_key(action_name)
                && !package.sequences.contains_key(action_name)
            {
                return Err(StratusError::Merge(MergeError::UnknownAction {
                    package: package_name.clone(),
                    action: action_name.clone(),
                }));
            }
        }

        for trigger_name in overrides.triggers.keys() {
            if !package.triggers.contains_key(trigger_name) {
                return Err(StratusError::Merge(MergeError::UnknownTrigger {
                    package: package_name.clone(),
                    trigger: trigger_name.clone(),
                }));
            }
        }
    }
    Ok(())
}

/// Merges an action's manifest inputs with its deployment overrides.
fn merge_action(
    package: &str,
    name: &str,
    action: &ActionSpec,
    overrides: Option<&IndexMap<String, ParameterSpec>>,
) -> Result<ResolvedAction> {
    let qualified = format!("{package}/{name}");
    let inputs = merge_inputs(&action.inputs, overrides);

    for (input_name, spec) in &action.inputs {
        if spec.is_required() && !inputs.contains_key(input_name) {
            warn!("action '{qualified}': required input '{input_name}' has no value");
        }
    }

    let web_export = parse_web_export(&qualified, action.web_export.as_deref())?;

    Ok(ResolvedAction {
        name: name.to_string(),
        source: action.function.clone(),
        code: action.code.clone(),
        runtime: action.runtime.clone(),
        main: action.main.clone(),
        version: action.version.clone(),
        inputs,
        limits: action.limits,
        web_export,
        annotations: action.annotations.clone(),
    })
}

/// Resolves a sequence's component references within its package.
///
/// Bare component names must resolve to an action or sequence of the same
/// package; qualified names (`pkg/name` or `/ns/pkg/name`) are assumed to
/// exist remotely or in a dependency package.
fn resolve_sequence(
    package_name: &str,
    name: &str,
    sequence: &SequenceSpec,
    package: &PackageSpec,
) -> Result<ResolvedSequence> {
    let qualified = format!("{package_name}/{name}");
    let components = sequence.components();

    for component in &components {
        if !component.contains('/')
            && !package.actions.contains_key(component)
            && !package.sequences.contains_key(component)
        {
            return Err(StratusError::Merge(MergeError::UnresolvedComponent {
                sequence: qualified,
                component: component.clone(),
            }));
        }
    }

    let web_export = parse_web_export(&qualified, sequence.web_export.as_deref())?;

    Ok(ResolvedSequence {
        name: name.to_string(),
        components,
        web_export,
        annotations: sequence.annotations.clone(),
    })
}

/// Merges a trigger's manifest inputs with its deployment overrides.
fn merge_trigger(
    name: &str,
    trigger: &TriggerSpec,
    overrides: Option<&IndexMap<String, ParameterSpec>>,
) -> ResolvedTrigger {
    ResolvedTrigger {
        name: name.to_string(),
        feed: trigger.feed.clone(),
        inputs: merge_inputs(&trigger.inputs, overrides),
        annotations: trigger.annotations.clone(),
    }
}

/// Computes effective input values: manifest defaults, then deployment
/// overrides replacing only the inputs they name.
fn merge_inputs(
    declared: &IndexMap<String, ParameterSpec>,
    overrides: Option<&IndexMap<String, ParameterSpec>>,
) -> IndexMap<String, serde_json::Value> {
    let mut inputs = IndexMap::new();

    for (name, spec) in declared {
        if let Some(value) = spec.effective_value() {
            inputs.insert(name.clone(), interpolate_value(value));
        }
    }

    if let Some(overrides) = overrides {
        for (name, spec) in overrides {
            if let Some(value) = spec.effective_value() {
                inputs.insert(name.clone(), interpolate_value(value));
            }
        }
    }

    inputs
}

/// Parses a declared web-export spelling into the closed enum.
fn parse_web_export(entity: &str, mode: Option<&str>) -> Result<WebExport> {
    mode.map_or(Ok(WebExport::Disabled), |m| {
        WebExport::parse(m).map_err(|value| {
            StratusError::Schema(SchemaError::InvalidWebExport {
                entity: entity.to_string(),
                value,
            })
        })
    })
}

/// Interpolates environment variables inside a JSON value.
///
/// Only string values are interpolated; nested structures pass through
/// unchanged.
fn interpolate_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(interpolate_env(s)),
        other => other.clone(),
    }
}

/// Replaces `$VAR` and `${VAR}` tokens with values from the process
/// environment. An unset variable resolves to the empty string with a
/// warning.
#[must_use]
pub fn interpolate_env(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            output.push(c);
            continue;
        }

        let braced = matches!(chars.peek(), Some((_, '{')));
        if braced {
            chars.next();
        }

        let mut var = String::new();
        while let Some((_, nc)) = chars.peek().copied() {
            let part_of_name = if braced {
                nc != '}'
            } else {
                nc.is_ascii_alphanumeric() || nc == '_'
            };
            if !part_of_name {
                break;
            }
            var.push(nc);
            chars.next();
        }
        if braced {
            if matches!(chars.peek(), Some((_, '}'))) {
                chars.next();
            } else {
                // Unterminated `${`: not a reference, echo it through.
                output.push_str("${");
                output.push_str(&var);
                continue;
            }
        }

        if var.is_empty() {
            output.push('$');
            if braced {
                output.push_str("{}");
            }
            continue;
        }

        match std::env::var(&var) {
            Ok(value) => output.push_str(&value),
            Err(_) => {
                warn!("environment variable '{var}' is not set; using empty string");
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestParser;
    use std::path::Path;

    fn parse_manifest(yaml: &str) -> ManifestDoc {
        ManifestParser::new()
            .parse_manifest_str(yaml, Path::new("manifest.yaml"))
            .unwrap()
    }

    fn parse_deployment(yaml: &str) -> DeploymentDoc {
        ManifestParser::new()
            .parse_deployment_str(yaml, Path::new("deployment.yaml"))
            .unwrap()
    }

    const MANIFEST: &str = r"
packages:
  greeting:
    credential: manifest-cred
    actions:
      hello:
        function: src/hello.js
        runtime: nodejs:default
        inputs:
          name:
            type: string
            default: stranger
          place: earth
    triggers:
      gong: {}
    rules:
      on-gong:
        trigger: gong
        action: hello
";

    #[test]
    fn test_merge_totality_overrides_named_inputs_only() {
        let manifest = parse_manifest(MANIFEST);
        let deployment = parse_deployment(
            r"
packages:
  greeting:
    actions:
      hello:
        inputs:
          name: Bernie
",
        );

        let graph = Merger::new().merge(&manifest, Some(&deployment)).unwrap();
        let action = graph.package("greeting").unwrap().action("hello").unwrap();

        assert_eq!(action.inputs["name"], serde_json::json!("Bernie"));
        assert_eq!(action.inputs["place"], serde_json::json!("earth"));
    }

    #[test]
    fn test_merge_without_deployment_keeps_defaults() {
        let manifest = parse_manifest(MANIFEST);
        let graph = Merger::new().merge(&manifest, None).unwrap();
        let action = graph.package("greeting").unwrap().action("hello").unwrap();

        assert_eq!(action.inputs["name"], serde_json::json!("stranger"));
        assert_eq!(
            graph.package("greeting").unwrap().credential.as_deref(),
            Some("manifest-cred")
        );
    }

    #[test]
    fn test_deployment_credential_wins() {
        let manifest = parse_manifest(MANIFEST);
        let deployment = parse_deployment(
            r"
packages:
  greeting:
    credential: deploy-cred
",
        );

        let graph = Merger::new().merge(&manifest, Some(&deployment)).unwrap();
        assert_eq!(
            graph.package("greeting").unwrap().credential.as_deref(),
            Some("deploy-cred")
        );
    }

    #[test]
    fn test_unknown_package_rejected() {
        let manifest = parse_manifest(MANIFEST);
        let deployment = parse_deployment(
            r"
packages:
  nonexistent:
    credential: cred
",
        );

        let err = Merger::new()
            .merge(&manifest, Some(&deployment))
            .unwrap_err();
        assert!(matches!(
            err,
            StratusError::Merge(MergeError::UnknownPackage { .. })
        ));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let manifest = parse_manifest(MANIFEST);
        let deployment = parse_deployment(
            r"
packages:
  greeting:
    actions:
      goodbye:
        inputs:
          name: Bernie
",
        );

        let err = Merger::new()
            .merge(&manifest, Some(&deployment))
            .unwrap_err();
        match err {
            StratusError::Merge(MergeError::UnknownAction { package, action }) => {
                assert_eq!(package, "greeting");
                assert_eq!(action, "goodbye");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_trigger_inputs_override() {
        let manifest = parse_manifest(
            r"
packages:
  clock:
    triggers:
      every-minute:
        inputs:
          cron: '* * * * *'
          enabled: true
",
        );
        let deployment = parse_deployment(
            r"
packages:
  clock:
    triggers:
      every-minute:
        inputs:
          cron: '0 * * * *'
",
        );

        let graph = Merger::new().merge(&manifest, Some(&deployment)).unwrap();
        let trigger = graph
            .package("clock")
            .unwrap()
            .trigger("every-minute")
            .unwrap();
        assert_eq!(trigger.inputs["cron"], serde_json::json!("0 * * * *"));
        assert_eq!(trigger.inputs["enabled"], serde_json::json!(true));
    }

    #[test]
    fn test_unknown_trigger_override_rejected() {
        let manifest = parse_manifest(MANIFEST);
        let deployment = parse_deployment(
            r"
packages:
  greeting:
    triggers:
      ghost:
        inputs:
          volume: 11
",
        );

        let err = Merger::new()
            .merge(&manifest, Some(&deployment))
            .unwrap_err();
        match err {
            StratusError::Merge(MergeError::UnknownTrigger { package, trigger }) => {
                assert_eq!(package, "greeting");
                assert_eq!(trigger, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unresolved_rule_trigger_rejected() {
        let manifest = parse_manifest(
            r"
packages:
  demo:
    actions:
      hello:
        function: src/hello.js
    rules:
      bad:
        trigger: ghost
        action: hello
",
        );

        let err = Merger::new().merge(&manifest, None).unwrap_err();
        assert!(matches!(
            err,
            StratusError::Merge(MergeError::UnresolvedTrigger { .. })
        ));
    }

    #[test]
    fn test_unresolved_sequence_component_rejected() {
        let manifest = parse_manifest(
            r"
packages:
  demo:
    actions:
      fetch:
        function: src/fetch.js
    sequences:
      pipeline:
        actions: fetch, ghost
",
        );

        let err = Merger::new().merge(&manifest, None).unwrap_err();
        match err {
            StratusError::Merge(MergeError::UnresolvedComponent {
                sequence,
                component,
            }) => {
                assert_eq!(sequence, "demo/pipeline");
                assert_eq!(component, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_project_name_mismatch_rejected() {
        let manifest = parse_manifest(
            r"
project:
  name: app-one
packages:
  demo: {}
",
        );
        let deployment = parse_deployment(
            r"
project:
  name: app-two
",
        );

        let err = Merger::new()
            .merge(&manifest, Some(&deployment))
            .unwrap_err();
        assert!(matches!(
            err,
            StratusError::Merge(MergeError::ProjectNameMismatch { .. })
        ));
    }

    #[test]
    fn test_binding_dependency_split() {
        let manifest = parse_manifest(
            r"
packages:
  helper:
    actions:
      util:
        function: src/util.js
  demo:
    dependencies:
      helper:
        location: helper
      sys-utils:
        location: /whisk.system/utils
",
        );

        let graph = Merger::new().merge(&manifest, None).unwrap();
        let demo = graph.package("demo").unwrap();
        assert_eq!(demo.dependencies, vec!["helper"]);
        assert_eq!(demo.bindings.len(), 1);
        assert_eq!(demo.bindings[0].source_package, "utils");
    }

    #[test]
    fn test_env_interpolation() {
        assert_eq!(interpolate_env("no vars here"), "no vars here");
        // Unset variables resolve to the empty string.
        assert_eq!(interpolate_env("x$STRATUS_TEST_UNSET_VAR!x"), "x!x");
        assert_eq!(interpolate_env("x${STRATUS_TEST_UNSET_VAR}x"), "xx");

        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(interpolate_env("p=$PATH"), format!("p={path}"));
        assert_eq!(interpolate_env("p=${PATH};"), format!("p={path};"));
    }

    #[test]
    fn test_env_interpolation_brace_edge_cases() {
        // Empty and unterminated braces are not references.
        assert_eq!(interpolate_env("${}"), "${}");
        assert_eq!(interpolate_env("a${}b"), "a${}b");
        assert_eq!(interpolate_env("${UNTERMINATED"), "${UNTERMINATED");
        assert_eq!(interpolate_env("a${"), "a${");
        assert_eq!(interpolate_env("$"), "$");
    }
}
