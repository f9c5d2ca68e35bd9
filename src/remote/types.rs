//! Wire payloads for the platform REST API.
//!
//! These mirror the platform's entity JSON surface. Payloads are built from
//! resolved graph entities right before a step executes, so a plan can be
//! inspected without touching any action source files.

use indexmap::IndexMap;
use serde::Serialize;

use crate::graph::{
    ResolvedAction, ResolvedBinding, ResolvedPackage, ResolvedRule, ResolvedSequence,
    ResolvedTrigger,
};
use crate::manifest::{ApiRoute, LimitsSpec, WebExport};

/// REST collection an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Collection {
    /// Packages and package bindings.
    Packages,
    /// Actions and sequences.
    Actions,
    /// Triggers.
    Triggers,
    /// Rules.
    Rules,
    /// API gateway routes.
    Apis,
}

impl Collection {
    /// Returns the URL path segment for this collection.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Packages => "packages",
            Self::Actions => "actions",
            Self::Triggers => "triggers",
            Self::Rules => "rules",
            Self::Apis => "apis",
        }
    }
}

/// Fully qualified address of an entity on the platform.
///
/// Packaged entities use the `package/name` form in the name position, which
/// the platform expects URL-encoded within a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityAddress {
    /// Target namespace.
    pub namespace: String,
    /// REST collection.
    pub collection: Collection,
    /// Entity name, possibly `package/name`.
    pub name: String,
}

impl EntityAddress {
    /// Creates a new entity address.
    #[must_use]
    pub fn new(namespace: impl Into<String>, collection: Collection, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            collection,
            name: name.into(),
        }
    }

    /// Returns the `/namespace/name` form used in cross-entity references.
    #[must_use]
    pub fn fully_qualified(&self) -> String {
        format!("/{}/{}", self.namespace, self.name)
    }
}

impl std::fmt::Display for EntityAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.namespace, self.name)
    }
}

/// A key/value parameter or annotation entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    /// Parameter key.
    pub key: String,
    /// Parameter value.
    pub value: serde_json::Value,
}

/// Converts a merged input map into the wire key/value list.
#[must_use]
pub fn key_values(map: &IndexMap<String, serde_json::Value>) -> Vec<KeyValue> {
    map.iter()
        .map(|(k, v)| KeyValue {
            key: k.clone(),
            value: v.clone(),
        })
        .collect()
}

/// Builds the three web annotations implied by a web-export mode.
///
/// Returns an empty list when web export is disabled so non-web entities
/// carry no web annotations at all.
#[must_use]
pub fn web_annotations(mode: WebExport) -> Vec<KeyValue> {
    let (web, raw) = match mode {
        WebExport::Disabled => return Vec::new(),
        WebExport::Enabled => (true, false),
        WebExport::EnabledRaw => (true, true),
    };
    vec![
        KeyValue {
            key: String::from("web-export"),
            value: serde_json::json!(web),
        },
        KeyValue {
            key: String::from("raw-http"),
            value: serde_json::json!(raw),
        },
        KeyValue {
            key: String::from("final"),
            value: serde_json::json!(true),
        },
    ]
}

/// Reference to a source package, used by bindings.
#[derive(Debug, Clone, Serialize)]
pub struct BindingTarget {
    /// Source package namespace.
    pub namespace: String,
    /// Source package name.
    pub name: String,
}

/// Package creation/update payload. Also used for bindings, which are
/// packages carrying a `binding` reference.
#[derive(Debug, Clone, Serialize)]
pub struct RemotePackage {
    /// Package name.
    pub name: String,
    /// Package version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Whether the package is publicly visible.
    pub publish: bool,
    /// Package parameters.
    pub parameters: Vec<KeyValue>,
    /// Package annotations.
    pub annotations: Vec<KeyValue>,
    /// Source package, when this payload is a binding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<BindingTarget>,
}

/// Executable part of an action payload.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteExec {
    /// Runtime kind, or `sequence` for sequences.
    pub kind: String,
    /// Source code; absent for sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Entry point within the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Fully qualified component names, for sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<String>>,
}

/// Resource limits payload.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteLimits {
    /// Invocation timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    /// Memory allowance in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    /// Log allowance in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<i64>,
}

/// Action creation/update payload.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteAction {
    /// Action name.
    pub name: String,
    /// Action version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Executable.
    pub exec: RemoteExec,
    /// Action parameters.
    pub parameters: Vec<KeyValue>,
    /// Action annotations, web annotations included.
    pub annotations: Vec<KeyValue>,
    /// Resource limits, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<RemoteLimits>,
}

/// Trigger creation/update payload.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteTrigger {
    /// Trigger name.
    pub name: String,
    /// Trigger parameters.
    pub parameters: Vec<KeyValue>,
    /// Trigger annotations. Carries a `feed` annotation when the trigger is
    /// backed by a feed action.
    pub annotations: Vec<KeyValue>,
}

/// Rule creation/update payload.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteRule {
    /// Rule name.
    pub name: String,
    /// Fully qualified trigger reference.
    pub trigger: String,
    /// Fully qualified action reference.
    pub action: String,
    /// Rule status; new rules start active.
    pub status: String,
}

/// API gateway route payload.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteApi {
    /// API name.
    #[serde(rename = "apiName")]
    pub api_name: String,
    /// Gateway base path.
    #[serde(rename = "gatewayBasePath")]
    pub base_path: String,
    /// Path relative to the base path.
    #[serde(rename = "gatewayPath")]
    pub rel_path: String,
    /// HTTP method.
    #[serde(rename = "gatewayMethod")]
    pub method: String,
    /// Fully qualified backing action.
    pub action: String,
}

/// Feed lifecycle events sent to feed actions alongside trigger changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedLifecycle {
    /// The trigger was just created.
    Create,
    /// The trigger is about to be deleted.
    Delete,
}

impl FeedLifecycle {
    /// Returns the wire spelling of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
        }
    }
}

/// A fully built payload for one plan step.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EntityPayload {
    /// Package or binding payload.
    Package(RemotePackage),
    /// Action or sequence payload.
    Action(RemoteAction),
    /// Trigger payload.
    Trigger(RemoteTrigger),
    /// Rule payload.
    Rule(RemoteRule),
    /// API route payload.
    Api(RemoteApi),
}

impl EntityPayload {
    /// Builds a package payload.
    #[must_use]
    pub fn from_package(package: &ResolvedPackage) -> Self {
        Self::Package(RemotePackage {
            name: package.name.clone(),
            version: Some(package.version.clone()),
            publish: false,
            parameters: key_values(&package.inputs),
            annotations: key_values(&package.annotations),
            binding: None,
        })
    }

    /// Builds a binding payload.
    #[must_use]
    pub fn from_binding(binding: &ResolvedBinding) -> Self {
        Self::Package(RemotePackage {
            name: binding.name.clone(),
            version: None,
            publish: false,
            parameters: key_values(&binding.inputs),
            annotations: key_values(&binding.annotations),
            binding: Some(BindingTarget {
                namespace: binding.source_namespace.clone(),
                name: binding.source_package.clone(),
            }),
        })
    }

    /// Builds an action payload from resolved fields plus loaded code.
    #[must_use]
    pub fn from_action(action: &ResolvedAction, runtime: String, code: String) -> Self {
        let mut annotations = key_values(&action.annotations);
        annotations.extend(web_annotations(action.web_export));

        Self::Action(RemoteAction {
            name: action.name.clone(),
            version: action.version.clone(),
            exec: RemoteExec {
                kind: runtime,
                code: Some(code),
                main: action.main.clone(),
                components: None,
            },
            parameters: key_values(&action.inputs),
            annotations,
            limits: action.limits.as_ref().map(remote_limits),
        })
    }

    /// Builds a sequence payload; components must already be fully qualified.
    #[must_use]
    pub fn from_sequence(sequence: &ResolvedSequence, components: Vec<String>) -> Self {
        let mut annotations = key_values(&sequence.annotations);
        annotations.extend(web_annotations(sequence.web_export));

        Self::Action(RemoteAction {
            name: sequence.name.clone(),
            version: None,
            exec: RemoteExec {
                kind: String::from("sequence"),
                code: None,
                main: None,
                components: Some(components),
            },
            parameters: Vec::new(),
            annotations,
            limits: None,
        })
    }

    /// Builds a trigger payload. Feed parameters are delivered to the feed
    /// action separately, so a fed trigger carries only the `feed`
    /// annotation here.
    #[must_use]
    pub fn from_trigger(trigger: &ResolvedTrigger) -> Self {
        let mut annotations = key_values(&trigger.annotations);
        let parameters = if let Some(feed) = &trigger.feed {
            annotations.push(KeyValue {
                key: String::from("feed"),
                value: serde_json::json!(feed),
            });
            Vec::new()
        } else {
            key_values(&trigger.inputs)
        };

        Self::Trigger(RemoteTrigger {
            name: trigger.name.clone(),
            parameters,
            annotations,
        })
    }

    /// Builds a rule payload from fully qualified references.
    #[must_use]
    pub fn from_rule(rule: &ResolvedRule, trigger: String, action: String) -> Self {
        Self::Rule(RemoteRule {
            name: rule.name.clone(),
            trigger,
            action,
            status: String::from("active"),
        })
    }

    /// Builds an API route payload.
    #[must_use]
    pub fn from_api(route: &ApiRoute, action: String) -> Self {
        Self::Api(RemoteApi {
            api_name: route.api_name.clone(),
            base_path: route.base_path.clone(),
            rel_path: route.rel_path.clone(),
            method: route.method.clone(),
            action,
        })
    }
}

fn remote_limits(limits: &LimitsSpec) -> RemoteLimits {
    RemoteLimits {
        timeout: limits.timeout,
        memory: limits.memory,
        logs: limits.logsize,
    }
}
