//! Schema validation for manifest documents.
//!
//! Validates a parsed manifest before merging: required fields, recognized
//! runtime kinds, web-export spellings, limit ranges, and name uniqueness.
//! Validation never touches the network or the filesystem.

use tracing::debug;

use crate::error::{Document, Result, SchemaError, StratusError};

use super::spec::{ActionSpec, LimitsSpec, ManifestDoc, PackageSpec, WebExport};

/// Runtime families accepted by the platform.
///
/// A declared runtime kind is `family:version`; only the family is checked
/// here, version resolution is the platform's concern.
const KNOWN_RUNTIME_FAMILIES: &[&str] = &[
    "nodejs", "python", "java", "swift", "php", "go", "ruby", "dotnet", "blackbox", "sequence",
];

/// Accepted range for the timeout limit, in milliseconds.
const TIMEOUT_RANGE_MS: (i64, i64) = (100, 300_000);

/// Accepted range for the memory limit, in MB.
const MEMORY_RANGE_MB: (i64, i64) = (128, 512);

/// Accepted range for the log size limit, in MB.
const LOGSIZE_RANGE_MB: (i64, i64) = (0, 10);

/// Validator for manifest documents.
#[derive(Debug, Default)]
pub struct ManifestValidator;

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Schema errors, in discovery order.
    pub errors: Vec<SchemaError>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl ManifestValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a manifest document.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] found; the full list is available
    /// through the returned [`ValidationResult`] when validation passes.
    pub fn validate(&self, manifest: &ManifestDoc) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        for (package_name, package) in &manifest.packages {
            Self::validate_package(package_name, package, &mut result);
        }

        if result.errors.is_empty() {
            debug!("Manifest validation passed");
            Ok(result)
        } else {
            Err(StratusError::Schema(result.errors.remove(0)))
        }
    }

    /// Validates one package and everything it contains.
    fn validate_package(name: &str, package: &PackageSpec, result: &mut ValidationResult) {
        if package.actions.is_empty()
            && package.sequences.is_empty()
            && package.triggers.is_empty()
            && package.rules.is_empty()
            && package.dependencies.is_empty()
        {
            result
                .warnings
                .push(format!("package '{name}' declares no entities"));
        }

        // Actions and sequences share the platform's action namespace.
        for seq_name in package.sequences.keys() {
            if package.actions.contains_key(seq_name) {
                result.errors.push(SchemaError::DuplicateName {
                    document: Document::Manifest,
                    kind: String::from("action"),
                    name: seq_name.clone(),
                    scope: format!("package '{name}'"),
                });
            }
        }

        for (action_name, action) in &package.actions {
            Self::validate_action(&qualified(name, action_name), action, result);
        }

        for (seq_name, sequence) in &package.sequences {
            let entity = qualified(name, seq_name);
            if sequence.components().is_empty() {
                result.errors.push(SchemaError::MissingField {
                    document: Document::Manifest,
                    entity: format!("sequence '{entity}'"),
                    field: String::from("actions"),
                });
            }
            if let Some(mode) = &sequence.web_export {
                Self::validate_web_export(&entity, mode, result);
            }
        }

        for (rule_name, rule) in &package.rules {
            let entity = qualified(name, rule_name);
            if rule.trigger.is_empty() {
                result.errors.push(SchemaError::MissingField {
                    document: Document::Manifest,
                    entity: format!("rule '{entity}'"),
                    field: String::from("trigger"),
                });
            }
            if rule.action.is_empty() {
                result.errors.push(SchemaError::MissingField {
                    document: Document::Manifest,
                    entity: format!("rule '{entity}'"),
                    field: String::from("action"),
                });
            }
        }

        for (dep_name, dependency) in &package.dependencies {
            if dependency.location.is_empty() {
                result.errors.push(SchemaError::MissingField {
                    document: Document::Manifest,
                    entity: format!("dependency '{}'", qualified(name, dep_name)),
                    field: String::from("location"),
                });
            }
        }
    }

    /// Validates one action declaration.
    fn validate_action(entity: &str, action: &ActionSpec, result: &mut ValidationResult) {
        if action.function.is_none() && action.code.is_none() {
            result.errors.push(SchemaError::MissingActionSource {
                action: entity.to_string(),
            });
        }

        if let Some(runtime) = &action.runtime {
            let family = runtime.split(':').next().unwrap_or(runtime);
            if !KNOWN_RUNTIME_FAMILIES.contains(&family) {
                result.errors.push(SchemaError::UnknownRuntime {
                    action: entity.to_string(),
                    runtime: runtime.clone(),
                });
            }
        }

        if let Some(mode) = &action.web_export {
            Self::validate_web_export(entity, mode, result);
        }

        if let Some(limits) = &action.limits {
            Self::validate_limits(entity, limits, result);
        }
    }

    /// Validates a web-export spelling.
    fn validate_web_export(entity: &str, mode: &str, result: &mut ValidationResult) {
        if let Err(value) = WebExport::parse(mode) {
            result.errors.push(SchemaError::InvalidWebExport {
                entity: entity.to_string(),
                value,
            });
        }
    }

    /// Validates resource limits against the platform's accepted ranges.
    fn validate_limits(entity: &str, limits: &LimitsSpec, result: &mut ValidationResult) {
        let checks = [
            ("timeout", limits.timeout, TIMEOUT_RANGE_MS),
            ("memorySize", limits.memory, MEMORY_RANGE_MB),
            ("logSize", limits.logsize, LOGSIZE_RANGE_MB),
        ];

        for (limit, value, (min, max)) in checks {
            let Some(value) = value else {
                continue;
            };
            if !(min..=max).contains(&value) {
                result.errors.push(SchemaError::LimitOutOfRange {
                    action: entity.to_string(),
                    limit: limit.to_string(),
                    value,
                    min,
                    max,
                });
            }
        }
    }
}

/// Joins a package and entity name into a fully qualified name.
fn qualified(package: &str, name: &str) -> String {
    format!("{package}/{name}")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parser::ManifestParser;
    use std::path::Path;

    fn parse(yaml: &str) -> ManifestDoc {
        ManifestParser::new()
            .parse_manifest_str(yaml, Path::new("manifest.yaml"))
            .unwrap()
    }

    #[test]
    fn test_valid_manifest_passes() {
        let manifest = parse(
            r#"
packages:
  demo:
    actions:
      hello:
        function: src/hello.js
        runtime: nodejs:default
        web-export: "raw"
        limits:
          timeout: 60000
"#,
        );
        let result = ManifestValidator::new().validate(&manifest).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_action_without_source_fails() {
        let manifest = parse(
            r"
packages:
  demo:
    actions:
      hello:
        runtime: nodejs:default
",
        );
        let err = ManifestValidator::new().validate(&manifest).unwrap_err();
        assert!(matches!(
            err,
            StratusError::Schema(SchemaError::MissingActionSource { .. })
        ));
    }

    #[test]
    fn test_unknown_runtime_fails() {
        let manifest = parse(
            r"
packages:
  demo:
    actions:
      hello:
        function: src/hello.cob
        runtime: cobol:85
",
        );
        let err = ManifestValidator::new().validate(&manifest).unwrap_err();
        assert!(matches!(
            err,
            StratusError::Schema(SchemaError::UnknownRuntime { .. })
        ));
    }

    #[test]
    fn test_invalid_web_export_fails() {
        let manifest = parse(
            r#"
packages:
  demo:
    actions:
      hello:
        function: src/hello.js
        web-export: "maybe"
"#,
        );
        let err = ManifestValidator::new().validate(&manifest).unwrap_err();
        match err {
            StratusError::Schema(SchemaError::InvalidWebExport { value, .. }) => {
                assert_eq!(value, "maybe");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_limit_out_of_range_fails() {
        let manifest = parse(
            r"
packages:
  demo:
    actions:
      hello:
        function: src/hello.js
        limits:
          memorySize: 4096
",
        );
        let err = ManifestValidator::new().validate(&manifest).unwrap_err();
        assert!(matches!(
            err,
            StratusError::Schema(SchemaError::LimitOutOfRange { .. })
        ));
    }

    #[test]
    fn test_action_sequence_name_collision() {
        let manifest = parse(
            r"
packages:
  demo:
    actions:
      step:
        function: src/step.js
    sequences:
      step:
        actions: step
",
        );
        let err = ManifestValidator::new().validate(&manifest).unwrap_err();
        assert!(matches!(
            err,
            StratusError::Schema(SchemaError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_rule_missing_trigger_fails() {
        let manifest = parse(
            r"
packages:
  demo:
    actions:
      hello:
        function: src/hello.js
    rules:
      bad-rule:
        trigger: ''
        action: hello
",
        );
        let err = ManifestValidator::new().validate(&manifest).unwrap_err();
        assert!(matches!(
            err,
            StratusError::Schema(SchemaError::MissingField { .. })
        ));
    }

    #[test]
    fn test_empty_package_warns() {
        let manifest = parse(
            r"
packages:
  empty: {}
",
        );
        let result = ManifestValidator::new().validate(&manifest).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }
}
