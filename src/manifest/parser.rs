//! Document loading for manifest and deployment files.
//!
//! This module handles locating the default document files within a project
//! root and parsing them from YAML, with typed errors instead of process
//! aborts so the caller decides what is fatal.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Document, ParseError, Result, StratusError};

use super::deployment::DeploymentDoc;
use super::spec::ManifestDoc;

/// Default manifest file names, in preference order.
pub const DEFAULT_MANIFEST_FILES: &[&str] = &["manifest.yaml", "manifest.yml"];

/// Default deployment file names, in preference order.
pub const DEFAULT_DEPLOYMENT_FILES: &[&str] = &["deployment.yaml", "deployment.yml"];

/// Parser for manifest and deployment documents.
#[derive(Debug, Default)]
pub struct ManifestParser {
    /// Base path for resolving relative paths and the `.env` file.
    base_path: Option<PathBuf>,
}

impl ManifestParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the file is missing, unreadable, or not
    /// valid YAML.
    pub fn parse_manifest(&self, path: impl AsRef<Path>) -> Result<ManifestDoc> {
        let path = path.as_ref();
        info!("Loading manifest from: {}", path.display());
        let content = read_document(Document::Manifest, path)?;
        parse_yaml(Document::Manifest, path, &content)
    }

    /// Loads and parses a deployment file.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the file is missing, unreadable, or not
    /// valid YAML.
    pub fn parse_deployment(&self, path: impl AsRef<Path>) -> Result<DeploymentDoc> {
        let path = path.as_ref();
        info!("Loading deployment file from: {}", path.display());
        let content = read_document(Document::Deployment, path)?;
        parse_yaml(Document::Deployment, path, &content)
    }

    /// Parses a manifest from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the YAML is invalid.
    pub fn parse_manifest_str(&self, content: &str, source: &Path) -> Result<ManifestDoc> {
        parse_yaml(Document::Manifest, source, content)
    }

    /// Parses a deployment document from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the YAML is invalid.
    pub fn parse_deployment_str(&self, content: &str, source: &Path) -> Result<DeploymentDoc> {
        parse_yaml(Document::Deployment, source, content)
    }

    /// Loads the `.env` file under the base path if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                StratusError::internal(format!(
                    "Failed to load .env file {}: {e}",
                    env_path.display()
                ))
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Reads a document file, mapping IO failures to typed parse errors.
fn read_document(document: Document, path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(StratusError::Parse(ParseError::FileNotFound {
            document,
            path: path.to_path_buf(),
        }));
    }

    std::fs::read_to_string(path).map_err(|e| {
        StratusError::Parse(ParseError::ReadFailed {
            document,
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })
}

/// Parses a YAML document into the target type.
fn parse_yaml<T: serde::de::DeserializeOwned>(
    document: Document,
    path: &Path,
    content: &str,
) -> Result<T> {
    debug!("Parsing {document} YAML");
    serde_yaml::from_str(content).map_err(|e| {
        StratusError::Parse(ParseError::Malformed {
            document,
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })
}

/// Finds the manifest file within a project root.
///
/// `.yaml` is preferred when both extensions exist.
///
/// # Errors
///
/// Returns a [`ParseError::FileNotFound`] when no manifest file exists.
pub fn find_manifest_file(project_root: impl AsRef<Path>) -> Result<PathBuf> {
    let root = project_root.as_ref();
    for filename in DEFAULT_MANIFEST_FILES {
        let candidate = root.join(filename);
        if candidate.exists() {
            info!("Found manifest file: {}", candidate.display());
            return Ok(candidate);
        }
    }

    Err(StratusError::Parse(ParseError::FileNotFound {
        document: Document::Manifest,
        path: root.join(DEFAULT_MANIFEST_FILES[0]),
    }))
}

/// Finds the deployment file within a project root, if one exists.
///
/// The deployment file is optional; `.yaml` is preferred when both extensions
/// exist.
#[must_use]
pub fn find_deployment_file(project_root: impl AsRef<Path>) -> Option<PathBuf> {
    let root = project_root.as_ref();
    for filename in DEFAULT_DEPLOYMENT_FILES {
        let candidate = root.join(filename);
        if candidate.exists() {
            info!("Found deployment file: {}", candidate.display());
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_manifest() {
        let yaml = r"
packages:
  demo:
    actions:
      hello:
        function: src/hello.js
";
        let parser = ManifestParser::new();
        let result = parser.parse_manifest_str(yaml, Path::new("manifest.yaml"));
        assert!(result.is_ok());

        let manifest = result.unwrap();
        assert_eq!(manifest.package_names(), vec!["demo"]);
        assert!(manifest.packages["demo"].actions.contains_key("hello"));
    }

    #[test]
    fn test_duplicate_keys_last_declaration_wins() {
        // YAML duplicate keys of the same kind are not an error: the later
        // declaration silently replaces the earlier one.
        let yaml = r"
packages:
  demo:
    actions:
      hello:
        function: src/first.js
      hello:
        function: src/second.js
";
        let manifest = ManifestParser::new()
            .parse_manifest_str(yaml, Path::new("manifest.yaml"))
            .unwrap();

        let pkg = &manifest.packages["demo"];
        assert_eq!(pkg.actions.len(), 1);
        assert_eq!(
            pkg.actions["hello"].function.as_deref(),
            Some("src/second.js")
        );
    }

    #[test]
    fn test_parse_full_manifest() {
        let yaml = r#"
project:
  name: greeting-app
packages:
  greeting:
    version: 1.0.0
    license: Apache-2.0
    actions:
      hello:
        function: src/hello.js
        runtime: nodejs:default
        web-export: "true"
        inputs:
          name:
            type: string
            default: stranger
          place: earth
        limits:
          timeout: 60000
          memorySize: 256
    sequences:
      pipeline:
        actions: hello
    triggers:
      every-minute:
        feed: /whisk.system/alarms/alarm
        inputs:
          cron: "* * * * *"
    rules:
      invoke-hello:
        trigger: every-minute
        action: hello
"#;
        let parser = ManifestParser::new();
        let manifest = parser
            .parse_manifest_str(yaml, Path::new("manifest.yaml"))
            .unwrap();

        assert_eq!(manifest.project_name(), Some("greeting-app"));
        let pkg = &manifest.packages["greeting"];
        assert_eq!(pkg.version_or_default(), "1.0.0");
        assert_eq!(pkg.actions["hello"].web_export.as_deref(), Some("true"));
        assert_eq!(pkg.actions["hello"].inputs.len(), 2);
        assert_eq!(pkg.rules["invoke-hello"].trigger, "every-minute");
        assert_eq!(
            pkg.triggers["every-minute"].feed.as_deref(),
            Some("/whisk.system/alarms/alarm")
        );
    }

    #[test]
    fn test_parse_deployment_overrides() {
        let yaml = r#"
project:
  name: greeting-app
  packages:
    greeting:
      credential: "abc:123"
      actions:
        hello:
          inputs:
            name: Bernie
"#;
        let parser = ManifestParser::new();
        let doc = parser
            .parse_deployment_str(yaml, Path::new("deployment.yaml"))
            .unwrap();

        assert_eq!(doc.project_name(), Some("greeting-app"));
        let pkg = &doc.effective_packages()["greeting"];
        assert_eq!(pkg.credential.as_deref(), Some("abc:123"));
        assert!(pkg.actions["hello"].inputs.contains_key("name"));
    }

    #[test]
    fn test_malformed_yaml_is_typed_error() {
        let parser = ManifestParser::new();
        let result = parser.parse_manifest_str("packages: [:", Path::new("manifest.yaml"));
        assert!(matches!(
            result,
            Err(StratusError::Parse(ParseError::Malformed { .. }))
        ));
    }

    #[test]
    fn test_find_manifest_prefers_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.yml"), "packages: {}").unwrap();
        std::fs::write(dir.path().join("manifest.yaml"), "packages: {}").unwrap();

        let found = find_manifest_file(dir.path()).unwrap();
        assert!(found.ends_with("manifest.yaml"));
    }

    #[test]
    fn test_find_manifest_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = find_manifest_file(dir.path());
        assert!(matches!(
            result,
            Err(StratusError::Parse(ParseError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_find_deployment_optional() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_deployment_file(dir.path()).is_none());

        std::fs::write(dir.path().join("deployment.yml"), "packages: {}").unwrap();
        let found = find_deployment_file(dir.path()).unwrap();
        assert!(found.ends_with("deployment.yml"));
    }
}
