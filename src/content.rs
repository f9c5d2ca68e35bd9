//! Action source loading.
//!
//! Action code is fetched lazily, right before the step that deploys it:
//! inline code comes straight from the manifest, file references are read
//! relative to the manifest's directory, and http(s) references are fetched
//! over the network. The runtime kind is inferred from the source extension
//! when the manifest does not declare one.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{RemoteError, Result, SchemaError, StratusError};
use crate::graph::ResolvedAction;

/// Runtime kinds inferred from source file extensions.
const RUNTIME_BY_EXTENSION: &[(&str, &str)] = &[
    ("js", "nodejs:default"),
    ("py", "python:default"),
    ("swift", "swift:default"),
    ("jar", "java:default"),
    ("java", "java:default"),
    ("php", "php:default"),
    ("go", "go:default"),
    ("rb", "ruby:default"),
];

/// Infers the runtime kind from a source reference's extension.
#[must_use]
pub fn infer_runtime(source: &str) -> Option<&'static str> {
    let extension = Path::new(source).extension()?.to_str()?;
    RUNTIME_BY_EXTENSION
        .iter()
        .find(|(ext, _)| extension.eq_ignore_ascii_case(ext))
        .map(|&(_, runtime)| runtime)
}

/// Loads action sources relative to the manifest's directory.
#[derive(Debug, Clone)]
pub struct ContentReader {
    /// Directory file references resolve against.
    base_path: PathBuf,
}

impl ContentReader {
    /// Creates a reader resolving file references against `base_path`.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolves an action into its `(runtime, code)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or fetched, or if the
    /// runtime kind cannot be determined.
    pub async fn resolve(&self, action: &ResolvedAction) -> Result<(String, String)> {
        let code = match (&action.code, &action.source) {
            (Some(code), _) => code.clone(),
            (None, Some(source)) => self.load_source(source).await?,
            (None, None) => {
                return Err(StratusError::Schema(SchemaError::MissingActionSource {
                    action: action.name.clone(),
                }));
            }
        };

        let runtime = match &action.runtime {
            Some(runtime) => runtime.clone(),
            None => {
                let source = action.source.as_deref().unwrap_or_default();
                infer_runtime(source)
                    .map(String::from)
                    .ok_or_else(|| {
                        StratusError::Schema(SchemaError::UnknownRuntimeExtension {
                            action: action.name.clone(),
                            src: source.to_string(),
                        })
                    })?
            }
        };

        Ok((runtime, code))
    }

    /// Reads a source reference: http(s) URL or manifest-relative path.
    async fn load_source(&self, source: &str) -> Result<String> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return fetch_url(source).await;
        }

        let path = self.base_path.join(source);
        debug!("Reading action source from {}", path.display());
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}

/// Fetches action code from a URL.
async fn fetch_url(url: &str) -> Result<String> {
    debug!("Fetching action source from {url}");

    let response = reqwest::get(url).await.map_err(|e| {
        StratusError::Remote(RemoteError::network(format!(
            "Failed to fetch action source {url}: {e}"
        )))
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(StratusError::Remote(RemoteError::api_error(
            status.as_u16(),
            format!("Failed to fetch action source {url}"),
        )));
    }

    response.text().await.map_err(|e| {
        StratusError::Remote(RemoteError::network(format!(
            "Failed to read action source {url}: {e}"
        )))
    })
}
