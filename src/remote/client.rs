//! Platform REST client.
//!
//! The [`RemoteClient`] trait is the seam between plan execution and the
//! network: the executor only ever asks whether an entity exists and to
//! create, update, or delete it. [`HttpRemoteClient`] is the production
//! implementation against the platform's REST API; tests substitute
//! in-memory fakes.

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{RemoteError, Result, StratusError};

use super::types::{EntityAddress, EntityPayload, FeedLifecycle, KeyValue};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Operations a deployment step needs against the platform.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Returns true if the addressed entity exists.
    async fn exists(&self, address: &EntityAddress) -> Result<bool>;

    /// Creates the addressed entity; fails if it already exists.
    async fn create(&self, address: &EntityAddress, payload: &EntityPayload) -> Result<()>;

    /// Updates the addressed entity in place.
    async fn update(&self, address: &EntityAddress, payload: &EntityPayload) -> Result<()>;

    /// Deletes the addressed entity. Deleting an absent entity succeeds.
    async fn delete(&self, address: &EntityAddress) -> Result<()>;

    /// Notifies a feed action of a trigger lifecycle event.
    async fn invoke_feed(
        &self,
        feed: &str,
        trigger: &EntityAddress,
        event: FeedLifecycle,
        inputs: &[KeyValue],
    ) -> Result<()>;
}

/// REST client for the platform API.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    /// HTTP client.
    client: Client,
    /// API host, scheme included.
    api_host: String,
    /// Basic-auth credential in `key:secret` form.
    auth: String,
}

impl HttpRemoteClient {
    /// Creates a new platform client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_host: &str, auth: &str) -> Result<Self> {
        Self::with_timeout(api_host, auth, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(api_host: &str, auth: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RemoteError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_host: api_host.trim_end_matches('/').to_string(),
            auth: auth.to_string(),
        })
    }

    /// Builds the REST route for an entity address.
    ///
    /// Packaged entity names contain a slash, which must travel inside a
    /// single path segment.
    fn route(&self, address: &EntityAddress) -> String {
        format!(
            "{}/api/v1/namespaces/{}/{}/{}",
            self.api_host,
            address.namespace,
            address.collection.path_segment(),
            address.name.replace('/', "%2F"),
        )
    }

    /// Splits the `key:secret` credential for basic auth.
    fn credentials(&self) -> (String, Option<String>) {
        match self.auth.split_once(':') {
            Some((user, pass)) => (user.to_string(), Some(pass.to_string())),
            None => (self.auth.clone(), None),
        }
    }

    /// Sends a request with retries on transient failures.
    ///
    /// Rate-limited responses wait out the server's `Retry-After` hint;
    /// other transient failures back off linearly.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let mut last_error: Option<StratusError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Self::retry_delay(attempt, last_error.as_ref());
                debug!("Retry attempt {attempt} of {MAX_RETRIES} after {delay:?}");
                tokio::time::sleep(delay).await;
            }

            match self.send_once(method.clone(), url, body).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if e.is_retryable() {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StratusError::Remote(RemoteError::NetworkError {
                message: String::from("Max retries exceeded"),
            })
        }))
    }

    /// Computes the backoff before a retry: the failed attempt's retry hint
    /// when it carries one, linear backoff otherwise.
    fn retry_delay(attempt: u32, error: Option<&StratusError>) -> Duration {
        error.and_then(StratusError::retry_delay_secs).map_or_else(
            || Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)),
            Duration::from_secs,
        )
    }

    /// Sends a single request and maps the platform's error statuses.
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response> {
        trace!("{method} {url}");

        let (user, pass) = self.credentials();
        let mut request = self
            .client
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json")
            .basic_auth(user, pass);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            StratusError::Remote(RemoteError::NetworkError {
                message: format!("Request failed: {e}"),
            })
        })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(StratusError::Remote(RemoteError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StratusError::Remote(RemoteError::AuthenticationFailed {
                message: String::from("Invalid platform credentials"),
            }));
        }

        Ok(response)
    }

    /// Turns a non-success response into an API error.
    async fn check_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StratusError::Remote(RemoteError::api_error(
            status.as_u16(),
            body,
        )))
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn exists(&self, address: &EntityAddress) -> Result<bool> {
        let url = self.route(address);
        let response = self.send(Method::GET, &url, None).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StratusError::Remote(RemoteError::api_error(
                    status.as_u16(),
                    body,
                )))
            }
        }
    }

    async fn create(&self, address: &EntityAddress, payload: &EntityPayload) -> Result<()> {
        let url = format!("{}?overwrite=false", self.route(address));
        let body = serde_json::to_value(payload).map_err(|e| {
            StratusError::Remote(RemoteError::InvalidResponse {
                message: format!("Failed to serialize payload: {e}"),
            })
        })?;

        let response = self.send(Method::PUT, &url, Some(&body)).await?;
        Self::check_success(response).await
    }

    async fn update(&self, address: &EntityAddress, payload: &EntityPayload) -> Result<()> {
        let url = format!("{}?overwrite=true", self.route(address));
        let body = serde_json::to_value(payload).map_err(|e| {
            StratusError::Remote(RemoteError::InvalidResponse {
                message: format!("Failed to serialize payload: {e}"),
            })
        })?;

        let response = self.send(Method::PUT, &url, Some(&body)).await?;
        Self::check_success(response).await
    }

    async fn delete(&self, address: &EntityAddress) -> Result<()> {
        let url = self.route(address);
        let response = self.send(Method::DELETE, &url, None).await?;

        // Absent entities are already in the desired state.
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Entity {address} already absent, delete is a no-op");
            return Ok(());
        }
        Self::check_success(response).await
    }

    async fn invoke_feed(
        &self,
        feed: &str,
        trigger: &EntityAddress,
        event: FeedLifecycle,
        inputs: &[KeyValue],
    ) -> Result<()> {
        // Feed actions are invoked like any action, with the lifecycle event
        // and the fully qualified trigger name folded into the arguments.
        let feed_path = feed.trim_start_matches('/');
        let (feed_namespace, feed_name) = feed_path.split_once('/').ok_or_else(|| {
            StratusError::Remote(RemoteError::InvalidResponse {
                message: format!("Feed reference '{feed}' is not fully qualified"),
            })
        })?;

        let url = format!(
            "{}/api/v1/namespaces/{}/actions/{}?blocking=true",
            self.api_host,
            feed_namespace,
            feed_name.replace('/', "%2F"),
        );

        let mut body = serde_json::Map::new();
        body.insert(
            String::from("lifecycleEvent"),
            serde_json::json!(event.as_str()),
        );
        body.insert(
            String::from("triggerName"),
            serde_json::json!(trigger.fully_qualified()),
        );
        body.insert(String::from("authKey"), serde_json::json!(self.auth));
        for kv in inputs {
            body.insert(kv.key.clone(), kv.value.clone());
        }

        let response = self
            .send(Method::POST, &url, Some(&serde_json::Value::Object(body)))
            .await?;
        Self::check_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::types::Collection;

    fn client() -> HttpRemoteClient {
        HttpRemoteClient::new("https://platform.example.com/", "uuid:secret").unwrap()
    }

    #[test]
    fn test_route_encodes_packaged_name() {
        let addr = EntityAddress::new("_", Collection::Actions, "greeting/hello");
        assert_eq!(
            client().route(&addr),
            "https://platform.example.com/api/v1/namespaces/_/actions/greeting%2Fhello"
        );
    }

    #[test]
    fn test_route_trims_trailing_slash() {
        let addr = EntityAddress::new("prod", Collection::Packages, "greeting");
        assert_eq!(
            client().route(&addr),
            "https://platform.example.com/api/v1/namespaces/prod/packages/greeting"
        );
    }

    #[test]
    fn test_credentials_split() {
        let (user, pass) = client().credentials();
        assert_eq!(user, "uuid");
        assert_eq!(pass.as_deref(), Some("secret"));
    }

    #[test]
    fn test_credentials_without_separator() {
        let c = HttpRemoteClient::new("https://platform.example.com", "token").unwrap();
        let (user, pass) = c.credentials();
        assert_eq!(user, "token");
        assert!(pass.is_none());
    }

    #[test]
    fn test_retry_delay_honors_rate_limit_hint() {
        let err = StratusError::Remote(RemoteError::RateLimited {
            retry_after_secs: 60,
        });
        assert_eq!(
            HttpRemoteClient::retry_delay(1, Some(&err)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_retry_delay_linear_for_network_errors() {
        let err = StratusError::Remote(RemoteError::network("connection reset"));
        assert_eq!(
            HttpRemoteClient::retry_delay(1, Some(&err)),
            Duration::from_millis(1000)
        );
        assert_eq!(
            HttpRemoteClient::retry_delay(2, Some(&err)),
            Duration::from_millis(2000)
        );
    }
}
