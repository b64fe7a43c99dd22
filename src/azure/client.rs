//! Resource Manager REST client.
//!
//! [`ManagementApi`] is the seam the reconciler and dispatcher depend on;
//! [`ArmClient`] implements it over HTTPS with bearer authentication,
//! retries, `nextLink` pagination and long-running operation polling.
//! [`ResourceClient`] pins an API version onto any `ManagementApi`.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::auth::{credential_from_config, TokenCredential};
use super::error::{ArmError, ArmResult};
use super::poller::{self, PollConfig};
use crate::config::Config;
use crate::retry::RetryPolicy;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Remote operations of one management endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Fetch a single resource. A missing resource is `ArmError::NotFound`.
    async fn get(&self, path: &str, api_version: &str) -> ArmResult<Value>;

    /// List a collection, following every `nextLink`.
    async fn list(
        &self,
        path: &str,
        api_version: &str,
        filter: Option<String>,
    ) -> ArmResult<Vec<Value>>;

    /// Create or replace a resource and wait for it to be provisioned.
    async fn put(&self, path: &str, api_version: &str, body: &Value) -> ArmResult<Value>;

    /// Partially update a resource and wait for it to be provisioned.
    async fn patch(&self, path: &str, api_version: &str, body: &Value) -> ArmResult<Value>;

    /// Delete a resource and wait for the deletion to finish.
    async fn delete(&self, path: &str, api_version: &str) -> ArmResult<()>;
}

/// Configuration for [`ArmClient`].
#[derive(Debug, Clone)]
pub struct ArmClientConfig {
    /// Resource Manager endpoint, e.g. `https://management.azure.com`
    pub base_url: String,
    /// OAuth2 scope requested for every token
    pub scope: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy for throttled and failed requests
    pub retry: RetryPolicy,
    /// Long-running operation polling
    pub poll: PollConfig,
    /// User agent string
    pub user_agent: String,
}

impl Default for ArmClientConfig {
    fn default() -> Self {
        let cloud = super::cloud::CloudEnvironment::default();
        Self {
            base_url: cloud.resource_manager().to_string(),
            scope: cloud.scope(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            poll: PollConfig::default(),
            user_agent: format!("rustible-azure/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Raw HTTP exchange result, kept for the poller.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(&self.headers)
    }

    pub fn json(&self) -> ArmResult<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Authenticated Resource Manager client.
pub struct ArmClient {
    http: Client,
    credential: Arc<dyn TokenCredential>,
    config: ArmClientConfig,
}

impl ArmClient {
    /// Create a client from its parts.
    pub fn new(
        http: Client,
        credential: Arc<dyn TokenCredential>,
        config: ArmClientConfig,
    ) -> Self {
        Self {
            http,
            credential,
            config,
        }
    }

    /// Build an HTTP client with the configured timeout and user agent.
    pub fn http_client(config: &ArmClientConfig) -> ArmResult<Client> {
        url::Url::parse(&config.base_url).map_err(|e| {
            ArmError::Http(format!("invalid Resource Manager URL '{}': {}", config.base_url, e))
        })?;

        Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ArmError::Http(format!("failed to create HTTP client: {}", e)))
    }

    /// Resource Manager endpoint this client talks to.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub(crate) fn poll_config(&self) -> &PollConfig {
        &self.config.poll
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }

    /// Issue one request with retries. Non-success statuses become errors.
    ///
    /// `api_version` is appended only to relative paths; absolute URLs
    /// handed out by the service (`nextLink`, polling URLs) already carry it.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        api_version: Option<&str>,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> ArmResult<RawResponse> {
        let absolute = path.starts_with("http://") || path.starts_with("https://");
        let url = self.url(path);

        self.config
            .retry
            .execute(|| async {
                let token = self.credential.get_token(&self.config.scope).await?;
                debug!("{} {}", method, url);

                let mut request = self
                    .http
                    .request(method.clone(), &url)
                    .bearer_auth(&token.token);
                if let (false, Some(version)) = (absolute, api_version) {
                    request = request.query(&[("api-version", version)]);
                }
                if !query.is_empty() {
                    request = request.query(query);
                }
                if let Some(body) = body {
                    request = request.json(body);
                }

                let response = request.send().await?;
                let status = response.status().as_u16();
                let headers = response.headers().clone();
                let text = response.text().await?;

                if (200..300).contains(&status) {
                    Ok(RawResponse {
                        status,
                        headers,
                        body: text,
                    })
                } else {
                    Err(ArmError::from_response(
                        status,
                        path,
                        &text,
                        parse_retry_after(&headers),
                    ))
                }
            })
            .await
    }
}

#[async_trait]
impl ManagementApi for ArmClient {
    async fn get(&self, path: &str, api_version: &str) -> ArmResult<Value> {
        self.send(Method::GET, path, Some(api_version), &[], None)
            .await?
            .json()
    }

    async fn list(
        &self,
        path: &str,
        api_version: &str,
        filter: Option<String>,
    ) -> ArmResult<Vec<Value>> {
        let mut items = Vec::new();
        let query: Vec<(&str, &str)> = filter
            .as_deref()
            .map(|f| vec![("$filter", f)])
            .unwrap_or_default();

        let mut page = self
            .send(Method::GET, path, Some(api_version), &query, None)
            .await?
            .json()?;
        let mut pages = 1;

        loop {
            match page.get("value") {
                Some(Value::Array(values)) => items.extend(values.iter().cloned()),
                Some(_) => {
                    return Err(ArmError::InvalidResponse(format!(
                        "'value' of list response for {} is not an array",
                        path
                    )))
                }
                None => {}
            }

            let next = page
                .get("nextLink")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from);

            match next {
                Some(link) => {
                    pages += 1;
                    page = self.send(Method::GET, &link, None, &[], None).await?.json()?;
                }
                None => break,
            }
        }

        debug!("Listed {} items from {} ({} pages)", items.len(), path, pages);
        Ok(items)
    }

    async fn put(&self, path: &str, api_version: &str, body: &Value) -> ArmResult<Value> {
        let initial = self
            .send(Method::PUT, path, Some(api_version), &[], Some(body))
            .await?;
        poller::wait_for_completion(self, initial, Method::PUT, path, api_version).await
    }

    async fn patch(&self, path: &str, api_version: &str, body: &Value) -> ArmResult<Value> {
        let initial = self
            .send(Method::PATCH, path, Some(api_version), &[], Some(body))
            .await?;
        poller::wait_for_completion(self, initial, Method::PATCH, path, api_version).await
    }

    async fn delete(&self, path: &str, api_version: &str) -> ArmResult<()> {
        let initial = match self
            .send(Method::DELETE, path, Some(api_version), &[], None)
            .await
        {
            Ok(response) => response,
            Err(ArmError::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        poller::wait_for_completion(self, initial, Method::DELETE, path, api_version)
            .await
            .map(|_| ())
    }
}

/// Produces authenticated clients bound to an endpoint and API version.
pub struct ClientFactory {
    http: Client,
    credential: Arc<dyn TokenCredential>,
    config: ArmClientConfig,
}

impl ClientFactory {
    /// Build a factory from loaded configuration.
    pub fn from_config(config: &Config) -> ArmResult<Self> {
        let client_config = config.arm_client_config();
        let http = ArmClient::http_client(&client_config)?;
        let credential = credential_from_config(&config.azure, http.clone())?;
        Ok(Self {
            http,
            credential,
            config: client_config,
        })
    }

    /// Build a factory around an existing credential.
    pub fn new(credential: Arc<dyn TokenCredential>, config: ArmClientConfig) -> ArmResult<Self> {
        let http = ArmClient::http_client(&config)?;
        Ok(Self {
            http,
            credential,
            config,
        })
    }

    /// Management API for `base_url`, or the configured endpoint.
    pub fn api(&self, base_url: Option<&str>) -> Arc<dyn ManagementApi> {
        let mut config = self.config.clone();
        if let Some(url) = base_url {
            config.base_url = url.to_string();
        }
        Arc::new(ArmClient::new(
            self.http.clone(),
            self.credential.clone(),
            config,
        ))
    }

    /// Handle pinned to `api_version`.
    pub fn get_client(&self, base_url: Option<&str>, api_version: &str) -> ResourceClient {
        ResourceClient::new(self.api(base_url), api_version)
    }
}

/// A [`ManagementApi`] pinned to one API version.
#[derive(Clone)]
pub struct ResourceClient {
    api: Arc<dyn ManagementApi>,
    api_version: String,
}

impl ResourceClient {
    pub fn new(api: Arc<dyn ManagementApi>, api_version: impl Into<String>) -> Self {
        Self {
            api,
            api_version: api_version.into(),
        }
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Same endpoint, different API version.
    pub fn with_api_version(&self, api_version: impl Into<String>) -> Self {
        Self::new(self.api.clone(), api_version)
    }

    pub async fn get(&self, path: &str) -> ArmResult<Value> {
        self.api.get(path, &self.api_version).await
    }

    pub async fn list(&self, path: &str, filter: Option<String>) -> ArmResult<Vec<Value>> {
        self.api.list(path, &self.api_version, filter).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> ArmResult<Value> {
        self.api.put(path, &self.api_version, body).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> ArmResult<Value> {
        self.api.patch(path, &self.api_version, body).await
    }

    pub async fn delete(&self, path: &str) -> ArmResult<()> {
        self.api.delete(path, &self.api_version).await
    }
}
