//! Configuration for rustible-azure
//!
//! Settings are read from the standard locations in order, each file
//! overriding the previous one, and then from the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::azure::{ArmClientConfig, AuthSource, CloudEnvironment, PollConfig};
use crate::retry::RetryPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Azure account and credential settings
    pub azure: AzureConfig,

    /// Resource Manager client behaviour
    pub client: ClientConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Azure account and credential settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Default subscription for every module invocation
    pub subscription_id: Option<String>,

    /// Directory (tenant) of the service principal
    #[serde(alias = "tenant")]
    pub tenant_id: Option<String>,

    /// Service principal application id
    pub client_id: Option<String>,

    /// Service principal secret
    #[serde(alias = "secret", skip_serializing)]
    pub client_secret: Option<String>,

    /// Sovereign cloud
    pub cloud: CloudEnvironment,

    /// Credential selection
    pub auth_source: AuthSource,

    /// Pre-issued bearer token
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// Token endpoint override
    pub authority_host: Option<String>,

    /// Resource Manager endpoint override
    pub base_url: Option<String>,
}

/// Resource Manager client behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retries for throttled or transient failures
    pub max_retries: u32,

    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,

    /// Long-running operation poll interval in seconds
    pub poll_interval_secs: u64,

    /// Long-running operation deadline in seconds
    pub poll_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_retries: 3,
            retry_delay_ms: 1000,
            poll_interval_secs: 5,
            poll_timeout_secs: 1800,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no `-v` flag or `RUST_LOG` is given
    pub level: String,

    /// Log format: `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Explicit path takes priority
        if let Some(path) = explicit_path {
            paths.push(path.clone());
            return paths;
        }

        paths.push(PathBuf::from("/etc/rustible-azure/config.toml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".rustible-azure.toml"));
        }

        paths.push(PathBuf::from("rustible-azure.toml"));

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; set values in `other` win.
    fn merge(&self, other: Config) -> Config {
        let defaults = ClientConfig::default();
        let pick = |theirs: u64, ours: u64, default: u64| {
            if theirs != default {
                theirs
            } else {
                ours
            }
        };

        Config {
            azure: AzureConfig {
                subscription_id: other
                    .azure
                    .subscription_id
                    .or_else(|| self.azure.subscription_id.clone()),
                tenant_id: other.azure.tenant_id.or_else(|| self.azure.tenant_id.clone()),
                client_id: other.azure.client_id.or_else(|| self.azure.client_id.clone()),
                client_secret: other
                    .azure
                    .client_secret
                    .or_else(|| self.azure.client_secret.clone()),
                cloud: if other.azure.cloud != CloudEnvironment::default() {
                    other.azure.cloud
                } else {
                    self.azure.cloud
                },
                auth_source: if other.azure.auth_source != AuthSource::default() {
                    other.azure.auth_source
                } else {
                    self.azure.auth_source
                },
                access_token: other
                    .azure
                    .access_token
                    .or_else(|| self.azure.access_token.clone()),
                authority_host: other
                    .azure
                    .authority_host
                    .or_else(|| self.azure.authority_host.clone()),
                base_url: other.azure.base_url.or_else(|| self.azure.base_url.clone()),
            },
            client: ClientConfig {
                timeout_secs: pick(
                    other.client.timeout_secs,
                    self.client.timeout_secs,
                    defaults.timeout_secs,
                ),
                max_retries: if other.client.max_retries != defaults.max_retries {
                    other.client.max_retries
                } else {
                    self.client.max_retries
                },
                retry_delay_ms: pick(
                    other.client.retry_delay_ms,
                    self.client.retry_delay_ms,
                    defaults.retry_delay_ms,
                ),
                poll_interval_secs: pick(
                    other.client.poll_interval_secs,
                    self.client.poll_interval_secs,
                    defaults.poll_interval_secs,
                ),
                poll_timeout_secs: pick(
                    other.client.poll_timeout_secs,
                    self.client.poll_timeout_secs,
                    defaults.poll_timeout_secs,
                ),
            },
            logging: if other.logging != LoggingConfig::default() {
                other.logging
            } else {
                self.logging.clone()
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("AZURE_SUBSCRIPTION_ID") {
            self.azure.subscription_id = Some(id);
        }

        // The short names are the ones the Azure CLI and SDKs document
        if let Some(tenant) = first_env(&["AZURE_TENANT", "AZURE_TENANT_ID"]) {
            self.azure.tenant_id = Some(tenant);
        }

        if let Ok(client) = std::env::var("AZURE_CLIENT_ID") {
            self.azure.client_id = Some(client);
        }

        if let Some(secret) = first_env(&["AZURE_SECRET", "AZURE_CLIENT_SECRET"]) {
            self.azure.client_secret = Some(secret);
        }

        if let Ok(cloud) = std::env::var("AZURE_CLOUD_ENVIRONMENT") {
            match cloud.parse() {
                Ok(cloud) => self.azure.cloud = cloud,
                Err(e) => tracing::warn!("Ignoring AZURE_CLOUD_ENVIRONMENT: {}", e),
            }
        }

        if let Ok(source) = std::env::var("AZURE_AUTH_SOURCE") {
            match source.parse() {
                Ok(source) => self.azure.auth_source = source,
                Err(e) => tracing::warn!("Ignoring AZURE_AUTH_SOURCE: {}", e),
            }
        }

        if let Ok(token) = std::env::var("AZURE_ACCESS_TOKEN") {
            self.azure.access_token = Some(token);
        }

        if let Ok(url) = std::env::var("RUSTIBLE_AZURE_BASE_URL") {
            self.azure.base_url = Some(url);
        }

        if let Ok(timeout) = std::env::var("RUSTIBLE_AZURE_TIMEOUT") {
            if let Ok(n) = timeout.parse() {
                self.client.timeout_secs = n;
            }
        }

        if let Ok(interval) = std::env::var("RUSTIBLE_AZURE_POLL_INTERVAL") {
            if let Ok(n) = interval.parse() {
                self.client.poll_interval_secs = n;
            }
        }
    }

    /// Resource Manager endpoint: the explicit override or the cloud's own.
    pub fn base_url(&self) -> String {
        self.azure
            .base_url
            .clone()
            .unwrap_or_else(|| self.azure.cloud.resource_manager().to_string())
    }

    /// Build the HTTP client settings for the Resource Manager client.
    pub fn arm_client_config(&self) -> ArmClientConfig {
        let retry = RetryPolicy::builder()
            .max_retries(self.client.max_retries)
            .initial_delay(Duration::from_millis(self.client.retry_delay_ms))
            .build();

        ArmClientConfig {
            base_url: self.base_url(),
            scope: self.azure.cloud.scope(),
            timeout: Duration::from_secs(self.client.timeout_secs),
            retry,
            poll: PollConfig {
                interval: Duration::from_secs(self.client.poll_interval_secs),
                timeout: Duration::from_secs(self.client.poll_timeout_secs),
            },
            ..ArmClientConfig::default()
        }
    }

    /// Load from a specific file without environment overrides
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        Config::default().merge_from_file(&path_buf)
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| std::env::var(name).ok())
}
