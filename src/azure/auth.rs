//! Bearer-token acquisition for Resource Manager.
//!
//! Credentials are resolved from, in order of preference when
//! `auth_source` is `auto`:
//!
//! 1. A service principal (`client_id`, `secret`, `tenant`) from configuration
//!    or the `AZURE_CLIENT_ID` / `AZURE_SECRET` / `AZURE_TENANT` variables
//! 2. A pre-issued token from `AZURE_ACCESS_TOKEN`
//! 3. The Azure CLI (`az login`)

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::cloud::CloudEnvironment;
use super::error::{ArmError, ArmResult};
use crate::config::AzureConfig;

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// An OAuth2 bearer token.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Whether the token is still usable for a request issued now.
    pub fn is_fresh(&self) -> bool {
        self.expires_at - ChronoDuration::minutes(REFRESH_MARGIN_MINUTES) > Utc::now()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"********")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for Resource Manager requests.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Return a token valid for `scope`.
    async fn get_token(&self, scope: &str) -> ArmResult<AccessToken>;
}

/// How credentials are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthSource {
    #[default]
    Auto,
    Env,
    Cli,
    Token,
}

impl FromStr for AuthSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "env" | "credential" => Ok(Self::Env),
            "cli" => Ok(Self::Cli),
            "token" => Ok(Self::Token),
            _ => Err(format!(
                "Invalid auth_source '{}'. Valid values: auto, env, cli, token",
                s
            )),
        }
    }
}

/// A token supplied up front.
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scope: &str) -> ArmResult<AccessToken> {
        Ok(AccessToken::new(
            self.token.clone(),
            Utc::now() + ChronoDuration::hours(1),
        ))
    }
}

/// OAuth2 client-credentials flow for a service principal.
pub struct ClientSecretCredential {
    http: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cache: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: serde_json::Value,
}

impl ClientSecretCredential {
    pub fn new(
        http: Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: Mutex::new(None),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    async fn request_token(&self, scope: &str) -> ArmResult<AccessToken> {
        let url = self.token_url();
        debug!("POST {}", url);

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self.http.post(&url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error_description").and_then(|d| d.as_str()).map(String::from))
                .unwrap_or_else(|| status.to_string());
            return Err(ArmError::Authentication(format!(
                "token request for client '{}' failed: {}",
                self.client_id, detail
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        let expires_in = match &parsed.expires_in {
            serde_json::Value::Number(n) => n.as_i64().unwrap_or(3600),
            serde_json::Value::String(s) => s.parse().unwrap_or(3600),
            _ => 3600,
        };

        Ok(AccessToken::new(
            parsed.access_token,
            Utc::now() + ChronoDuration::seconds(expires_in),
        ))
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> ArmResult<AccessToken> {
        if let Some(token) = self.cache.lock().as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.clone());
        }

        let token = self.request_token(scope).await?;
        *self.cache.lock() = Some(token.clone());
        Ok(token)
    }
}

/// Tokens obtained from `az account get-access-token`.
#[derive(Default)]
pub struct AzureCliCredential {
    cache: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    expires_on: Option<String>,
    #[serde(rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_output(stdout: &str) -> ArmResult<AccessToken> {
        let parsed: CliTokenResponse = serde_json::from_str(stdout)?;

        let expires_at = parsed
            .expires_on_epoch
            .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
            .or_else(|| {
                parsed.expires_on.as_deref().and_then(|s| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                        .ok()
                        .and_then(|naive| Local.from_local_datetime(&naive).single())
                        .map(|local| local.with_timezone(&Utc))
                })
            })
            .unwrap_or_else(|| Utc::now() + ChronoDuration::minutes(10));

        Ok(AccessToken::new(parsed.access_token, expires_at))
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn get_token(&self, scope: &str) -> ArmResult<AccessToken> {
        if let Some(token) = self.cache.lock().as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.clone());
        }

        let resource = scope.trim_end_matches(".default");
        debug!("Requesting token from Azure CLI for {}", resource);

        let output = tokio::process::Command::new("az")
            .args(["account", "get-access-token", "--resource", resource, "-o", "json"])
            .output()
            .await
            .map_err(|e| ArmError::Authentication(format!("failed to run 'az': {}", e)))?;

        if !output.status.success() {
            return Err(ArmError::Authentication(format!(
                "'az account get-access-token' failed: {}. Run 'az login' first.",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = Self::parse_output(&String::from_utf8_lossy(&output.stdout))?;
        *self.cache.lock() = Some(token.clone());
        Ok(token)
    }
}

/// Select a credential according to `config.auth_source`.
pub fn credential_from_config(
    config: &AzureConfig,
    http: Client,
) -> ArmResult<Arc<dyn TokenCredential>> {
    let cloud: CloudEnvironment = config.cloud;
    let service_principal = match (&config.tenant_id, &config.client_id, &config.client_secret) {
        (Some(tenant), Some(client), Some(secret)) => Some(ClientSecretCredential::new(
            http,
            config
                .authority_host
                .clone()
                .unwrap_or_else(|| cloud.authority_host().to_string()),
            tenant.clone(),
            client.clone(),
            secret.clone(),
        )),
        _ => None,
    };

    match config.auth_source {
        AuthSource::Env => service_principal
            .map(|c| Arc::new(c) as Arc<dyn TokenCredential>)
            .ok_or_else(|| {
                ArmError::Authentication(
                    "auth_source 'env' requires client_id, secret and tenant".to_string(),
                )
            }),
        AuthSource::Token => config
            .access_token
            .as_ref()
            .map(|t| Arc::new(StaticTokenCredential::new(t.clone())) as Arc<dyn TokenCredential>)
            .ok_or_else(|| {
                ArmError::Authentication(
                    "auth_source 'token' requires AZURE_ACCESS_TOKEN".to_string(),
                )
            }),
        AuthSource::Cli => Ok(Arc::new(AzureCliCredential::new())),
        AuthSource::Auto => {
            if let Some(sp) = service_principal {
                debug!("Using service principal credentials");
                Ok(Arc::new(sp))
            } else if let Some(token) = &config.access_token {
                debug!("Using static access token");
                Ok(Arc::new(StaticTokenCredential::new(token.clone())))
            } else {
                debug!("Falling back to Azure CLI credentials");
                Ok(Arc::new(AzureCliCredential::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_freshness_honours_margin() {
        let fresh = AccessToken::new("t", Utc::now() + ChronoDuration::minutes(30));
        let nearly_expired = AccessToken::new("t", Utc::now() + ChronoDuration::minutes(2));
        assert!(fresh.is_fresh());
        assert!(!nearly_expired.is_fresh());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AccessToken::new("secret-value", Utc::now());
        assert!(!format!("{:?}", token).contains("secret-value"));
    }

    #[test]
    fn test_parse_cli_output_with_epoch() {
        let stdout = r#"{
            "accessToken": "abc",
            "expiresOn": "2030-01-01 00:00:00.000000",
            "expires_on": 1893456000,
            "subscription": "00000000-0000-0000-0000-000000000000",
            "tokenType": "Bearer"
        }"#;
        let token = AzureCliCredential::parse_output(stdout).unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.expires_at.timestamp(), 1_893_456_000);
    }

    #[test]
    fn test_parse_cli_output_without_epoch() {
        let stdout = r#"{"accessToken": "abc", "expiresOn": "2030-01-01 00:00:00.000000"}"#;
        let token = AzureCliCredential::parse_output(stdout).unwrap();
        assert!(token.is_fresh());
    }

    #[test]
    fn test_auth_source_parsing() {
        assert_eq!("CLI".parse::<AuthSource>().unwrap(), AuthSource::Cli);
        assert_eq!("credential".parse::<AuthSource>().unwrap(), AuthSource::Env);
        assert!("msi".parse::<AuthSource>().is_err());
    }

    #[test]
    fn test_env_source_requires_service_principal() {
        let config = AzureConfig {
            auth_source: AuthSource::Env,
            ..AzureConfig::default()
        };
        assert!(credential_from_config(&config, Client::new()).is_err());
    }

    #[tokio::test]
    async fn test_auto_prefers_static_token_without_service_principal() {
        let config = AzureConfig {
            access_token: Some("pre-issued".to_string()),
            ..AzureConfig::default()
        };
        let credential = credential_from_config(&config, Client::new()).unwrap();
        let token = credential.get_token("scope").await.unwrap();
        assert_eq!(token.token, "pre-issued");
    }
}
