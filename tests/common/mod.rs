//! Shared test utilities and fixtures for the rustible-azure test suite.
//!
//! This module provides:
//! - Resource Manager clients wired to a `wiremock` server
//! - Module contexts for end-to-end invocations
//! - Parameter and response fixtures
//!
//! # Usage
//!
//! Include this module in your integration tests:
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::MockServer;

use rustible_azure::azure::{
    ArmClient, ArmClientConfig, ClientFactory, ManagementApi, PollConfig, StaticTokenCredential,
};
use rustible_azure::modules::{ModuleContext, ModuleParams};
use rustible_azure::retry::RetryPolicy;

/// Bearer token every mocked endpoint expects
pub const TOKEN: &str = "test-token";

/// Subscription used by all fixtures
pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

// ============================================================================
// Clients
// ============================================================================

/// Client settings tuned for tests: fast retries and fast polling.
pub fn test_client_config(base_url: &str) -> ArmClientConfig {
    ArmClientConfig {
        base_url: base_url.to_string(),
        retry: RetryPolicy::constant(2, Duration::from_millis(10)),
        poll: PollConfig {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        },
        ..ArmClientConfig::default()
    }
}

/// Client factory authenticated with [`TOKEN`] against `server`.
pub fn factory(server: &MockServer) -> ClientFactory {
    factory_with(test_client_config(&server.uri()))
}

pub fn factory_with(config: ArmClientConfig) -> ClientFactory {
    ClientFactory::new(Arc::new(StaticTokenCredential::new(TOKEN)), config)
        .expect("client factory")
}

/// A bare [`ArmClient`] against `server`.
pub fn arm_client(server: &MockServer) -> ArmClient {
    arm_client_with(test_client_config(&server.uri()))
}

pub fn arm_client_with(config: ArmClientConfig) -> ArmClient {
    let http = ArmClient::http_client(&config).expect("http client");
    ArmClient::new(http, Arc::new(StaticTokenCredential::new(TOKEN)), config)
}

/// Management API handle against `server`.
pub fn api(server: &MockServer) -> Arc<dyn ManagementApi> {
    factory(server).api(None)
}

// ============================================================================
// Module invocation
// ============================================================================

/// Module context with the default subscription and a client for `server`.
pub fn context(server: &MockServer) -> ModuleContext {
    ModuleContext::new()
        .with_subscription(SUBSCRIPTION)
        .with_api(api(server))
}

/// Build module parameters from a JSON object literal.
pub fn params(value: Value) -> ModuleParams {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        other => panic!("params must be an object, got {}", other),
    }
}

// ============================================================================
// Paths and fixtures
// ============================================================================

pub fn resource_group_path(name: &str) -> String {
    format!("/subscriptions/{}/resourcegroups/{}", SUBSCRIPTION, name)
}

pub fn storage_account_path(group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}",
        SUBSCRIPTION, group, name
    )
}

pub fn storage_accounts_path(group: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts",
        SUBSCRIPTION, group
    )
}

/// Storage account as Resource Manager returns it.
pub fn storage_account(group: &str, name: &str, sku: &str) -> Value {
    json!({
        "id": storage_account_path(group, name),
        "name": name,
        "type": "Microsoft.Storage/storageAccounts",
        "location": "westeurope",
        "kind": "StorageV2",
        "sku": {"name": sku, "tier": "Standard"},
        "tags": {"env": "test"},
        "properties": {
            "provisioningState": "Succeeded",
            "supportsHttpsTrafficOnly": true
        }
    })
}

/// Standard Resource Manager error envelope.
pub fn arm_error(code: &str, message: &str) -> Value {
    json!({"error": {"code": code, "message": message}})
}
