//! Module system for rustible-azure
//!
//! This module provides the core trait, types, and registry for the module system.
//! Every module manages or reads one Azure resource type and is driven by a
//! declarative [`ResourceDefinition`](crate::resource::ResourceDefinition).

pub mod info;
pub mod resource;

pub use info::ResourceInfoModule;
pub use resource::ResourceModule;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::azure::{ArmError, ManagementApi};
use crate::resource::catalog;
use crate::resource::identity::SUBSCRIPTION_ID;
use crate::resource::ArgumentSchema;

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Unsupported parameters: {names}. Supported parameters include: {supported}")]
    UnsupportedParameter { names: String, supported: String },

    /// The current state could not be read, so no action can be decided
    #[error("Could not determine the current state of the resource: {0}")]
    ObservedState(#[source] ArmError),

    #[error(transparent)]
    Api(#[from] ArmError),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("No Azure client configured for this invocation")]
    NoClient,
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Status of a module execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Module executed successfully and made changes
    Changed,
    /// Module executed successfully but no changes were needed
    Ok,
    /// Module execution failed; only reported for invocations that
    /// return an error
    Failed,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Changed => write!(f, "changed"),
            ModuleStatus::Ok => write!(f, "ok"),
            ModuleStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Represents a difference between current and desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// Resource before the change (secrets redacted)
    pub before: String,
    /// Resource after the change (secrets redacted)
    pub after: String,
    /// Unified diff of `before` and `after`
    pub details: Option<String>,
}

impl Diff {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Result of a module execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutput {
    /// Whether the module changed anything
    pub changed: bool,
    /// Human-readable message about what happened
    pub msg: String,
    /// Status of the execution
    pub status: ModuleStatus,
    /// Optional diff showing what changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
    /// Additional data returned by the module
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub data: IndexMap<String, serde_json::Value>,
    /// Non-fatal problems encountered along the way
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ModuleOutput {
    fn with_status(status: ModuleStatus, changed: bool, msg: impl Into<String>) -> Self {
        Self {
            changed,
            msg: msg.into(),
            status,
            diff: None,
            data: IndexMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Create a new successful output with no changes
    pub fn ok(msg: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Ok, false, msg)
    }

    /// Create a new successful output with changes
    pub fn changed(msg: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Changed, true, msg)
    }

    /// Add a diff to the output
    pub fn with_diff(mut self, diff: Diff) -> Self {
        self.diff = Some(diff);
        self
    }

    /// Add data to the output
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Append warnings
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// Result mapping: `changed`, `msg`, any warnings, then the module data.
    pub fn to_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("changed".to_string(), self.changed.into());
        map.insert("msg".to_string(), self.msg.clone().into());
        if !self.warnings.is_empty() {
            map.insert("warnings".to_string(), self.warnings.clone().into());
        }
        for (key, value) in &self.data {
            map.insert(key.clone(), value.clone());
        }
        serde_json::Value::Object(map)
    }
}

/// Parameters passed to a module
pub type ModuleParams = HashMap<String, serde_json::Value>;

/// Context for module execution
#[derive(Clone, Default)]
pub struct ModuleContext {
    /// Whether to run in check mode (dry run)
    pub check_mode: bool,
    /// Whether to show diffs
    pub diff_mode: bool,
    /// Subscription used when the invocation does not name one
    pub subscription_id: Option<String>,
    /// Resource Manager API
    pub api: Option<Arc<dyn ManagementApi>>,
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("check_mode", &self.check_mode)
            .field("diff_mode", &self.diff_mode)
            .field("subscription_id", &self.subscription_id)
            .field("api", &self.api.as_ref().map(|_| "ManagementApi"))
            .finish()
    }
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_diff_mode(mut self, diff_mode: bool) -> Self {
        self.diff_mode = diff_mode;
        self
    }

    pub fn with_subscription(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }

    pub fn with_api(mut self, api: Arc<dyn ManagementApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// The management API, or `NoClient`.
    pub fn api(&self) -> ModuleResult<Arc<dyn ManagementApi>> {
        self.api.clone().ok_or(ModuleError::NoClient)
    }

    /// Values filled in for arguments the invocation leaves out.
    pub fn defaults(&self) -> ModuleParams {
        let mut defaults = ModuleParams::new();
        if let Some(subscription) = &self.subscription_id {
            defaults.insert(SUBSCRIPTION_ID.to_string(), subscription.clone().into());
        }
        defaults
    }
}

/// Trait that all modules must implement
#[async_trait]
pub trait Module: Send + Sync {
    /// Returns the name of the module
    fn name(&self) -> &str;

    /// Returns a description of what the module does
    fn description(&self) -> &str;

    /// Returns the arguments the module accepts
    fn schema(&self) -> &ArgumentSchema;

    /// Execute the module with the given parameters
    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput>;

    /// Validate the parameters before execution
    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        self.schema().check_supported(params)
    }
}

/// Registry for looking up modules by name
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Create a registry with a write and an info module per built-in definition
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for definition in catalog::builtins() {
            registry.register(Arc::new(ResourceModule::new(definition.clone())));
            registry.register(Arc::new(ResourceInfoModule::new(definition.clone())));
        }
        registry
    }

    /// Register a module
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Get a module by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Check if a module exists
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Get all module names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Execute a module by name
    pub async fn execute(
        &self,
        name: &str,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let module = self
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;

        // Validate parameters first
        module.validate_params(params)?;

        module.execute(params, context).await
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ArgSpec, ArgType};
    use once_cell::sync::Lazy;

    static TEST_SCHEMA: Lazy<ArgumentSchema> =
        Lazy::new(|| ArgumentSchema::new(vec![ArgSpec::new("msg", ArgType::Str)]));

    struct TestModule;

    #[async_trait]
    impl Module for TestModule {
        fn name(&self) -> &str {
            "test"
        }

        fn description(&self) -> &str {
            "A test module"
        }

        fn schema(&self) -> &ArgumentSchema {
            &TEST_SCHEMA
        }

        async fn execute(
            &self,
            params: &ModuleParams,
            context: &ModuleContext,
        ) -> ModuleResult<ModuleOutput> {
            if context.check_mode {
                return Ok(ModuleOutput::ok("Would do something"));
            }

            let msg = params
                .get("msg")
                .and_then(|v| v.as_str())
                .unwrap_or("Hello")
                .to_string();
            Ok(ModuleOutput::changed(msg))
        }
    }

    #[test]
    fn test_module_registry() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(TestModule));

        assert!(registry.contains("test"));
        assert!(!registry.contains("nonexistent"));

        let module = registry.get("test").unwrap();
        assert_eq!(module.name(), "test");
    }

    #[test]
    fn test_builtins_register_write_and_info_modules() {
        let registry = ModuleRegistry::with_builtins();
        assert_eq!(registry.names().len(), 12);
        assert!(registry.contains("azure_rm_resourcegroup"));
        assert!(registry.contains("azure_rm_sqldatabase_info"));
    }

    #[tokio::test]
    async fn test_registry_rejects_unsupported_parameters() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(TestModule));

        let mut params = ModuleParams::new();
        params.insert("colour".to_string(), serde_json::json!("red"));

        let err = registry
            .execute("test", &params, &ModuleContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::UnsupportedParameter { .. }));
    }

    #[tokio::test]
    async fn test_registry_unknown_module() {
        let registry = ModuleRegistry::new();
        let err = registry
            .execute("missing", &ModuleParams::new(), &ModuleContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::NotFound(_)));
    }

    #[test]
    fn test_module_output() {
        let output = ModuleOutput::changed("Something changed")
            .with_data("key", serde_json::json!("value"))
            .with_diff(Diff::new("old", "new"))
            .with_warnings(vec!["careful".to_string()]);

        assert!(output.changed);
        assert_eq!(output.status, ModuleStatus::Changed);
        assert!(output.diff.is_some());
        assert!(output.data.contains_key("key"));

        let value = output.to_value();
        assert_eq!(value["changed"], serde_json::json!(true));
        assert_eq!(value["key"], serde_json::json!("value"));
        assert_eq!(value["warnings"][0], serde_json::json!("careful"));
    }

    #[test]
    fn test_context_defaults_carry_subscription() {
        let context = ModuleContext::new().with_subscription("sub-1");
        assert_eq!(context.defaults()["subscription_id"], serde_json::json!("sub-1"));
        assert!(matches!(context.api(), Err(ModuleError::NoClient)));
    }
}
