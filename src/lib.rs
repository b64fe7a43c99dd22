//! # rustible-azure - Desired-State Azure Resource Manager Modules
//!
//! rustible-azure manages Azure resources declaratively. Each module takes a
//! flat mapping of named arguments describing how a resource should look,
//! compares it with what Resource Manager reports, and creates, updates or
//! deletes the resource to close the gap. Every write module has an `_info`
//! companion that reads resources without changing them.
//!
//! ## Core Concepts
//!
//! - **Resource definitions**: declarative descriptions of one resource type
//!   (its argument schema, addressing template, API version and read rules)
//! - **Argument schema**: typed arguments with defaults, aliases, secrets and
//!   comparison policies
//! - **Reconciler**: decides between create, update, delete and no action
//! - **Dispatcher**: picks the read operation that matches the arguments given
//! - **Management API**: the authenticated HTTP client for Resource Manager
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                              │
//! │                    (clap-based command parsing)                      │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Module Registry                             │
//! │        (write + info module per built-in resource definition)        │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │ Argument Schema │   │     Reconciler      │   │     Dispatcher      │
//! │  (bind, coerce, │   │  (plan, check/diff  │   │  (rule selection,   │
//! │     redact)     │   │    mode, apply)     │   │   filtering)        │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Resource Manager Client                          │
//! │      (credentials, retries, pagination, long-running operations)     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rustible_azure::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let factory = ClientFactory::from_config(&config)?;
//!
//!     let context = ModuleContext::new()
//!         .with_subscription("00000000-0000-0000-0000-000000000000")
//!         .with_api(factory.api(None));
//!
//!     let params: ModuleParams = serde_json::from_value(serde_json::json!({
//!         "name": "rg-web",
//!         "location": "westeurope",
//!     }))?;
//!
//!     let registry = ModuleRegistry::with_builtins();
//!     let output = registry
//!         .execute("azure_rm_resourcegroup", &params, &context)
//!         .await?;
//!     println!("{}", output.to_value());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Resource Manager client
    pub use crate::azure::{
        ArmClient, ArmClientConfig, ArmError, ArmResult, ClientFactory, CloudEnvironment,
        ManagementApi, ResourceClient, StaticTokenCredential, TokenCredential,
    };

    // Configuration
    pub use crate::config::Config;

    // Error handling
    pub use crate::error::{Error, Result};

    // Module system
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
        ModuleStatus,
    };

    // Resource model
    pub use crate::reconcile::{Action, Reconciler};
    pub use crate::resource::{ArgSpec, ArgType, ArgumentSchema, FieldPolicy, ResourceDefinition};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for rustible-azure operations.
pub mod error;

/// Retry policies with exponential backoff and jitter.
pub mod retry;

/// Configuration management.
///
/// Handles loading and merging configuration from multiple sources:
/// environment variables, config files, and command-line arguments.
pub mod config;

// ============================================================================
// Azure Resource Manager
// ============================================================================

/// Resource Manager transport: credentials, the HTTP client, pagination and
/// long-running operation polling.
pub mod azure;

// ============================================================================
// Resource Model
// ============================================================================

/// Argument schemas, path templates, request bodies, comparison and the
/// built-in resource definitions.
pub mod resource;

/// Read-operation selection for info modules.
pub mod dispatch;

/// Desired-state reconciliation for write modules.
pub mod reconcile;

/// Shaping of Resource Manager responses into result records.
pub mod normalize;

// ============================================================================
// Modules
// ============================================================================

/// Module trait, registry and the generic resource modules.
///
/// # Example
///
/// ```rust,ignore
/// use rustible_azure::modules::{ModuleRegistry, ModuleContext, ModuleParams};
///
/// let registry = ModuleRegistry::with_builtins();
/// let params: ModuleParams = serde_json::from_value(serde_json::json!({
///     "resource_group": "rg-web",
/// }))?;
///
/// let result = registry
///     .execute("azure_rm_storageaccount_info", &params, &context)
///     .await?;
/// ```
pub mod modules;

// ============================================================================
// Command Line
// ============================================================================

/// Command-line interface.
pub mod cli;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of rustible-azure.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
