//! Error types for rustible-azure.
//!
//! Each layer has its own error enum ([`ArmError`](crate::azure::ArmError) for
//! the Resource Manager transport, [`ModuleError`](crate::modules::ModuleError)
//! for module invocation). This module defines the crate-level error that
//! wraps them for library consumers.

use thiserror::Error;

use crate::azure::ArmError;
use crate::modules::ModuleError;

/// Result type alias for rustible-azure operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for rustible-azure.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Module Errors
    // ========================================================================
    /// Module not found in the registry.
    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    /// Invalid module arguments.
    #[error("Invalid arguments for module '{module}': {message}")]
    ModuleArgs {
        /// Module name
        module: String,
        /// Error message
        message: String,
    },

    /// Module execution failed.
    #[error(transparent)]
    Module(#[from] ModuleError),

    // ========================================================================
    // Azure Errors
    // ========================================================================
    /// Resource Manager request failed.
    #[error(transparent)]
    Arm(#[from] ArmError),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new module args error.
    pub fn module_args(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModuleArgs {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Returns true if retrying the same invocation may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Arm(e) => e.is_transient(),
            Error::Module(ModuleError::Api(e)) | Error::Module(ModuleError::ObservedState(e)) => {
                e.is_transient()
            }
            _ => false,
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Module(_) | Error::Arm(_) => 2,
            Error::ModuleNotFound(_) | Error::ModuleArgs { .. } => 4,
            Error::Config(_) => 5,
            _ => 1,
        }
    }
}
