//! Subcommands module for the rustible-azure CLI
//!
//! This module contains all the subcommand implementations.

pub mod doc;
pub mod list;
pub mod run;

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::azure::ClientFactory;
use crate::cli::output::OutputFormatter;
use crate::cli::Cli;
use crate::config::Config;
use crate::modules::{ModuleContext, ModuleParams, ModuleRegistry};

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration with CLI overrides applied
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Registered modules
    pub registry: ModuleRegistry,
    /// Verbosity level
    pub verbosity: u8,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &Cli, mut config: Config) -> Self {
        if let Some(subscription) = &cli.subscription {
            config.azure.subscription_id = Some(subscription.clone());
        }
        if let Some(cloud) = cli.cloud {
            config.azure.cloud = cloud;
        }
        if let Some(source) = cli.auth_source {
            config.azure.auth_source = source;
        }

        let output = OutputFormatter::new(!cli.no_color, cli.output);

        Self {
            config,
            output,
            registry: ModuleRegistry::with_builtins(),
            verbosity: cli.verbosity(),
        }
    }

    /// Build the module context, including an authenticated Resource Manager client.
    pub fn module_context(&self, check_mode: bool, diff_mode: bool) -> Result<ModuleContext> {
        let factory = ClientFactory::from_config(&self.config)
            .context("Failed to set up Azure credentials")?;

        let mut context = ModuleContext::new()
            .with_check_mode(check_mode)
            .with_diff_mode(diff_mode)
            .with_api(factory.api(None));
        if let Some(subscription) = &self.config.azure.subscription_id {
            context = context.with_subscription(subscription.clone());
        }
        Ok(context)
    }
}

/// Parse `key=value` module arguments; values are read as YAML.
pub fn parse_module_args(args: &[String]) -> Result<ModuleParams> {
    let mut params = ModuleParams::new();

    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("Invalid module argument '{}': expected key=value", arg);
        };
        let parsed: serde_yaml::Value = serde_yaml::from_str(value)
            .unwrap_or_else(|_| serde_yaml::Value::String(value.to_string()));
        let json = serde_json::to_value(parsed)
            .with_context(|| format!("Invalid value for module argument '{}'", key))?;
        params.insert(key.trim().to_string(), json);
    }

    Ok(params)
}

/// Load module arguments from a YAML or JSON mapping.
pub fn load_args_file(path: &Path) -> Result<ModuleParams> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read arguments file: {}", path.display()))?;

    // JSON is a subset of YAML, so one parser covers both
    let value: serde_yaml::Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse arguments file: {}", path.display()))?;

    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        serde_json::Value::Null => Ok(ModuleParams::new()),
        _ => bail!(
            "Arguments file {} must contain a mapping",
            path.display()
        ),
    }
}
