//! CLI module for rustible-azure
//!
//! This module provides the command-line interface: argument parsing,
//! configuration overrides and subcommand handling.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::azure::{AuthSource, CloudEnvironment};

/// rustible-azure - desired-state Azure Resource Manager modules
#[derive(Parser, Debug, Clone)]
#[command(name = "rustible-azure")]
#[command(author = "Rustible Contributors")]
#[command(version)]
#[command(about = "Run Azure Resource Manager modules", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "RUSTIBLE_AZURE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Default subscription id
    #[arg(long, global = true)]
    pub subscription: Option<String>,

    /// Azure cloud environment
    #[arg(long, global = true, value_parser = parse_cloud)]
    pub cloud: Option<CloudEnvironment>,

    /// Credential source: auto, env, cli or token
    #[arg(long, global = true, value_parser = parse_auth_source)]
    pub auth_source: Option<AuthSource>,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
    /// YAML output
    Yaml,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a module once
    Run(commands::run::RunArgs),

    /// List registered modules
    List,

    /// Show the arguments a module accepts
    Doc(commands::doc::DocArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}

fn parse_cloud(s: &str) -> Result<CloudEnvironment, String> {
    s.parse()
}

fn parse_auth_source(s: &str) -> Result<AuthSource, String> {
    s.parse()
}
