//! rustible-azure - desired-state Azure Resource Manager modules
//!
//! This is the main entry point for the rustible-azure CLI.

use anyhow::Result;
use rustible_azure::cli::commands::{self, CommandContext};
use rustible_azure::cli::{Cli, Commands};
use rustible_azure::config::{Config, LoggingConfig};
use rustible_azure::error::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config = match Config::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            let err = Error::Config(format!("{:#}", e));
            eprintln!("ERROR: {}", err);
            std::process::exit(err.exit_code());
        }
    };

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), &config.logging);
    tracing::debug!("rustible-azure v{}", VERSION);

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Run(args) => args.execute(&mut ctx).await,
        Commands::List => commands::list::execute(&ctx),
        Commands::Doc(args) => args.execute(&ctx),
    };

    match exit_code {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so JSON or YAML results on stdout stay parseable
    if logging.is_json() {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}
