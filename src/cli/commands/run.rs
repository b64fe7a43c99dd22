//! Run command - execute one module invocation

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

use super::{load_args_file, parse_module_args, CommandContext};
use crate::error::Error;

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Module to run, e.g. azure_rm_storageaccount
    #[arg(required = true)]
    pub module: String,

    /// Module argument as key=value (repeatable)
    #[arg(short = 'a', long = "arg", action = clap::ArgAction::Append)]
    pub args: Vec<String>,

    /// YAML or JSON file holding module arguments
    #[arg(long)]
    pub args_file: Option<PathBuf>,

    /// Report what would change without changing it
    #[arg(long)]
    pub check: bool,

    /// Show a before/after diff of the resource
    #[arg(long)]
    pub diff: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let Some(module) = ctx.registry.get(&self.module) else {
            let err = Error::ModuleNotFound(self.module.clone());
            ctx.output.error(&err.to_string());
            return Ok(err.exit_code());
        };

        let mut params = match &self.args_file {
            Some(path) => load_args_file(path)?,
            None => Default::default(),
        };
        // Command-line arguments override the file
        params.extend(parse_module_args(&self.args)?);

        if let Err(e) = module.validate_params(&params) {
            let err = Error::module_args(&self.module, e.to_string());
            ctx.output.error(&err.to_string());
            return Ok(err.exit_code());
        }

        let context = ctx.module_context(self.check, self.diff)?;
        debug!(module = %self.module, check = self.check, "Running module");

        match module.execute(&params, &context).await {
            Ok(output) => {
                ctx.output.module_result(&self.module, &output);
                Ok(0)
            }
            // Module and Resource Manager failures exit with 2
            Err(e) => {
                let err = Error::from(e);
                ctx.output.module_error(&self.module, &err);
                Ok(err.exit_code())
            }
        }
    }
}
