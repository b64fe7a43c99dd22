//! Doc command - describe the arguments of a module

use anyhow::Result;
use clap::Parser;

use super::CommandContext;
use crate::error::Error;

/// Arguments for the doc command
#[derive(Parser, Debug, Clone)]
pub struct DocArgs {
    /// Module to describe
    pub module: String,
}

impl DocArgs {
    pub fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        match ctx.registry.get(&self.module) {
            Some(module) => {
                ctx.output
                    .module_doc(module.name(), module.description(), module.schema())?;
                Ok(0)
            }
            None => {
                let err = Error::ModuleNotFound(self.module.clone());
                ctx.output.error(&err.to_string());
                Ok(err.exit_code())
            }
        }
    }
}
