//! List command - show registered modules

use anyhow::Result;

use super::CommandContext;

/// Print every registered module with its description.
pub fn execute(ctx: &CommandContext) -> Result<i32> {
    let modules: Vec<(String, String)> = ctx
        .registry
        .names()
        .into_iter()
        .filter_map(|name| ctx.registry.get(name))
        .map(|module| (module.name().to_string(), module.description().to_string()))
        .collect();

    ctx.output.module_list(&modules)?;
    Ok(0)
}
