//! validate-config command

use crate::error::Result;
use crate::installer::list_targets;

use super::helpers::{Context, success};

pub fn run(ctx: &Context) -> Result<()> {
    let config = ctx.registry_config()?;
    for target in list_targets(&config) {
        println!("  {target}");
    }
    success(format!(
        "Configuration from {} is valid ({} registries)",
        config.origin(),
        config.len()
    ));
    Ok(())
}
