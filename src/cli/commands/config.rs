use anyhow::{Context, Result};
use colored::Colorize;

use crate::cli::AppContext;

/// Print the resolved configuration with the API key masked
pub fn run(ctx: &AppContext, path_only: bool) -> Result<()> {
    if path_only {
        let path = ctx
            .config_file
            .as_ref()
            .context("Could not determine the config file location")?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = &ctx.config;
    let unset = || "(not set)".dimmed().to_string();

    println!("{}", "PackyCost configuration".bold());
    if let Some(path) = &ctx.config_file {
        println!("  {:<18} {}", "config file", path.display());
    }
    println!("  {:<18} {}", "endpoint", config.endpoint);
    println!(
        "  {:<18} {}",
        "api key",
        config.masked_api_key().unwrap_or_else(unset)
    );
    println!(
        "  {:<18} {}",
        "provider",
        config.provider_key.clone().unwrap_or_else(unset)
    );
    println!("  {:<18} {} ms", "toast duration", config.toast_duration_ms);
    println!("  {:<18} {}", "state file", ctx.state_file().display());

    Ok(())
}
