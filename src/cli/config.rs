//! Configuration CLI commands.

use crate::config::Config;
use anyhow::Result;

/// Show the effective configuration after all layers are merged
pub async fn show() -> Result<()> {
    let config = Config::load().await?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Show the global configuration file path
pub async fn path() -> Result<()> {
    match Config::global_config_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("Could not determine config directory"),
    }
    Ok(())
}

/// Initialize the global configuration file with defaults
pub async fn init() -> Result<()> {
    let path = Config::init().await?;
    println!("Config file: {}", path.display());
    Ok(())
}
