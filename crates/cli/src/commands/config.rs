use std::fs;

use abi_facts_core::config::GeneratorConfig;
use anyhow::{anyhow, Context, Result};

use crate::canonicalize_or_current;

pub const DEFAULT_CONFIG_FILE: &str = "abi-facts.json";

/// Write the default generator config as pretty JSON.
pub fn init_config_command(path: &str, force: bool) -> Result<()> {
    let path = canonicalize_or_current(path)?;
    if path.exists() && !force {
        return Err(anyhow!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(&GeneratorConfig::default())?;
    fs::write(&path, json)
        .with_context(|| format!("Failed to write generator config: {}", path.display()))?;

    println!("Wrote generator config: {}", path.display());
    Ok(())
}
