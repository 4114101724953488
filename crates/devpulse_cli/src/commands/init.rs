//! Init command implementation.

use super::GlobalArgs;
use anyhow::{Context, Result};
use console::style;
use devpulse_core::Config;

/// Writes the default configuration unless one already exists.
pub fn run(global: &GlobalArgs) -> Result<()> {
    let data_dir = global.data_dir()?;
    let config_path = data_dir.join("config.toml");

    if config_path.exists() {
        println!("Configuration already exists at {}", config_path.display());
        return Ok(());
    }

    let mut config = Config::default();
    if let Some(repo) = &global.repo {
        config.git.repo_path = repo.clone();
    }
    config
        .save(&data_dir)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!(
        "{} Initialized DevPulse data directory at {}",
        style("✓").green(),
        data_dir.display()
    );
    Ok(())
}
