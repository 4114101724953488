//! CLI commands.

pub mod init;
pub mod report;
pub mod repo;
pub mod session;
pub mod store;
pub mod usage;

use anyhow::{Context, Result};
use console::style;
use devpulse_core::{AnalyticsContext, Config, PulseError};
use std::path::PathBuf;

/// Options shared by every command.
pub struct GlobalArgs {
    pub data_dir: Option<PathBuf>,
    pub repo: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Config::default_data_dir().context("Cannot resolve the data directory"),
        }
    }
}

/// Opens the engine, reporting store recovery on stderr.
pub fn open(global: &GlobalArgs) -> Result<AnalyticsContext> {
    let data_dir = global.data_dir()?;
    let mut config = Config::load(&data_dir)?;
    if let Some(repo) = &global.repo {
        config.git.repo_path = repo.clone();
    }

    tracing::debug!(data_dir = %data_dir.display(), repo = %config.git.repo_path.display(), "opening engine");
    let ctx = AnalyticsContext::with_config(&data_dir, config).map_err(explain)?;
    if let Some(notice) = ctx.store().take_recovery_notice() {
        eprintln!("{} {}", style("⚠").yellow(), style(notice).yellow());
    }
    Ok(ctx)
}

/// Attaches the recovery suggestion, if any, to a core error.
pub fn explain(err: PulseError) -> anyhow::Error {
    match err.recovery_suggestion() {
        Some(hint) => anyhow::anyhow!("{}\n  hint: {}", err, hint),
        None => anyhow::Error::new(err),
    }
}
