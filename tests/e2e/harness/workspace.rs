use super::clock::MockClock;
use super::repo::ScriptedRepo;
use anyhow::{Context, Result};
use devpulse_core::{AnalyticsContext, Config};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Isolated data directory for one scenario.
pub struct TestWorkspace {
    dir: TempDir,
    config: Config,
}

impl TestWorkspace {
    /// Create an empty workspace with the default configuration
    pub fn empty() -> Result<Self> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        Ok(Self { dir, config })
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store_path(&self) -> PathBuf {
        self.config.store_path(self.path())
    }

    pub fn outbox_path(&self) -> PathBuf {
        self.config.outbox_path(self.path())
    }

    /// Open the engine against a scripted repository and mock clock
    pub fn open(&self, repo: &ScriptedRepo, clock: &MockClock) -> Result<AnalyticsContext> {
        Ok(AnalyticsContext::with_parts(
            self.path(),
            self.config.clone(),
            Arc::new(repo.clone()),
            Arc::new(clock.as_provider()),
        )?)
    }

    /// Overwrite the store file with bytes that are not a database
    pub fn corrupt_store(&self) -> Result<()> {
        let path = self.store_path();
        fs::write(&path, b"this is definitely not a redb file")
            .with_context(|| format!("Failed to corrupt {}", path.display()))
    }

    /// Names of files whose name contains `fragment`
    pub fn files_containing(&self, fragment: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.path())? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.contains(fragment) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
