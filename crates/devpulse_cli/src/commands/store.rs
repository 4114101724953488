//! Event store maintenance commands.

use super::{explain, open, GlobalArgs};
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;

pub fn export(global: &GlobalArgs, output: Option<&Path>) -> Result<()> {
    let ctx = open(global)?;
    let json = ctx.store().export_json().map_err(explain)?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Exported store to {}", style("✓").green(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Recomputes every aggregate from the stored events.
pub fn rebuild(global: &GlobalArgs) -> Result<()> {
    let start = Instant::now();
    let ctx = open(global)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Rebuilding aggregates...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = ctx.store().rebuild_aggregates();
    spinner.finish_and_clear();
    let summary = result.map_err(explain)?;

    println!(
        "{} Rebuilt {} day(s) and {} tool(s) from {} event(s) in {:.2}s",
        style("✓").green(),
        style(summary.days).cyan(),
        style(summary.tools).cyan(),
        style(summary.events).cyan(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
