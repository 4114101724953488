//! Usage report command.

use super::{explain, open, GlobalArgs};
use anyhow::{bail, Result};
use devpulse_core::DateRange;

pub fn run(global: &GlobalArgs, range: &str, format: &str, commits: bool) -> Result<()> {
    let range: DateRange = range.parse().map_err(explain)?;
    let ctx = open(global)?;

    let report = if commits {
        ctx.report_with_commits(range)
    } else {
        ctx.report(range)
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print!("{}", report.render_text()),
        other => bail!("Unknown format '{}' (expected text or json)", other),
    }
    Ok(())
}
