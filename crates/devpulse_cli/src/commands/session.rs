//! Coding session commands.

use super::{explain, open, GlobalArgs};
use anyhow::{bail, Result};
use console::style;
use devpulse_core::{Session, SessionReport, SessionStatus};

pub fn start(global: &GlobalArgs, id: &str, user: &str, tool: &str) -> Result<()> {
    let ctx = open(global)?;
    let session = ctx.tracker().start(id, user, tool).map_err(explain)?;

    println!("{} Started session {}", style("✓").green(), style(&session.id).cyan());
    println!("  User: {}", session.user);
    println!("  Tool: {}", session.tool);
    println!(
        "  Baseline: {} changed path(s)",
        session.baseline.total_changes
    );
    Ok(())
}

pub fn track(global: &GlobalArgs, id: &str, paths: &[String]) -> Result<()> {
    let ctx = open(global)?;
    for path in paths {
        let record = ctx.tracker().track_change(id, path).map_err(explain)?;
        if record.analysis_failed {
            println!(
                "  {} {} (analysis failed: {})",
                style("⚠").yellow(),
                record.file_path,
                record.failure.as_deref().unwrap_or("unknown")
            );
        } else {
            let m = &record.metrics;
            println!(
                "  {} {} +{} -{} complexity {:+}",
                style("✓").green(),
                record.file_path,
                m.lines_added,
                m.lines_deleted,
                m.complexity_delta
            );
        }
    }
    Ok(())
}

pub fn end(global: &GlobalArgs, id: &str, format: &str) -> Result<()> {
    let ctx = open(global)?;
    let report = ctx.tracker().end(id).map_err(explain)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_report(&report),
        other => bail!("Unknown format '{}' (expected text or json)", other),
    }
    Ok(())
}

pub fn status(global: &GlobalArgs, id: &str) -> Result<()> {
    let ctx = open(global)?;
    let session = ctx.tracker().get(id).map_err(explain)?;

    print_session_line(&session);
    println!("  Started: {}", session.start_time.to_rfc3339());
    if let Some(end) = session.end_time {
        println!("  Ended:   {}", end.to_rfc3339());
    }
    println!("  Files tracked: {}", session.files.len());
    for record in session.files.values() {
        let marker = if record.analysis_failed {
            style("⚠").yellow()
        } else {
            style("·").dim()
        };
        println!("    {} {}", marker, record.file_path);
    }
    if let Some(report) = &session.report {
        println!();
        print_report(report);
    }
    Ok(())
}

pub fn list(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    let sessions = ctx.tracker().list();
    if sessions.is_empty() {
        println!("No sessions recorded");
        return Ok(());
    }
    for session in &sessions {
        print_session_line(session);
    }
    Ok(())
}

fn print_session_line(session: &Session) {
    let status = match session.status {
        SessionStatus::Active => style(session.status.as_str()).green(),
        SessionStatus::Ended => style(session.status.as_str()).dim(),
        SessionStatus::Created => style(session.status.as_str()).yellow(),
    };
    println!(
        "{} [{}] {} / {} since {}",
        style(&session.id).cyan(),
        status,
        session.user,
        session.tool,
        session.start_time.format("%Y-%m-%d %H:%M")
    );
}

fn print_report(report: &SessionReport) {
    let m = &report.metrics;
    println!("{}", style(format!("Session report: {}", report.session_id)).bold());
    println!("  Duration: {:.1} min", report.duration_minutes);
    println!(
        "  Lines: +{} -{}   Files: {}   Functions: {}   Complexity: {:+}",
        m.lines_added, m.lines_deleted, m.files_modified, m.functions_added, m.complexity_delta
    );
    if m.failed_files > 0 {
        println!("  {} {} file(s) could not be analyzed", style("⚠").yellow(), m.failed_files);
    }
    println!("  Commits: {}", report.commits.len());
    println!(
        "  AI probability: {:.2}   Productivity: {:.2}   Quality: {:.1}",
        report.ai_probability, report.productivity_score, report.quality_score
    );
    println!(
        "  Efficiency: {:.2} ({})",
        report.efficiency_score,
        style(report.efficiency_rating.as_str()).cyan()
    );
    if !report.recommendations.is_empty() {
        println!("\n{}", style("Recommendations:").bold());
        for rec in &report.recommendations {
            println!("  - {}", rec);
        }
    }
}
