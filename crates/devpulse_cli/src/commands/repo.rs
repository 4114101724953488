//! Working-tree inspection commands.

use super::{explain, open, GlobalArgs};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use console::style;
use devpulse_core::CommitClassifier;

pub fn status(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    let status = ctx.inspector().status().map_err(explain)?;

    if status.total_changes == 0 {
        println!("Working tree clean");
        return Ok(());
    }
    let groups = [
        ("modified", &status.modified),
        ("added", &status.added),
        ("deleted", &status.deleted),
        ("renamed", &status.renamed),
        ("untracked", &status.untracked),
    ];
    for (label, paths) in groups {
        if paths.is_empty() {
            continue;
        }
        println!("{} ({}):", style(label).bold(), paths.len());
        for path in paths {
            println!("  {}", path);
        }
    }
    Ok(())
}

pub fn commits(global: &GlobalArgs, days: i64) -> Result<()> {
    let ctx = open(global)?;
    let since = commits_since(ctx.now(), days);
    let commits = ctx.inspector().log_since(since).map_err(explain)?;

    if commits.is_empty() {
        println!("No commits in the last {} day(s)", days);
        return Ok(());
    }
    for commit in &commits {
        let marker = if commit.is_ai_assisted {
            style("AI").magenta().to_string()
        } else {
            "  ".to_string()
        };
        println!(
            "{} {} {:<8} {} ({})",
            style(&commit.hash[..commit.hash.len().min(8)]).yellow(),
            marker,
            commit.commit_type.as_str(),
            commit.message,
            commit.author
        );
    }

    let patterns = CommitClassifier::analyze_patterns(&commits);
    println!(
        "\n{} commits, {} AI-assisted ({:.1}%)",
        patterns.total_commits,
        patterns.ai_assisted_commits,
        patterns.ai_rate * 100.0
    );
    if let Some(author) = &patterns.most_active_author {
        println!("Most active author: {}", author);
    }
    Ok(())
}

/// Start of the `--days` window; falls back to the epoch when out of range.
fn commits_since(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

pub fn info(global: &GlobalArgs) -> Result<()> {
    let ctx = open(global)?;
    let info = ctx.inspector().repo_info().map_err(explain)?;

    println!(
        "Remote: {}",
        info.remote_url.as_deref().unwrap_or("(none)")
    );
    println!("Host:   {:?}", info.host);
    println!(
        "Branch: {}",
        info.current_branch.as_deref().unwrap_or("(detached or none)")
    );
    match &info.last_commit {
        Some(commit) => println!(
            "Last:   {} {} ({}, {})",
            &commit.hash[..commit.hash.len().min(8)],
            commit.message,
            commit.author,
            commit.timestamp.format("%Y-%m-%d %H:%M")
        ),
        None => println!("Last:   (no commits)"),
    }
    Ok(())
}
