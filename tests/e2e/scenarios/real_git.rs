use devpulse_core::{AnalyticsContext, Config, GitCli, RepoHost, SystemClock};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(["-c", "user.name=Ada", "-c", "user.email=ada@example.com", "-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Creates a repository with one commit, or None when git is unavailable.
fn init_repo() -> Option<TempDir> {
    let dir = TempDir::new().ok()?;
    if !git(dir.path(), &["init", "-q"]) {
        return None;
    }
    std::fs::write(dir.path().join("app.js"), "const a = 1;\n").ok()?;
    if !git(dir.path(), &["add", "app.js"]) || !git(dir.path(), &["commit", "-q", "-m", "chore: init"]) {
        return None;
    }
    Some(dir)
}

#[test]
fn test_session_against_real_git() {
    let Some(repo_dir) = init_repo() else {
        eprintln!("git not available; skipping");
        return;
    };
    let data = TempDir::new().unwrap();

    let runner = Arc::new(GitCli::new("git", repo_dir.path(), Duration::from_secs(30)));
    let ctx = AnalyticsContext::with_parts(data.path(), Config::default(), runner, Arc::new(SystemClock)).unwrap();

    std::fs::write(
        repo_dir.path().join("app.js"),
        "const a = 1;\n// retry on failure\nif (a) { run(); }\n",
    )
    .unwrap();

    let status = ctx.inspector().status().unwrap();
    assert_eq!(status.modified, vec!["app.js".to_string()]);

    ctx.tracker().start("real", "ada", "cursor").unwrap();
    let record = ctx.tracker().track_change("real", "app.js").unwrap();
    assert!(!record.analysis_failed, "{:?}", record.failure);
    assert_eq!(record.metrics.lines_added, 2);
    assert_eq!(record.metrics.complexity_delta, 1);
    assert_eq!(record.metrics.comments_added, 1);

    let report = ctx.tracker().end("real").unwrap();
    assert_eq!(report.metrics.files_modified, 1);

    let info = ctx.inspector().repo_info().unwrap();
    assert_eq!(info.remote_url, None);
    assert_eq!(info.host, RepoHost::Unknown);
    assert!(info.current_branch.is_some());
    assert_eq!(info.last_commit.map(|c| c.message), Some("chore: init".to_string()));
}

#[test]
fn test_missing_git_binary_is_a_repository_error() {
    let dir = TempDir::new().unwrap();
    let cli = GitCli::new("devpulse-no-such-git-binary", dir.path(), Duration::from_secs(5));
    assert!(!cli.is_available());

    let data = TempDir::new().unwrap();
    let ctx = AnalyticsContext::with_parts(data.path(), Config::default(), Arc::new(cli), Arc::new(SystemClock)).unwrap();
    let err = ctx.tracker().start("s1", "ada", "cursor").unwrap_err();
    assert!(matches!(err, devpulse_core::PulseError::Repository { .. }));
}
