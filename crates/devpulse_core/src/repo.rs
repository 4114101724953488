//! Read-only repository queries.
//!
//! All version-control access goes through the narrow [`CommandRunner`]
//! trait. [`GitCli`] is the production runner; tests substitute scripted
//! runners. [`RepositoryInspector`] turns raw command output into typed
//! status, diff, log and repository facts.

use crate::classification::Classifier;
use crate::error::{PulseError, Result};
use crate::types::{CommitInfo, RepoHost, RepoInfo, WorkingTreeStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';
const LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%aI%x1f%s%x1e";

/// A read-only version-control query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCommand {
    /// Porcelain working-tree status.
    Status,
    /// Diff of one path against HEAD.
    Diff { path: String },
    /// Commits made at or after `since`.
    Log { since: DateTime<Utc> },
    /// URL of the `origin` remote.
    RemoteUrl,
    /// Name of the checked-out branch.
    CurrentBranch,
    /// The most recent commit.
    LastCommit,
}

impl VcsCommand {
    /// Arguments passed to `git` for this query.
    pub fn git_args(&self) -> Vec<String> {
        let args: Vec<&str> = match self {
            VcsCommand::Status => vec!["status", "--porcelain"],
            VcsCommand::Diff { path } => {
                return vec![
                    "diff".to_string(),
                    "HEAD".to_string(),
                    "--no-color".to_string(),
                    "--no-ext-diff".to_string(),
                    "--".to_string(),
                    path.clone(),
                ]
            }
            VcsCommand::Log { since } => {
                return vec![
                    "log".to_string(),
                    format!("--since={}", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    LOG_FORMAT.to_string(),
                ]
            }
            VcsCommand::RemoteUrl => vec!["config", "--get", "remote.origin.url"],
            VcsCommand::CurrentBranch => vec!["rev-parse", "--abbrev-ref", "HEAD"],
            VcsCommand::LastCommit => vec!["log", "-1", LOG_FORMAT],
        };
        args.into_iter().map(str::to_string).collect()
    }

    /// Short label used in error context and logs.
    pub fn label(&self) -> String {
        match self {
            VcsCommand::Status => "status".to_string(),
            VcsCommand::Diff { path } => format!("diff {}", path),
            VcsCommand::Log { since } => format!("log since {}", since.to_rfc3339()),
            VcsCommand::RemoteUrl => "remote url".to_string(),
            VcsCommand::CurrentBranch => "current branch".to_string(),
            VcsCommand::LastCommit => "last commit".to_string(),
        }
    }
}

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes version-control queries.
///
/// Implementations return `Ok` for any command that ran to completion,
/// whatever its exit code, and `Err(Repository)` when the command could
/// not be run or timed out.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &VcsCommand) -> Result<CommandOutput>;
}

/// Runs queries through the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
    repo_root: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(binary: impl Into<String>, repo_root: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            repo_root: repo_root.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Returns true if the configured binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl CommandRunner for GitCli {
    fn run(&self, command: &VcsCommand) -> Result<CommandOutput> {
        let label = command.label();
        let started = Instant::now();
        tracing::debug!(command = %label, repo = %self.repo_root.display(), "running git");

        let mut child = Command::new(&self.binary)
            .args(command.git_args())
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PulseError::repository(&label, format!("failed to spawn {}: {}", self.binary, e)))?;

        // Both pipes are drained on threads while the child runs.
        let stdout_reader = child.stdout.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let deadline = started + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PulseError::repository(
                        &label,
                        format!("timed out after {}s", self.timeout.as_secs()),
                    ));
                }
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(e) => {
                    let _ = child.kill();
                    return Err(PulseError::repository(&label, e.to_string()));
                }
            }
        };

        let collect = |reader: Option<thread::JoinHandle<Vec<u8>>>| -> String {
            reader
                .and_then(|handle| handle.join().ok())
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        };
        let output = CommandOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: collect(stdout_reader),
            stderr: collect(stderr_reader),
        };

        tracing::debug!(
            command = %label,
            exit_code = output.exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "git finished"
        );
        Ok(output)
    }
}

/// Typed read-only view of a working tree.
#[derive(Clone)]
pub struct RepositoryInspector {
    runner: Arc<dyn CommandRunner>,
    classifier: Arc<dyn Classifier>,
}

impl RepositoryInspector {
    pub fn new(runner: Arc<dyn CommandRunner>, classifier: Arc<dyn Classifier>) -> Self {
        Self { runner, classifier }
    }

    /// Current working-tree status.
    pub fn status(&self) -> Result<WorkingTreeStatus> {
        let out = self.run_checked(&VcsCommand::Status)?;
        Ok(parse_porcelain_status(&out))
    }

    /// Raw unified diff of `path` against HEAD.
    pub fn diff(&self, path: &str) -> Result<String> {
        self.run_checked(&VcsCommand::Diff {
            path: path.to_string(),
        })
    }

    /// Commits at or after `since`, newest first, classified.
    pub fn log_since(&self, since: DateTime<Utc>) -> Result<Vec<CommitInfo>> {
        let out = self.run_checked(&VcsCommand::Log { since })?;
        parse_log(&out, self.classifier.as_ref())
    }

    /// Remote, branch and last commit. Missing pieces are `None`.
    pub fn repo_info(&self) -> Result<RepoInfo> {
        let remote_url = self.optional_line(&VcsCommand::RemoteUrl)?;
        let current_branch = self.optional_line(&VcsCommand::CurrentBranch)?;

        let last = self.runner.run(&VcsCommand::LastCommit)?;
        let last_commit = if last.is_success() {
            parse_log(&last.stdout, self.classifier.as_ref())?.into_iter().next()
        } else {
            None
        };

        let host = remote_url
            .as_deref()
            .map(RepoHost::detect)
            .unwrap_or(RepoHost::Unknown);
        Ok(RepoInfo {
            remote_url,
            host,
            current_branch,
            last_commit,
        })
    }

    fn run_checked(&self, command: &VcsCommand) -> Result<String> {
        let out = self.runner.run(command)?;
        if !out.is_success() {
            return Err(PulseError::repository(
                command.label(),
                format!("exit code {}: {}", out.exit_code, out.stderr.trim()),
            ));
        }
        Ok(out.stdout)
    }

    fn optional_line(&self, command: &VcsCommand) -> Result<Option<String>> {
        let out = self.runner.run(command)?;
        if !out.is_success() {
            return Ok(None);
        }
        let line = out.stdout.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }
}

/// Parses `git status --porcelain` (v1) output.
pub fn parse_porcelain_status(output: &str) -> WorkingTreeStatus {
    let mut status = WorkingTreeStatus::default();

    for line in output.lines() {
        if line.len() < 4 {
            continue;
        }
        let (code, path) = line.split_at(2);
        let path = path.trim_start();
        let path = unquote(path);

        if code == "??" {
            status.untracked.push(path);
        } else if code.contains('R') {
            let target = path.rsplit(" -> ").next().unwrap_or_default().to_string();
            status.renamed.push(target);
        } else if code.contains('A') {
            status.added.push(path);
        } else if code.contains('D') {
            status.deleted.push(path);
        } else if code.trim() != "!!" {
            status.modified.push(path);
        }
    }

    status.total_changes =
        status.modified.len() + status.added.len() + status.deleted.len() + status.renamed.len();
    status
}

fn unquote(path: &str) -> String {
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path)
        .to_string()
}

/// Parses log records written with the `%x1f`/`%x1e` separated format.
pub fn parse_log(output: &str, classifier: &dyn Classifier) -> Result<Vec<CommitInfo>> {
    let mut commits = Vec::new();

    for record in output.split(RECORD_SEP) {
        let record = record.trim_matches(|c: char| c == '\n' || c == '\r');
        if record.is_empty() {
            continue;
        }
        let fields: Vec<&str> = record.splitn(4, FIELD_SEP).collect();
        if fields.len() != 4 {
            return Err(PulseError::Parse(format!(
                "log record has {} fields, expected 4",
                fields.len()
            )));
        }
        let timestamp = DateTime::parse_from_rfc3339(fields[2].trim())
            .map_err(|e| PulseError::Parse(format!("bad commit date {:?}: {}", fields[2], e)))?
            .with_timezone(&Utc);
        let message = fields[3].trim().to_string();
        let verdict = classifier.classify(&message);

        commits.push(CommitInfo {
            hash: fields[0].trim().to_string(),
            author: fields[1].to_string(),
            timestamp,
            message,
            is_ai_assisted: verdict.is_ai_assisted,
            commit_type: verdict.commit_type,
        });
    }

    Ok(commits)
}
