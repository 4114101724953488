use chrono::{DateTime, SecondsFormat, Utc};
use devpulse_core::{CommandOutput, CommandRunner, PulseError, VcsCommand};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RepoState {
    /// Porcelain status code per path.
    changes: BTreeMap<String, String>,
    /// Raw diff text per path.
    diffs: BTreeMap<String, String>,
    /// (hash, author, time, subject), oldest first.
    commits: Vec<(String, String, DateTime<Utc>, String)>,
    remote: Option<String>,
    branch: Option<String>,
    offline: bool,
    calls: usize,
}

/// In-memory stand-in for a git working tree.
///
/// Clones share state, so a scenario can keep editing the tree after the
/// engine has taken its copy.
#[derive(Clone, Default)]
pub struct ScriptedRepo {
    state: Arc<Mutex<RepoState>>,
}

impl ScriptedRepo {
    pub fn new() -> Self {
        let repo = Self::default();
        {
            let mut state = repo.state.lock().unwrap();
            state.branch = Some("main".to_string());
        }
        repo
    }

    /// Marks `path` modified with the given diff.
    pub fn edit(&self, path: &str, diff: &str) {
        let mut state = self.state.lock().unwrap();
        state.changes.insert(path.to_string(), " M".to_string());
        state.diffs.insert(path.to_string(), diff.to_string());
    }

    /// Adds an untracked file, which has no diff against HEAD.
    pub fn add_untracked(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        state.changes.insert(path.to_string(), "??".to_string());
    }

    pub fn commit(&self, author: &str, at: DateTime<Utc>, message: &str) {
        let mut state = self.state.lock().unwrap();
        let hash = format!("{:040x}", state.commits.len() + 1);
        state
            .commits
            .push((hash, author.to_string(), at, message.to_string()));
        state.changes.clear();
        state.diffs.clear();
    }

    pub fn set_remote(&self, url: &str) {
        self.state.lock().unwrap().remote = Some(url.to_string());
    }

    /// While offline every command fails to run.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

fn log_record(commit: &(String, String, DateTime<Utc>, String)) -> String {
    format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1e}\n",
        commit.0,
        commit.1,
        commit.2.to_rfc3339_opts(SecondsFormat::Secs, true),
        commit.3
    )
}

impl CommandRunner for ScriptedRepo {
    fn run(&self, command: &VcsCommand) -> devpulse_core::Result<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.offline {
            return Err(PulseError::Repository {
                context: command.label(),
                message: "scripted repository is offline".to_string(),
            });
        }

        let output = match command {
            VcsCommand::Status => CommandOutput::success(
                state
                    .changes
                    .iter()
                    .map(|(path, code)| format!("{} {}\n", code, path))
                    .collect::<String>(),
            ),
            VcsCommand::Diff { path } => match state.diffs.get(path) {
                Some(diff) => CommandOutput::success(diff.clone()),
                None if state.commits.is_empty() => {
                    CommandOutput::failure(128, "fatal: bad revision 'HEAD'")
                }
                None => CommandOutput::success(""),
            },
            VcsCommand::Log { since } => CommandOutput::success(
                state
                    .commits
                    .iter()
                    .rev()
                    .filter(|c| c.2 >= *since)
                    .map(log_record)
                    .collect::<String>(),
            ),
            VcsCommand::RemoteUrl => match &state.remote {
                Some(url) => CommandOutput::success(format!("{}\n", url)),
                None => CommandOutput::failure(1, ""),
            },
            VcsCommand::CurrentBranch => match &state.branch {
                Some(branch) => CommandOutput::success(format!("{}\n", branch)),
                None => CommandOutput::failure(128, "fatal: ambiguous argument 'HEAD'"),
            },
            VcsCommand::LastCommit => match state.commits.last() {
                Some(commit) => CommandOutput::success(log_record(commit)),
                None => CommandOutput::failure(128, "fatal: your current branch does not have any commits yet"),
            },
        };
        Ok(output)
    }
}
