use super::assertions::Assertion;
use super::runner::ScenarioRunner;
use super::steps::{ErrorKind, ScenarioStep};
use chrono::{DateTime, Utc};
use devpulse_core::{AnalyticsContext, Config, DateRange, Feedback, SessionStatus};

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    config: Config,
    start: Option<DateTime<Utc>>,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: Config::default(),
            start: None,
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Use a non-default configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Start the mock clock at `start` instead of the default instant
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    // ===== Developer actions =====

    pub fn start_session(mut self, id: &str, user: &str, tool: &str) -> Self {
        self.steps.push(start_step(id, user, tool));
        self
    }

    pub fn track(mut self, id: &str, path: &str) -> Self {
        self.steps.push(track_step(id, path));
        self
    }

    pub fn end_session(mut self, id: &str) -> Self {
        self.steps.push(end_step(id));
        self
    }

    /// Log a usage event with default metrics
    pub fn log_usage(self, tool: &str, user: &str) -> Self {
        self.log_rated_usage(tool, user, None, 50.0)
    }

    /// Log a usage event with feedback and a quality score
    pub fn log_rated_usage(mut self, tool: &str, user: &str, feedback: Option<Feedback>, quality: f64) -> Self {
        self.steps.push(ScenarioStep::LogUsage {
            tool: tool.to_string(),
            user: user.to_string(),
            feedback,
            quality,
        });
        self
    }

    // ===== Expected failures =====

    pub fn start_session_fails(self, id: &str, user: &str, tool: &str, kind: ErrorKind) -> Self {
        self.expect_failure(start_step(id, user, tool), kind)
    }

    pub fn track_fails(self, id: &str, path: &str, kind: ErrorKind) -> Self {
        self.expect_failure(track_step(id, path), kind)
    }

    pub fn end_session_fails(self, id: &str, kind: ErrorKind) -> Self {
        self.expect_failure(end_step(id), kind)
    }

    fn expect_failure(mut self, step: ScenarioStep, kind: ErrorKind) -> Self {
        self.steps.push(ScenarioStep::ExpectFailure {
            step: Box::new(step),
            kind,
        });
        self
    }

    // ===== Working tree =====

    /// Modify a tracked file; `diff` is what `git diff HEAD` will print for it
    pub fn edit_file(mut self, path: &str, diff: &str) -> Self {
        self.steps.push(ScenarioStep::EditFile {
            path: path.to_string(),
            diff: diff.to_string(),
        });
        self
    }

    pub fn add_untracked(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::AddUntracked {
            path: path.to_string(),
        });
        self
    }

    /// Commit everything at the current mock time
    pub fn commit(mut self, author: &str, message: &str) -> Self {
        self.steps.push(ScenarioStep::Commit {
            author: author.to_string(),
            message: message.to_string(),
        });
        self
    }

    pub fn git_offline(mut self) -> Self {
        self.steps.push(ScenarioStep::GitOffline);
        self
    }

    pub fn git_online(mut self) -> Self {
        self.steps.push(ScenarioStep::GitOnline);
        self
    }

    // ===== Time control =====

    pub fn wait_minutes(mut self, minutes: u64) -> Self {
        self.steps.push(ScenarioStep::WaitMinutes { minutes });
        self
    }

    pub fn wait_days(mut self, days: u64) -> Self {
        self.steps.push(ScenarioStep::WaitDays { days });
        self
    }

    // ===== Failure simulation =====

    /// Close and reopen the engine
    pub fn restart(mut self) -> Self {
        self.steps.push(ScenarioStep::Restart);
        self
    }

    /// Close the engine, overwrite the store with garbage, reopen
    pub fn corrupt_store(mut self) -> Self {
        self.steps.push(ScenarioStep::CorruptStore);
        self
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    /// Run an arbitrary check against the open engine
    pub fn assert_custom<F>(self, check: F) -> Self
    where
        F: Fn(&AnalyticsContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.assert(Assertion::Custom(Box::new(check)))
    }

    pub fn assert_session_status(self, id: &str, status: SessionStatus) -> Self {
        self.assert(Assertion::SessionStatus {
            id: id.to_string(),
            status,
        })
    }

    pub fn assert_session_count(self, count: usize) -> Self {
        self.assert(Assertion::SessionCount(count))
    }

    pub fn assert_files_tracked(self, id: &str, count: usize) -> Self {
        self.assert(Assertion::FilesTracked {
            id: id.to_string(),
            count,
        })
    }

    pub fn assert_failed_files(self, id: &str, count: usize) -> Self {
        self.assert(Assertion::FailedFiles {
            id: id.to_string(),
            count,
        })
    }

    /// Assert on the report returned by the most recent `end_session`
    pub fn assert_report_lines(self, added: u64, deleted: u64) -> Self {
        self.assert(Assertion::ReportLines { added, deleted })
    }

    pub fn assert_report_commits(self, count: usize) -> Self {
        self.assert(Assertion::ReportCommits(count))
    }

    pub fn assert_report_ai_probability(self, probability: f64) -> Self {
        self.assert(Assertion::ReportAiProbability(probability))
    }

    pub fn assert_report_duration(self, minutes: f64) -> Self {
        self.assert(Assertion::ReportDurationMinutes(minutes))
    }

    pub fn assert_event_count(self, range: DateRange, count: usize) -> Self {
        self.assert(Assertion::EventCount { range, count })
    }

    pub fn assert_tool_ranking(self, tools: &[&str]) -> Self {
        self.assert(Assertion::ToolRanking(
            tools.iter().map(|t| t.to_string()).collect(),
        ))
    }

    pub fn assert_satisfaction(self, percent: f64) -> Self {
        self.assert(Assertion::SatisfactionPercent(percent))
    }

    pub fn assert_recommendation(self, range: DateRange, text: &str) -> Self {
        self.assert(Assertion::RecommendationContains {
            range,
            text: text.to_string(),
        })
    }

    pub fn assert_windows(self, today: usize, earlier_this_week: usize, earlier_this_month: usize, older: usize) -> Self {
        self.assert(Assertion::Windows {
            today,
            earlier_this_week,
            earlier_this_month,
            older,
        })
    }

    pub fn assert_recovery_noticed(self) -> Self {
        self.assert(Assertion::RecoveryNoticed)
    }

    pub fn assert_backup_exists(self) -> Self {
        self.assert(Assertion::BackupExists)
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::new(self.config.clone(), self.start) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

fn start_step(id: &str, user: &str, tool: &str) -> ScenarioStep {
    ScenarioStep::StartSession {
        id: id.to_string(),
        user: user.to_string(),
        tool: tool.to_string(),
    }
}

fn track_step(id: &str, path: &str) -> ScenarioStep {
    ScenarioStep::TrackChange {
        id: id.to_string(),
        path: path.to_string(),
    }
}

fn end_step(id: &str) -> ScenarioStep {
    ScenarioStep::EndSession { id: id.to_string() }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
