use super::assertions::Assertion;
use super::clock::MockClock;
use super::repo::ScriptedRepo;
use super::steps::{ErrorKind, ScenarioStep};
use super::workspace::TestWorkspace;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use devpulse_core::{
    efficiency_rating, AiMetrics, AnalyticsContext, Config, DateRange, Feedback, NewUsageEvent,
    PulseError, SessionReport,
};
use std::time::Duration;

const TOLERANCE: f64 = 1e-9;

/// Executes scenarios against a real engine over a scripted repository
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    repo: ScriptedRepo,
    clock: MockClock,
    ctx: Option<AnalyticsContext>,
    last_report: Option<SessionReport>,
    recovery_noticed: bool,
    current_step: usize,
}

impl ScenarioRunner {
    pub fn new(config: Config, start: Option<DateTime<Utc>>) -> Result<Self> {
        let workspace = TestWorkspace::with_config(config)?;
        let repo = ScriptedRepo::new();
        let clock = start.map(MockClock::at).unwrap_or_default();

        let mut runner = Self {
            workspace,
            repo,
            clock,
            ctx: None,
            last_report: None,
            recovery_noticed: false,
            current_step: 0,
        };
        runner.reopen()?;
        Ok(runner)
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    fn ctx(&self) -> Result<&AnalyticsContext> {
        self.ctx
            .as_ref()
            .ok_or_else(|| anyhow!("engine not open"))
    }

    fn reopen(&mut self) -> Result<()> {
        self.ctx = None;
        let ctx = self.workspace.open(&self.repo, &self.clock)?;
        if ctx.store().take_recovery_notice().is_some() {
            self.recovery_noticed = true;
        }
        self.ctx = Some(ctx);
        Ok(())
    }

    /// Execute a single step
    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::StartSession { id, user, tool } => {
                self.ctx()?.tracker().start(id, user, tool)?;
                Ok(())
            }
            ScenarioStep::TrackChange { id, path } => {
                self.ctx()?.tracker().track_change(id, path)?;
                Ok(())
            }
            ScenarioStep::EndSession { id } => {
                let report = self.ctx()?.tracker().end(id)?;
                self.last_report = Some(report);
                Ok(())
            }
            ScenarioStep::LogUsage {
                tool,
                user,
                feedback,
                quality,
            } => self.handle_log_usage(tool, user, *feedback, *quality),

            ScenarioStep::EditFile { path, diff } => {
                self.repo.edit(path, diff);
                Ok(())
            }
            ScenarioStep::AddUntracked { path } => {
                self.repo.add_untracked(path);
                Ok(())
            }
            ScenarioStep::Commit { author, message } => {
                self.repo.commit(author, self.clock.now(), message);
                Ok(())
            }
            ScenarioStep::GitOffline => {
                self.repo.set_offline(true);
                Ok(())
            }
            ScenarioStep::GitOnline => {
                self.repo.set_offline(false);
                Ok(())
            }

            ScenarioStep::WaitMinutes { minutes } => {
                self.clock.advance(Duration::from_secs(minutes * 60));
                Ok(())
            }
            ScenarioStep::WaitDays { days } => {
                self.clock.advance_days(*days);
                Ok(())
            }

            ScenarioStep::Restart => self.reopen(),
            ScenarioStep::CorruptStore => {
                self.ctx = None;
                self.workspace.corrupt_store()?;
                self.reopen()
            }

            ScenarioStep::ExpectFailure { step, kind } => self.handle_expect_failure(step, *kind),
            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn handle_log_usage(&mut self, tool: &str, user: &str, feedback: Option<Feedback>, quality: f64) -> Result<()> {
        let base = AiMetrics::default();
        let metrics = AiMetrics {
            quality_score: quality,
            efficiency_rating: efficiency_rating(quality, base.ai_probability, 0.0),
            ..base
        };
        self.ctx()?.store().append(
            NewUsageEvent::new(tool, user)
                .with_metrics(metrics)
                .with_feedback(feedback),
        )?;
        Ok(())
    }

    fn handle_expect_failure(&mut self, step: &ScenarioStep, kind: ErrorKind) -> Result<()> {
        let err = match self.execute_step(step) {
            Ok(()) => bail!("expected {:?} failure, but the step succeeded", kind),
            Err(e) => e,
        };
        let pulse = err
            .downcast_ref::<PulseError>()
            .ok_or_else(|| anyhow!("expected {:?} failure, got non-engine error: {:?}", kind, err))?;
        let matches = match kind {
            ErrorKind::Repository => matches!(pulse, PulseError::Repository { .. }),
            ErrorKind::SessionState => matches!(pulse, PulseError::SessionState { .. }),
            ErrorKind::NotFound => matches!(pulse, PulseError::NotFound(_)),
        };
        if !matches {
            bail!("expected {:?} failure, got {}", kind, pulse);
        }
        Ok(())
    }

    // ===== Assertions =====

    fn handle_assertion(&self, assertion: &Assertion) -> Result<()> {
        let ctx = self.ctx()?;
        match assertion {
            Assertion::SessionStatus { id, status } => {
                let session = ctx.tracker().get(id)?;
                ensure_eq("session status", &session.status, status)
            }
            Assertion::SessionCount(n) => ensure_eq("session count", &ctx.tracker().list().len(), n),
            Assertion::FilesTracked { id, count } => {
                ensure_eq("files tracked", &ctx.tracker().get(id)?.files.len(), count)
            }
            Assertion::FailedFiles { id, count } => {
                ensure_eq("failed files", &ctx.tracker().get(id)?.metrics().failed_files, count)
            }

            Assertion::ReportLines { added, deleted } => {
                let report = self.last_report()?;
                ensure_eq("lines added", &report.metrics.lines_added, added)?;
                ensure_eq("lines deleted", &report.metrics.lines_deleted, deleted)
            }
            Assertion::ReportCommits(n) => ensure_eq("report commits", &self.last_report()?.commits.len(), n),
            Assertion::ReportAiProbability(p) => {
                ensure_close("ai probability", self.last_report()?.ai_probability, *p)
            }
            Assertion::ReportDurationMinutes(m) => {
                ensure_close("duration minutes", self.last_report()?.duration_minutes, *m)
            }

            Assertion::EventCount { range, count } => {
                ensure_eq("event count", &ctx.store().query(*range).len(), count)
            }
            Assertion::ToolRanking(tools) => {
                let report = ctx.report(DateRange::All);
                let ranked: Vec<String> = report.tool_ranking.into_iter().map(|r| r.name).collect();
                ensure_eq("tool ranking", &ranked, tools)
            }
            Assertion::SatisfactionPercent(p) => {
                ensure_close("satisfaction", ctx.report(DateRange::All).feedback.satisfaction_percent, *p)
            }
            Assertion::RecommendationContains { range, text } => {
                let recs = ctx.report(*range).recommendations;
                if recs.iter().any(|r| r.contains(text.as_str())) {
                    Ok(())
                } else {
                    bail!("no recommendation contains {:?}: {:?}", text, recs)
                }
            }
            Assertion::Windows {
                today,
                earlier_this_week,
                earlier_this_month,
                older,
            } => {
                let w = ctx.report(DateRange::All).windows;
                ensure_eq(
                    "window breakdown",
                    &(w.today, w.earlier_this_week, w.earlier_this_month, w.older),
                    &(*today, *earlier_this_week, *earlier_this_month, *older),
                )
            }

            Assertion::RecoveryNoticed => {
                if self.recovery_noticed {
                    Ok(())
                } else {
                    bail!("store was not reported as recovered")
                }
            }
            Assertion::BackupExists => {
                let backups = self.workspace.files_containing(".corrupt-")?;
                if backups.is_empty() {
                    bail!("no backup of the corrupt store found");
                }
                Ok(())
            }

            Assertion::Custom(check) => check(ctx),
        }
    }

    fn last_report(&self) -> Result<&SessionReport> {
        self.last_report
            .as_ref()
            .ok_or_else(|| anyhow!("no session has ended yet"))
    }
}

fn ensure_eq<T: PartialEq + std::fmt::Debug>(what: &str, actual: &T, expected: &T) -> Result<()> {
    if actual != expected {
        bail!("{}: expected {:?}, got {:?}", what, expected, actual);
    }
    Ok(())
}

fn ensure_close(what: &str, actual: f64, expected: f64) -> Result<()> {
    if (actual - expected).abs() > TOLERANCE {
        bail!("{}: expected {}, got {}", what, expected, actual);
    }
    Ok(())
}
