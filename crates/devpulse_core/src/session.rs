//! Session records and their lifecycle.
//!
//! A session moves `Created → Active → Ended` and never goes back. File
//! change records are only accepted while Active; once Ended the session
//! carries an immutable [`SessionReport`].

use crate::error::{PulseError, Result};
use crate::scoring::{self, SessionFacts};
use crate::types::{CommitInfo, EfficiencyRating, FileChangeRecord, WorkingTreeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Active,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        }
    }
}

/// A tracked coding session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user: String,
    pub tool: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    /// Working-tree status captured when the session became Active.
    pub baseline: WorkingTreeStatus,
    /// Latest record per file path.
    pub files: BTreeMap<String, FileChangeRecord>,
    pub report: Option<SessionReport>,
}

impl Session {
    pub(crate) fn new(id: &str, user: &str, tool: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            user: user.to_string(),
            tool: tool.to_string(),
            start_time: now,
            end_time: None,
            status: SessionStatus::Created,
            baseline: WorkingTreeStatus::default(),
            files: BTreeMap::new(),
            report: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Moves a Created session to Active with its baseline snapshot.
    pub(crate) fn activate(&mut self, baseline: WorkingTreeStatus) -> Result<()> {
        self.transition(SessionStatus::Active)?;
        self.baseline = baseline;
        Ok(())
    }

    /// Upserts a file record. Only valid while Active.
    pub(crate) fn record_change(&mut self, record: FileChangeRecord) -> Result<()> {
        if !self.is_active() {
            return Err(PulseError::session_state(
                &self.id,
                format!("cannot track changes while {}", self.status.as_str()),
            ));
        }
        self.files.insert(record.file_path.clone(), record);
        Ok(())
    }

    /// Moves an Active session to Ended. The end time never precedes the start.
    pub(crate) fn end(&mut self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.transition(SessionStatus::Ended)?;
        let end_time = now.max(self.start_time);
        self.end_time = Some(end_time);
        Ok(end_time)
    }

    /// Sums the per-file records.
    pub fn metrics(&self) -> ProductivityMetrics {
        let mut metrics = ProductivityMetrics {
            files_modified: self.files.len(),
            ..ProductivityMetrics::default()
        };
        for record in self.files.values() {
            let m = &record.metrics;
            metrics.lines_added += u64::from(m.lines_added);
            metrics.lines_deleted += u64::from(m.lines_deleted);
            metrics.functions_added += u64::from(m.functions_added);
            metrics.complexity_delta += i64::from(m.complexity_delta);
            metrics.comments_added += u64::from(m.comments_added);
            metrics.imports_changed += u64::from(m.imports_changed);
            metrics.has_type_annotations |= m.has_type_annotations;
            metrics.has_error_handling |= m.has_error_handling;
            if record.analysis_failed {
                metrics.failed_files += 1;
            }
        }
        metrics
    }

    /// Builds the final report for an Ended session.
    pub(crate) fn compile_report(&self, commits: Vec<CommitInfo>) -> Result<SessionReport> {
        let end_time = match (self.status, self.end_time) {
            (SessionStatus::Ended, Some(end)) => end,
            _ => {
                return Err(PulseError::session_state(
                    &self.id,
                    "report requested before the session ended",
                ))
            }
        };

        let metrics = self.metrics();
        let duration_minutes = (end_time - self.start_time).num_milliseconds() as f64 / 60_000.0;

        let ai_commits = commits.iter().filter(|c| c.is_ai_assisted).count();
        let ai_probability = if commits.is_empty() {
            0.0
        } else {
            ai_commits as f64 / commits.len() as f64
        };

        let productivity_score = scoring::productivity_score(
            metrics.lines_added,
            duration_minutes,
            metrics.files_modified as u64,
        );
        let quality_score = scoring::quality_score(
            metrics.has_type_annotations,
            metrics.has_error_handling,
            metrics.comments_added > 0,
        );
        let complexity = metrics.complexity_delta as f64;
        let efficiency_score = scoring::efficiency_score(quality_score, ai_probability, complexity);

        let recommendations = scoring::session_recommendations(&SessionFacts {
            quality_score,
            complexity_delta: metrics.complexity_delta,
            lines_added: metrics.lines_added,
            lines_deleted: metrics.lines_deleted,
            failed_files: metrics.failed_files,
            commits: commits.len(),
        });

        Ok(SessionReport {
            session_id: self.id.clone(),
            user: self.user.clone(),
            tool: self.tool.clone(),
            start_time: self.start_time,
            end_time,
            duration_minutes,
            metrics,
            commits,
            ai_probability,
            productivity_score,
            quality_score,
            efficiency_score,
            efficiency_rating: EfficiencyRating::from_score(efficiency_score),
            recommendations,
        })
    }

    fn transition(&mut self, to: SessionStatus) -> Result<()> {
        if !is_valid_transition(self.status, to) {
            return Err(PulseError::session_state(
                &self.id,
                format!("invalid transition {} -> {}", self.status.as_str(), to.as_str()),
            ));
        }
        tracing::info!(session = %self.id, from = self.status.as_str(), to = to.as_str(), "session transition");
        self.status = to;
        Ok(())
    }
}

fn is_valid_transition(from: SessionStatus, to: SessionStatus) -> bool {
    use SessionStatus::*;

    matches!((from, to), (Created, Active) | (Active, Ended))
}

/// Session-level totals over all file records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductivityMetrics {
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub functions_added: u64,
    pub complexity_delta: i64,
    pub comments_added: u64,
    pub imports_changed: u64,
    /// Distinct file paths with a record.
    pub files_modified: usize,
    /// Records whose analysis failed.
    pub failed_files: usize,
    pub has_type_annotations: bool,
    pub has_error_handling: bool,
}

/// Immutable summary produced when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub user: String,
    pub tool: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: f64,
    pub metrics: ProductivityMetrics,
    /// Commits made since the session started.
    pub commits: Vec<CommitInfo>,
    /// Share of AI-assisted commits; 0 without commits.
    pub ai_probability: f64,
    pub productivity_score: f64,
    pub quality_score: f64,
    pub efficiency_score: f64,
    pub efficiency_rating: EfficiencyRating,
    pub recommendations: Vec<String>,
}
