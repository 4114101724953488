//! Usage events: the append-only facts every report is computed from.

use crate::error::{PulseError, Result};
use crate::session::SessionReport;
use crate::types::{EfficiencyRating, Feedback};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metrics attached to a usage event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMetrics {
    pub session_minutes: f64,
    pub files_modified: u64,
    pub lines_generated: u64,
    pub lines_deleted: u64,
    pub complexity_added: i64,
    pub function_count: u64,
    pub ai_probability: f64,
    pub quality_score: f64,
    pub productivity_score: f64,
    pub has_comments: bool,
    pub has_error_handling: bool,
    pub has_type_annotations: bool,
    pub efficiency_rating: EfficiencyRating,
}

impl Default for AiMetrics {
    fn default() -> Self {
        Self {
            session_minutes: 0.0,
            files_modified: 0,
            lines_generated: 0,
            lines_deleted: 0,
            complexity_added: 0,
            function_count: 0,
            ai_probability: 0.0,
            quality_score: 50.0,
            productivity_score: 0.0,
            has_comments: false,
            has_error_handling: false,
            has_type_annotations: false,
            efficiency_rating: EfficiencyRating::NeedsImprovement,
        }
    }
}

impl AiMetrics {
    /// Rejects NaN and infinite values, which JSON cannot store.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("session_minutes", self.session_minutes),
            ("ai_probability", self.ai_probability),
            ("quality_score", self.quality_score),
            ("productivity_score", self.productivity_score),
        ];
        match fields.iter().find(|(_, value)| !value.is_finite()) {
            Some((name, value)) => Err(PulseError::InvalidEvent(format!(
                "{} must be finite, got {}",
                name, value
            ))),
            None => Ok(()),
        }
    }
}

impl From<&SessionReport> for AiMetrics {
    fn from(report: &SessionReport) -> Self {
        let m = &report.metrics;
        Self {
            session_minutes: report.duration_minutes,
            files_modified: m.files_modified as u64,
            lines_generated: m.lines_added,
            lines_deleted: m.lines_deleted,
            complexity_added: m.complexity_delta,
            function_count: m.functions_added,
            ai_probability: report.ai_probability,
            quality_score: report.quality_score,
            productivity_score: report.productivity_score,
            has_comments: m.comments_added > 0,
            has_error_handling: m.has_error_handling,
            has_type_annotations: m.has_type_annotations,
            efficiency_rating: report.efficiency_rating,
        }
    }
}

/// An appended, immutable usage record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: String,
    pub tool: String,
    pub user: String,
    pub timestamp: DateTime<Utc>,
    /// UTC calendar date of `timestamp`, `YYYY-MM-DD`.
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub metrics: AiMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl UsageEvent {
    /// Key under which the event is persisted; sorts chronologically.
    pub(crate) fn storage_key(&self) -> String {
        format!(
            "{}|{}",
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
            self.id
        )
    }
}

/// Input form of [`UsageEvent`]; `append` fills in id and timestamp when absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewUsageEvent {
    pub id: Option<String>,
    pub tool: String,
    pub user: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub session_id: Option<String>,
    pub context: Option<String>,
    pub metrics: AiMetrics,
    pub feedback: Option<Feedback>,
}

impl NewUsageEvent {
    pub fn new(tool: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            user: user.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_metrics(mut self, metrics: AiMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_feedback(mut self, feedback: Option<Feedback>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Event derived from an ended session, stamped at its end time.
    pub fn from_report(report: &SessionReport) -> Self {
        Self {
            id: None,
            tool: report.tool.clone(),
            user: report.user.clone(),
            timestamp: Some(report.end_time),
            session_id: Some(report.session_id.clone()),
            context: None,
            metrics: AiMetrics::from(report),
            feedback: None,
        }
    }

    pub(crate) fn into_event(self, now: DateTime<Utc>) -> UsageEvent {
        let timestamp = self.timestamp.unwrap_or(now);
        UsageEvent {
            id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            date: timestamp.format("%Y-%m-%d").to_string(),
            tool: self.tool,
            user: self.user,
            timestamp,
            session_id: self.session_id,
            context: self.context,
            metrics: self.metrics,
            feedback: self.feedback,
        }
    }
}
