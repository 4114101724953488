//! Core data types shared across the analytics engine.

use crate::error::{PulseError, Result};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Line and structural metrics derived from one unified diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMetrics {
    /// Lines added inside hunks.
    pub lines_added: u32,
    /// Lines removed inside hunks.
    pub lines_deleted: u32,
    /// Control-flow keywords added minus control-flow keywords removed.
    pub complexity_delta: i32,
    /// Added lines declaring a function, method, or closure body.
    pub functions_added: u32,
    /// Added import statements.
    pub imports_changed: u32,
    /// Added lines carrying a comment marker.
    pub comments_added: u32,
    /// Added lines contain type annotations or type declarations.
    pub has_type_annotations: bool,
    /// Added lines contain try/catch/throw.
    pub has_error_handling: bool,
    /// Number of textual hunks parsed.
    pub hunks: u32,
    /// Number of binary file sections skipped.
    pub binary_files: u32,
}

/// Per-file result collected by a session. The latest record per path wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChangeRecord {
    /// Path relative to the working tree root.
    pub file_path: String,
    /// Metrics from the diff; zeroed when analysis failed.
    #[serde(flatten)]
    pub metrics: ChangeMetrics,
    /// True when the diff could not be fetched or parsed.
    pub analysis_failed: bool,
    /// Failure message for degraded records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// When the record was produced.
    pub recorded_at: DateTime<Utc>,
}

impl FileChangeRecord {
    /// Record for a successfully analyzed file.
    pub fn analyzed(file_path: &str, metrics: ChangeMetrics, recorded_at: DateTime<Utc>) -> Self {
        Self {
            file_path: file_path.to_string(),
            metrics,
            analysis_failed: false,
            failure: None,
            recorded_at,
        }
    }

    /// Zeroed record for a file whose diff could not be analyzed.
    pub fn degraded(file_path: &str, failure: String, recorded_at: DateTime<Utc>) -> Self {
        Self {
            file_path: file_path.to_string(),
            metrics: ChangeMetrics::default(),
            analysis_failed: true,
            failure: Some(failure),
            recorded_at,
        }
    }
}

/// Conventional-commit type, in matching order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    Feat,
    Fix,
    Docs,
    Style,
    Refactor,
    Test,
    Chore,
    Config,
    Other,
}

impl CommitType {
    /// Prefixed types in the order they are tried. `Other` is the fallback.
    pub const PREFIXED: [CommitType; 8] = [
        CommitType::Feat,
        CommitType::Fix,
        CommitType::Docs,
        CommitType::Style,
        CommitType::Refactor,
        CommitType::Test,
        CommitType::Chore,
        CommitType::Config,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitType::Feat => "feat",
            CommitType::Fix => "fix",
            CommitType::Docs => "docs",
            CommitType::Style => "style",
            CommitType::Refactor => "refactor",
            CommitType::Test => "test",
            CommitType::Chore => "chore",
            CommitType::Config => "config",
            CommitType::Other => "other",
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying a commit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_ai_assisted: bool,
    pub commit_type: CommitType,
}

/// A commit read from the repository log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub is_ai_assisted: bool,
    pub commit_type: CommitType,
}

/// Working-tree status snapshot from porcelain output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingTreeStatus {
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub renamed: Vec<String>,
    pub untracked: Vec<String>,
    /// Tracked changes (modified + added + deleted + renamed).
    pub total_changes: usize,
}

/// Hosting service inferred from the remote URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepoHost {
    Github,
    Gitlab,
    AliyunYunxiao,
    Unknown,
}

impl RepoHost {
    /// Detects the host from a remote URL.
    pub fn detect(remote_url: &str) -> Self {
        let lower = remote_url.to_lowercase();
        if lower.contains("github.com") {
            RepoHost::Github
        } else if lower.contains("gitlab") {
            RepoHost::Gitlab
        } else if lower.contains("codeup.aliyun.com") || lower.contains("yunxiao") || remote_url.contains("云效") {
            RepoHost::AliyunYunxiao
        } else {
            RepoHost::Unknown
        }
    }
}

/// Basic repository facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub remote_url: Option<String>,
    pub host: RepoHost,
    pub current_branch: Option<String>,
    pub last_commit: Option<CommitInfo>,
}

/// User rating attached to a usage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Excellent,
    Good,
    Average,
    Poor,
}

/// Result of interpreting a free-text feedback answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackResponse {
    Rated(Feedback),
    Skipped,
    /// Text that is neither a rating nor a skip keyword; treated as skipped.
    Unrecognized(String),
}

/// Answers that mean "no feedback".
const SKIP_KEYWORDS: [&str; 4] = ["", "1", "skip", "跳过"];

impl Feedback {
    pub const ALL: [Feedback; 4] = [
        Feedback::Excellent,
        Feedback::Good,
        Feedback::Average,
        Feedback::Poor,
    ];

    /// Numeric score on a 5-point scale.
    pub fn score(&self) -> u8 {
        match self {
            Feedback::Excellent => 5,
            Feedback::Good => 4,
            Feedback::Average => 3,
            Feedback::Poor => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Excellent => "excellent",
            Feedback::Good => "good",
            Feedback::Average => "average",
            Feedback::Poor => "poor",
        }
    }

    /// Interprets a user's answer to a feedback prompt.
    pub fn parse_response(response: &str) -> FeedbackResponse {
        let cleaned = response.trim().to_lowercase();
        if SKIP_KEYWORDS.contains(&cleaned.as_str()) {
            return FeedbackResponse::Skipped;
        }
        let rating = match cleaned.as_str() {
            "excellent" | "优秀" | "棒" => Feedback::Excellent,
            "good" | "良好" | "好" => Feedback::Good,
            "average" | "一般" => Feedback::Average,
            "poor" | "较差" | "差" => Feedback::Poor,
            _ => return FeedbackResponse::Unrecognized(response.trim().to_string()),
        };
        FeedbackResponse::Rated(rating)
    }
}

impl FromStr for Feedback {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match Feedback::parse_response(s) {
            FeedbackResponse::Rated(f) => Ok(f),
            _ => Err(PulseError::Parse(format!("unknown feedback rating: {}", s))),
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Efficiency label derived from the weighted efficiency score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EfficiencyRating {
    Excellent,
    Good,
    Average,
    NeedsImprovement,
}

impl EfficiencyRating {
    pub const ALL: [EfficiencyRating; 4] = [
        EfficiencyRating::Excellent,
        EfficiencyRating::Good,
        EfficiencyRating::Average,
        EfficiencyRating::NeedsImprovement,
    ];

    /// Maps a weighted efficiency score onto its label.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            EfficiencyRating::Excellent
        } else if score >= 60.0 {
            EfficiencyRating::Good
        } else if score >= 40.0 {
            EfficiencyRating::Average
        } else {
            EfficiencyRating::NeedsImprovement
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EfficiencyRating::Excellent => "excellent",
            EfficiencyRating::Good => "good",
            EfficiencyRating::Average => "average",
            EfficiencyRating::NeedsImprovement => "needs-improvement",
        }
    }
}

impl fmt::Display for EfficiencyRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting window, evaluated relative to the call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    /// Since UTC midnight of the current day.
    Today,
    /// The last 7 × 24 hours.
    Last7Days,
    /// The last 30 × 24 hours.
    Last30Days,
    All,
}

impl DateRange {
    /// Inclusive lower bound of the window, or None for `All`.
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DateRange::Today => Some(now.date_naive().and_time(NaiveTime::MIN).and_utc()),
            DateRange::Last7Days => Some(now - Duration::days(7)),
            DateRange::Last30Days => Some(now - Duration::days(30)),
            DateRange::All => None,
        }
    }

    /// Returns true when `timestamp` falls inside the window.
    pub fn contains(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.window_start(now) {
            Some(start) => timestamp >= start,
            None => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DateRange::Today => "today",
            DateRange::Last7Days => "last7days",
            DateRange::Last30Days => "last30days",
            DateRange::All => "all",
        }
    }
}

impl FromStr for DateRange {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(DateRange::Today),
            "week" | "last7days" => Ok(DateRange::Last7Days),
            "month" | "last30days" => Ok(DateRange::Last30Days),
            "all" => Ok(DateRange::All),
            other => Err(PulseError::Parse(format!("unknown date range: {}", other))),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
