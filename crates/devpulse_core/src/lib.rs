//! DevPulse Core Library
//!
//! Developer-activity analytics over a local git working tree:
//! - Coding sessions tracked from start to end against the working tree
//! - Unified-diff metrics (lines, complexity, structural signals)
//! - AI-assistance detection and conventional-commit typing
//! - An append-only usage store with per-day and per-tool aggregates
//! - Windowed reports with ordered recommendations
//!
//! # Quick Start
//!
//! ```
//! use devpulse_core::{DateRange, EventStore, NewUsageEvent, ReportEngine, SystemClock};
//! use std::sync::Arc;
//!
//! let store = EventStore::in_memory(Arc::new(SystemClock)).unwrap();
//! store.append(NewUsageEvent::new("cursor", "ada")).unwrap();
//!
//! let report = ReportEngine::generate(&store.snapshot(), DateRange::Today, store.now());
//! assert_eq!(report.totals.events, 1);
//! ```
//!
//! # Diff analysis
//!
//! ```
//! use devpulse_core::DiffAnalyzer;
//!
//! let diff = "\
//! diff --git a/src/app.ts b/src/app.ts
//! --- a/src/app.ts
//! +++ b/src/app.ts
//! @@ -1,0 +1,2 @@
//! +// load settings
//! +if (ready) { start(); }
//! ";
//! let metrics = DiffAnalyzer::parse(diff).unwrap();
//! assert_eq!(metrics.lines_added, 2);
//! assert_eq!(metrics.complexity_delta, 1);
//! assert_eq!(metrics.comments_added, 1);
//! ```
//!
//! # Commit classification
//!
//! ```
//! use devpulse_core::{Classifier, CommitClassifier, CommitType};
//!
//! let verdict = CommitClassifier::default().classify("feat(ui): add login form (via Cursor)");
//! assert!(verdict.is_ai_assisted);
//! assert_eq!(verdict.commit_type, CommitType::Feat);
//! ```

mod aggregate;
mod classification;
mod config;
mod context;
mod diff;
mod error;
mod event;
mod repo;
mod report;
mod scoring;
mod session;
mod store;
mod sync;
mod tracker;
mod types;

pub use aggregate::{Aggregates, DailyAggregate, RunningMean, ToolAggregate};
pub use classification::{commit_type_of, Classifier, CommitClassifier, CommitPatterns};
pub use config::{ClassifierConfig, Config, GitConfig, StorageConfig, SyncConfig, DATA_DIR_ENV};
pub use context::AnalyticsContext;
pub use diff::DiffAnalyzer;
pub use error::{PulseError, Result};
pub use event::{AiMetrics, NewUsageEvent, UsageEvent};
pub use repo::{
    parse_log, parse_porcelain_status, CommandOutput, CommandRunner, GitCli, RepositoryInspector,
    VcsCommand,
};
pub use report::{
    Averages, EfficiencyBucket, FeedbackCount, FeedbackSummary, QualityIndicators, RankEntry,
    Report, ReportEngine, Totals, TrendPoint, WindowBreakdown,
};
pub use scoring::{
    efficiency_rating, efficiency_score, productivity_score, quality_score,
    session_recommendations, SessionFacts,
};
pub use session::{ProductivityMetrics, Session, SessionReport, SessionStatus};
pub use store::{EventStore, RebuildSummary, StoreSnapshot, STORE_SCHEMA_VERSION};
pub use sync::{Collector, OutboxCollector, SyncQueue, SyncStats};
pub use tracker::SessionTracker;
pub use types::*;

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Sessions, events and report windows all read time through this trait so
/// tests can pin or step the clock.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<F> TimeProvider for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
