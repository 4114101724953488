//! Wiring of the engine components around one data directory.

use crate::classification::{Classifier, CommitClassifier};
use crate::config::Config;
use crate::error::Result;
use crate::repo::{CommandRunner, GitCli, RepositoryInspector};
use crate::report::{Report, ReportEngine};
use crate::store::EventStore;
use crate::sync::{OutboxCollector, SyncQueue};
use crate::tracker::SessionTracker;
use crate::types::DateRange;
use crate::{SystemClock, TimeProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An opened analytics engine: store, tracker and repository access.
pub struct AnalyticsContext {
    data_dir: PathBuf,
    config: Config,
    clock: Arc<dyn TimeProvider>,
    inspector: RepositoryInspector,
    store: Arc<EventStore>,
    tracker: SessionTracker,
}

impl AnalyticsContext {
    /// Opens the engine rooted at `data_dir`, running `git` per the config.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let config = Config::load(data_dir.as_ref())?;
        Self::with_config(data_dir, config)
    }

    /// Opens the engine with an already loaded configuration.
    pub fn with_config(data_dir: impl AsRef<Path>, config: Config) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let runner = Arc::new(GitCli::new(
            config.git.binary.clone(),
            &config.git.repo_path,
            config.git.timeout(),
        ));
        Self::with_parts(data_dir, config, runner, Arc::new(SystemClock))
    }

    /// Opens the engine with an injected command runner and clock.
    pub fn with_parts(
        data_dir: impl AsRef<Path>,
        config: Config,
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let classifier: Arc<dyn Classifier> =
            Arc::new(CommitClassifier::new(&config.classifier.extra_keywords));
        let inspector = RepositoryInspector::new(runner, classifier);

        let mut store = EventStore::open(config.store_path(&data_dir), Arc::clone(&clock))?;
        if config.sync.enabled {
            let collector = Arc::new(OutboxCollector::new(config.outbox_path(&data_dir)));
            store = store.with_sync(SyncQueue::start(collector, &config.sync));
        }
        let store = Arc::new(store);

        let tracker = SessionTracker::new(inspector.clone(), Arc::clone(&store), Arc::clone(&clock));
        let recovered = tracker.recover_active();
        if recovered > 0 {
            tracing::info!(sessions = recovered, "resumed active sessions");
        }

        Ok(Self {
            data_dir,
            config,
            clock,
            inspector,
            store,
            tracker,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn inspector(&self) -> &RepositoryInspector {
        &self.inspector
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Report over the stored events for `range`.
    pub fn report(&self, range: DateRange) -> Report {
        ReportEngine::generate(&self.store.snapshot(), range, self.now())
    }

    /// Report with commit patterns from the repository log over the same window.
    ///
    /// Falls back to a report without commit patterns when the log cannot be read.
    pub fn report_with_commits(&self, range: DateRange) -> Report {
        let now = self.now();
        let since = range
            .window_start(now)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH);
        let snapshot = self.store.snapshot();
        match self.inspector.log_since(since) {
            Ok(commits) => ReportEngine::generate_with_commits(&snapshot, range, now, &commits),
            Err(e) => {
                tracing::warn!(error = %e, "commit log unavailable; reporting without commit patterns");
                ReportEngine::generate(&snapshot, range, now)
            }
        }
    }
}
