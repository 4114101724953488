//! Session tracking over a working tree.
//!
//! The tracker owns the registry of live sessions. Each session sits behind
//! its own mutex; diffs are fetched and parsed outside that mutex so several
//! files of one session can be analyzed at once. Every mutation is persisted
//! to the [`EventStore`] before the call returns, which lets a later process
//! pick up Active sessions with [`SessionTracker::recover_active`].

use crate::diff::DiffAnalyzer;
use crate::error::{PulseError, Result};
use crate::repo::RepositoryInspector;
use crate::session::{Session, SessionReport, SessionStatus};
use crate::store::EventStore;
use crate::types::FileChangeRecord;
use crate::TimeProvider;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

type SessionHandle = Arc<Mutex<Session>>;

/// Drives sessions through `Created → Active → Ended`.
pub struct SessionTracker {
    inspector: RepositoryInspector,
    store: Arc<EventStore>,
    clock: Arc<dyn TimeProvider>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionTracker {
    pub fn new(
        inspector: RepositoryInspector,
        store: Arc<EventStore>,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            inspector,
            store,
            clock,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a session and captures the baseline working-tree status.
    ///
    /// # Errors
    ///
    /// `SessionState` if the id is already in use; `Repository` if the
    /// status cannot be read, in which case no session is kept.
    pub fn start(&self, id: &str, user: &str, tool: &str) -> Result<Session> {
        let handle = {
            let mut registry = self.sessions.write().unwrap_or_else(|p| p.into_inner());
            if registry.contains_key(id) || self.store.session(id).is_some() {
                return Err(PulseError::session_state(id, "session id already exists"));
            }
            let handle = Arc::new(Mutex::new(Session::new(id, user, tool, self.clock.now())));
            registry.insert(id.to_string(), Arc::clone(&handle));
            handle
        };

        let baseline = match self.inspector.status() {
            Ok(status) => status,
            Err(e) => {
                self.forget(id);
                return Err(e);
            }
        };

        let mut session = lock_session(&handle);
        session.activate(baseline)?;
        if let Err(e) = self.store.put_session(&session) {
            drop(session);
            self.forget(id);
            return Err(e);
        }
        tracing::info!(session = %id, user = %user, tool = %tool, "session started");
        Ok(session.clone())
    }

    /// Analyzes the current diff of `path` and records it on the session.
    ///
    /// Diff and parse failures do not fail the call: the file is recorded
    /// as degraded with zeroed metrics.
    pub fn track_change(&self, id: &str, path: &str) -> Result<FileChangeRecord> {
        let handle = self.handle(id)?;
        ensure_active(&lock_session(&handle))?;

        let analyzed_at = self.clock.now();
        let record = match self
            .inspector
            .diff(path)
            .and_then(|diff| DiffAnalyzer::parse(&diff))
        {
            Ok(metrics) => FileChangeRecord::analyzed(path, metrics, analyzed_at),
            Err(e) if e.is_per_file() => {
                tracing::warn!(session = %id, file = %path, error = %e, "file analysis failed; recording degraded entry");
                FileChangeRecord::degraded(path, e.to_string(), analyzed_at)
            }
            Err(e) => return Err(e),
        };

        let mut session = lock_session(&handle);
        let mut updated = session.clone();
        updated.record_change(record.clone())?;
        self.store.put_session(&updated)?;
        *session = updated;
        Ok(record)
    }

    /// Ends the session and produces its report.
    ///
    /// Commits made since the start are read from the log; if the log
    /// cannot be read the report is built with no commits.
    pub fn end(&self, id: &str) -> Result<SessionReport> {
        let handle = self.handle(id)?;
        let ended_at = self.clock.now();

        let start_time = {
            let session = lock_session(&handle);
            if session.status != SessionStatus::Active {
                return Err(PulseError::session_state(
                    id,
                    format!("cannot end a {} session", session.status.as_str()),
                ));
            }
            session.start_time
        };

        let commits = match self.inspector.log_since(start_time) {
            Ok(commits) => commits,
            Err(e) => {
                tracing::warn!(session = %id, error = %e, "commit log unavailable; reporting without commits");
                Vec::new()
            }
        };

        // The live session only moves to Ended once the store has the report.
        let mut session = lock_session(&handle);
        let mut finished = session.clone();
        finished.end(ended_at)?;
        let report = finished.compile_report(commits)?;
        finished.report = Some(report.clone());
        self.store.record_session(&finished)?;
        *session = finished;
        tracing::info!(
            session = %id,
            files = report.metrics.files_modified,
            commits = report.commits.len(),
            rating = %report.efficiency_rating,
            "session ended"
        );
        Ok(report)
    }

    /// Returns a copy of the session.
    pub fn get(&self, id: &str) -> Result<Session> {
        let handle = self.handle(id)?;
        let session = lock_session(&handle).clone();
        Ok(session)
    }

    /// All known sessions, oldest first.
    pub fn list(&self) -> Vec<Session> {
        let mut by_id: HashMap<String, Session> = self
            .store
            .sessions()
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        let live: Vec<SessionHandle> = self
            .sessions
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .cloned()
            .collect();
        for handle in live {
            let session = lock_session(&handle).clone();
            by_id.insert(session.id.clone(), session);
        }

        let mut sessions: Vec<Session> = by_id.into_values().collect();
        sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    /// Loads Active sessions persisted by an earlier process. Returns how many were added.
    pub fn recover_active(&self) -> usize {
        let mut registry = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        let mut recovered = 0;
        for session in self.store.sessions() {
            if session.status == SessionStatus::Active && !registry.contains_key(&session.id) {
                tracing::info!(session = %session.id, "recovered active session");
                registry.insert(session.id.clone(), Arc::new(Mutex::new(session)));
                recovered += 1;
            }
        }
        recovered
    }

    /// Looks up a live session, falling back to the store.
    fn handle(&self, id: &str) -> Result<SessionHandle> {
        if let Some(handle) = self
            .sessions
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(id)
        {
            return Ok(Arc::clone(handle));
        }

        let stored = self
            .store
            .session(id)
            .ok_or_else(|| PulseError::NotFound(format!("session {}", id)))?;
        let mut registry = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        let handle = registry
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(stored)));
        Ok(Arc::clone(handle))
    }

    fn forget(&self, id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(id);
    }
}

fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(|p| p.into_inner())
}

fn ensure_active(session: &Session) -> Result<()> {
    if session.is_active() {
        Ok(())
    } else {
        Err(PulseError::session_state(
            &session.id,
            format!("cannot track changes while {}", session.status.as_str()),
        ))
    }
}
