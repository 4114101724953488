//! Durable event store backed by redb.
//!
//! The store keeps usage events, sessions, and the per-day and per-tool
//! aggregates in five tables:
//!
//! ```text
//! sessions     : session id          -> Session (JSON)
//! events       : "<rfc3339>|<id>"    -> UsageEvent (JSON)
//! daily_stats  : "YYYY-MM-DD"        -> DailyAggregate (JSON)
//! tool_stats   : tool name           -> ToolAggregate (JSON)
//! metadata     : table name          -> schema version
//! ```
//!
//! Everything is loaded into memory at open. Mutations are serialized by a
//! single writer lock: each append writes the event and both touched
//! aggregates in one transaction, then publishes the new in-memory state.
//! Readers clone a snapshot under a short read lock.
//!
//! A file that cannot be read is moved aside to
//! `<file>.corrupt-<unix>.bak` and replaced with an empty store; the event
//! is logged once and reported through [`EventStore::take_recovery_notice`].

use crate::aggregate::{Aggregates, DailyAggregate, ToolAggregate};
use crate::error::{PulseError, Result};
use crate::event::{NewUsageEvent, UsageEvent};
use crate::session::{Session, SessionStatus};
use crate::sync::{SyncQueue, SyncStats};
use crate::types::DateRange;
use crate::TimeProvider;
use redb::{Database, DatabaseError, ReadableTable, StorageBackend, StorageError, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Schema version written for every table.
pub const STORE_SCHEMA_VERSION: u32 = 1;

const SESSIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
const EVENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("events");
const DAILY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("daily_stats");
const TOOL_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tool_stats");
const METADATA_TABLE: TableDefinition<&str, u32> = TableDefinition::new("metadata");

const SCHEMA_KEYS: [&str; 4] = ["sessions", "events", "daily_stats", "tool_stats"];

/// Consistent copy of the store contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Events in chronological order.
    pub events: Vec<UsageEvent>,
    pub aggregates: Aggregates,
    pub sessions: BTreeMap<String, Session>,
}

/// Counts reported by [`EventStore::rebuild_aggregates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSummary {
    pub events: usize,
    pub days: usize,
    pub tools: usize,
}

enum Failure {
    Corrupt(String),
    Fatal(PulseError),
}

struct Loaded {
    snapshot: StoreSnapshot,
    aggregates_rebuilt: bool,
}

/// Append-only usage store with incrementally maintained aggregates.
pub struct EventStore {
    db: Database,
    path: Option<PathBuf>,
    clock: Arc<dyn TimeProvider>,
    writer: Mutex<()>,
    state: RwLock<StoreSnapshot>,
    recovery_notice: Mutex<Option<String>>,
    sync: Option<SyncQueue>,
}

impl EventStore {
    /// Opens or creates the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is held by another handle, cannot be
    /// accessed, or carries an unsupported schema version. Corrupt files
    /// are recovered instead of reported.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn TimeProvider>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let attempt = Database::create(&path)
            .map_err(classify_open_error)
            .and_then(|db| load(&db).map(|loaded| (db, loaded)));

        match attempt {
            Ok((db, loaded)) => {
                let store = Self::from_parts(db, Some(path), clock, loaded.snapshot);
                if loaded.aggregates_rebuilt {
                    tracing::warn!(path = %store.display_path(), "aggregate rows were unreadable; rebuilt from events");
                    store.persist_aggregates()?;
                }
                tracing::info!(
                    path = %store.display_path(),
                    events = store.read_state().events.len(),
                    "event store opened"
                );
                Ok(store)
            }
            Err(Failure::Fatal(e)) => Err(e),
            Err(Failure::Corrupt(reason)) => Self::recover(path, clock, reason),
        }
    }

    /// Creates an empty store that lives only in memory.
    pub fn in_memory(clock: Arc<dyn TimeProvider>) -> Result<Self> {
        Self::with_backend(redb::backends::InMemoryBackend::new(), clock)
    }

    /// Creates an empty store over a custom redb storage backend.
    pub fn with_backend(backend: impl StorageBackend, clock: Arc<dyn TimeProvider>) -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(store_err("failed to create store"))?;
        init_schema(&db).map_err(failure_into_error)?;
        Ok(Self::from_parts(db, None, clock, StoreSnapshot::default()))
    }

    /// Forwards every appended event to `queue`.
    pub fn with_sync(mut self, queue: SyncQueue) -> Self {
        self.sync = Some(queue);
        self
    }

    fn from_parts(
        db: Database,
        path: Option<PathBuf>,
        clock: Arc<dyn TimeProvider>,
        snapshot: StoreSnapshot,
    ) -> Self {
        Self {
            db,
            path,
            clock,
            writer: Mutex::new(()),
            state: RwLock::new(snapshot),
            recovery_notice: Mutex::new(None),
            sync: None,
        }
    }

    fn recover(path: PathBuf, clock: Arc<dyn TimeProvider>, reason: String) -> Result<Self> {
        let backup = backup_path(&path, clock.now().timestamp());
        fs::rename(&path, &backup)?;

        tracing::warn!(
            path = %path.display(),
            backup = %backup.display(),
            reason = %reason,
            "event store unreadable; moved aside and reinitialized"
        );

        let db = Database::create(&path).map_err(|e| PulseError::StoreCorruption {
            path: path.clone(),
            reason: format!("reinitialization failed: {}", e),
        })?;
        init_schema(&db).map_err(failure_into_error)?;

        let notice = format!(
            "Event store {} was unreadable ({}). It was moved to {} and a new empty store was created.",
            path.display(),
            reason,
            backup.display()
        );
        let store = Self::from_parts(db, Some(path), clock, StoreSnapshot::default());
        *lock(&store.recovery_notice) = Some(notice);
        Ok(store)
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }

    /// Returns the corruption-recovery notice once, then None.
    pub fn take_recovery_notice(&self) -> Option<String> {
        lock(&self.recovery_notice).take()
    }

    /// Appends one event and updates its day and tool aggregates.
    ///
    /// # Errors
    ///
    /// `InvalidEvent` if a metric is not finite or the id is already
    /// stored; nothing is written in that case.
    pub fn append(&self, new_event: NewUsageEvent) -> Result<UsageEvent> {
        new_event.metrics.validate()?;
        let _writer = lock(&self.writer);
        let event = new_event.into_event(self.clock.now());
        self.ensure_new_id(&event.id)?;
        let (daily, tool) = self.updated_buckets(&event);

        let txn = self.db.begin_write().map_err(store_err("failed to begin write"))?;
        {
            write_json(&txn, EVENTS_TABLE, &event.storage_key(), &event)?;
            write_json(&txn, DAILY_TABLE, &daily.date, &daily)?;
            write_json(&txn, TOOL_TABLE, &tool.tool, &tool)?;
        }
        txn.commit().map_err(store_err("failed to commit event"))?;

        self.publish(&event, daily, tool, None);
        tracing::debug!(event_id = %event.id, tool = %event.tool, "event appended");
        self.forward(&event);
        Ok(event)
    }

    /// Upserts an ended session and appends the event derived from its report.
    pub fn record_session(&self, session: &Session) -> Result<UsageEvent> {
        let report = match (&session.status, &session.report) {
            (SessionStatus::Ended, Some(report)) => report,
            _ => {
                return Err(PulseError::session_state(
                    &session.id,
                    "only ended sessions with a report can be recorded",
                ))
            }
        };

        let new_event = NewUsageEvent::from_report(report);
        new_event.metrics.validate()?;
        let _writer = lock(&self.writer);
        let event = new_event.into_event(self.clock.now());
        self.ensure_new_id(&event.id)?;
        let (daily, tool) = self.updated_buckets(&event);

        let txn = self.db.begin_write().map_err(store_err("failed to begin write"))?;
        {
            write_json(&txn, SESSIONS_TABLE, &session.id, session)?;
            write_json(&txn, EVENTS_TABLE, &event.storage_key(), &event)?;
            write_json(&txn, DAILY_TABLE, &daily.date, &daily)?;
            write_json(&txn, TOOL_TABLE, &tool.tool, &tool)?;
        }
        txn.commit().map_err(store_err("failed to commit session"))?;

        self.publish(&event, daily, tool, Some(session.clone()));
        tracing::info!(session = %session.id, event_id = %event.id, "session recorded");
        self.forward(&event);
        Ok(event)
    }

    // Caller holds the writer lock; the in-memory events mirror the table.
    fn ensure_new_id(&self, id: &str) -> Result<()> {
        if self.read_state().events.iter().any(|e| e.id == id) {
            return Err(PulseError::InvalidEvent(format!("event id {} already exists", id)));
        }
        Ok(())
    }

    /// Inserts or replaces a session record.
    pub fn put_session(&self, session: &Session) -> Result<()> {
        let _writer = lock(&self.writer);
        let txn = self.db.begin_write().map_err(store_err("failed to begin write"))?;
        write_json(&txn, SESSIONS_TABLE, &session.id, session)?;
        txn.commit().map_err(store_err("failed to commit session"))?;

        write_lock(&self.state)
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    pub fn session(&self, id: &str) -> Option<Session> {
        self.read_state().sessions.get(id).cloned()
    }

    /// All sessions, ordered by id.
    pub fn sessions(&self) -> Vec<Session> {
        self.read_state().sessions.values().cloned().collect()
    }

    /// Events inside `range`, relative to the store clock.
    pub fn query(&self, range: DateRange) -> Vec<UsageEvent> {
        let now = self.clock.now();
        self.read_state()
            .events
            .iter()
            .filter(|e| range.contains(e.timestamp, now))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.read_state().clone()
    }

    /// Current time according to the store clock.
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Recomputes all aggregates from the stored events.
    pub fn rebuild_aggregates(&self) -> Result<RebuildSummary> {
        let _writer = lock(&self.writer);
        let (aggregates, events) = {
            let state = self.read_state();
            (Aggregates::rebuild(&state.events), state.events.len())
        };
        self.write_aggregates(&aggregates)?;

        let summary = RebuildSummary {
            events,
            days: aggregates.daily.len(),
            tools: aggregates.tools.len(),
        };
        write_lock(&self.state).aggregates = aggregates;
        tracing::info!(events = summary.events, days = summary.days, tools = summary.tools, "aggregates rebuilt");
        Ok(summary)
    }

    /// Exports every table with its schema version as pretty JSON.
    pub fn export_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Section<'a, T: Serialize> {
            schema_version: u32,
            items: &'a T,
        }

        #[derive(Serialize)]
        struct Export<'a> {
            sessions: Section<'a, BTreeMap<String, Session>>,
            events: Section<'a, Vec<UsageEvent>>,
            daily_stats: Section<'a, BTreeMap<String, DailyAggregate>>,
            tool_stats: Section<'a, BTreeMap<String, ToolAggregate>>,
        }

        let state = self.read_state();
        let export = Export {
            sessions: Section { schema_version: STORE_SCHEMA_VERSION, items: &state.sessions },
            events: Section { schema_version: STORE_SCHEMA_VERSION, items: &state.events },
            daily_stats: Section { schema_version: STORE_SCHEMA_VERSION, items: &state.aggregates.daily },
            tool_stats: Section { schema_version: STORE_SCHEMA_VERSION, items: &state.aggregates.tools },
        };
        serde_json::to_string_pretty(&export).map_err(|e| PulseError::Serialization(e.to_string()))
    }

    pub fn sync_stats(&self) -> Option<SyncStats> {
        self.sync.as_ref().map(SyncQueue::stats)
    }

    fn updated_buckets(&self, event: &UsageEvent) -> (DailyAggregate, ToolAggregate) {
        let state = self.read_state();
        let mut daily = state
            .aggregates
            .daily
            .get(&event.date)
            .cloned()
            .unwrap_or_else(|| DailyAggregate::new(&event.date));
        let mut tool = state
            .aggregates
            .tools
            .get(&event.tool)
            .cloned()
            .unwrap_or_else(|| ToolAggregate::new(&event.tool, event.timestamp));
        daily.apply(event);
        tool.apply(event);
        (daily, tool)
    }

    fn publish(
        &self,
        event: &UsageEvent,
        daily: DailyAggregate,
        tool: ToolAggregate,
        session: Option<Session>,
    ) {
        let mut state = write_lock(&self.state);
        let at = state
            .events
            .partition_point(|e| (e.timestamp, e.id.as_str()) <= (event.timestamp, event.id.as_str()));
        state.events.insert(at, event.clone());
        state.aggregates.daily.insert(daily.date.clone(), daily);
        state.aggregates.tools.insert(tool.tool.clone(), tool);
        if let Some(session) = session {
            state.sessions.insert(session.id.clone(), session);
        }
    }

    fn forward(&self, event: &UsageEvent) {
        if let Some(sync) = &self.sync {
            sync.enqueue(event.clone());
        }
    }

    fn persist_aggregates(&self) -> Result<()> {
        let _writer = lock(&self.writer);
        let aggregates = self.read_state().aggregates.clone();
        self.write_aggregates(&aggregates)
    }

    fn write_aggregates(&self, aggregates: &Aggregates) -> Result<()> {
        let txn = self.db.begin_write().map_err(store_err("failed to begin write"))?;
        for table in [DAILY_TABLE, TOOL_TABLE] {
            txn.delete_table(table).map_err(store_err("failed to clear aggregates"))?;
        }
        for (date, daily) in &aggregates.daily {
            write_json(&txn, DAILY_TABLE, date, daily)?;
        }
        for (name, tool) in &aggregates.tools {
            write_json(&txn, TOOL_TABLE, name, tool)?;
        }
        txn.commit().map_err(store_err("failed to commit aggregates"))
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreSnapshot> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn store_err<E: std::fmt::Display>(context: &'static str) -> impl Fn(E) -> PulseError {
    move |e| PulseError::Store(format!("{}: {}", context, e))
}

fn failure_into_error(failure: Failure) -> PulseError {
    match failure {
        Failure::Fatal(e) => e,
        Failure::Corrupt(reason) => PulseError::Store(reason),
    }
}

fn classify_open_error(e: DatabaseError) -> Failure {
    match e {
        DatabaseError::DatabaseAlreadyOpen => {
            Failure::Fatal(PulseError::Store("event store is already open".to_string()))
        }
        DatabaseError::Storage(StorageError::Io(io))
            if !matches!(
                io.kind(),
                std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof
            ) =>
        {
            Failure::Fatal(PulseError::Io(io))
        }
        other => Failure::Corrupt(other.to_string()),
    }
}

fn backup_path(path: &Path, unix: i64) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    let mut candidate = path.with_file_name(format!("{}.corrupt-{}.bak", name, unix));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}.corrupt-{}-{}.bak", name, unix, n));
        n += 1;
    }
    candidate
}

fn write_json<T: Serialize + ?Sized>(
    txn: &redb::WriteTransaction,
    table: TableDefinition<&str, &[u8]>,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| PulseError::Serialization(e.to_string()))?;
    let mut table = txn.open_table(table).map_err(store_err("failed to open table"))?;
    table
        .insert(key, bytes.as_slice())
        .map_err(store_err("failed to insert row"))?;
    Ok(())
}

/// Creates missing tables and checks the schema version of existing ones.
fn init_schema(db: &Database) -> std::result::Result<(), Failure> {
    let txn = db
        .begin_write()
        .map_err(|e| Failure::Corrupt(format!("cannot begin write: {}", e)))?;
    {
        for table in [SESSIONS_TABLE, EVENTS_TABLE, DAILY_TABLE, TOOL_TABLE] {
            txn.open_table(table)
                .map_err(|e| Failure::Corrupt(format!("cannot open table: {}", e)))?;
        }
        let mut meta = txn
            .open_table(METADATA_TABLE)
            .map_err(|e| Failure::Corrupt(format!("cannot open metadata: {}", e)))?;
        for key in SCHEMA_KEYS {
            let existing = meta
                .get(key)
                .map_err(|e| Failure::Corrupt(format!("cannot read metadata: {}", e)))?
                .map(|v| v.value());
            match existing {
                Some(STORE_SCHEMA_VERSION) => {}
                Some(other) => {
                    return Err(Failure::Fatal(PulseError::Store(format!(
                        "table {} has schema version {}, expected {}",
                        key, other, STORE_SCHEMA_VERSION
                    ))))
                }
                None => {
                    meta.insert(key, STORE_SCHEMA_VERSION)
                        .map_err(|e| Failure::Corrupt(format!("cannot write metadata: {}", e)))?;
                }
            }
        }
    }
    txn.commit()
        .map_err(|e| Failure::Corrupt(format!("cannot commit schema: {}", e)))
}

fn load(db: &Database) -> std::result::Result<Loaded, Failure> {
    init_schema(db)?;
    let txn = db
        .begin_read()
        .map_err(|e| Failure::Corrupt(format!("cannot begin read: {}", e)))?;

    let events: Vec<UsageEvent> = read_rows(&txn, EVENTS_TABLE)?
        .into_iter()
        .map(|(key, bytes)| decode(&key, &bytes))
        .collect::<std::result::Result<_, _>>()
        .map_err(Failure::Corrupt)?;

    let sessions: BTreeMap<String, Session> = read_rows(&txn, SESSIONS_TABLE)?
        .into_iter()
        .map(|(key, bytes)| decode(&key, &bytes).map(|s| (key, s)))
        .collect::<std::result::Result<_, _>>()
        .map_err(Failure::Corrupt)?;

    let daily: std::result::Result<BTreeMap<String, DailyAggregate>, String> =
        read_rows(&txn, DAILY_TABLE)?
            .into_iter()
            .map(|(key, bytes)| decode(&key, &bytes).map(|d| (key, d)))
            .collect();
    let tools: std::result::Result<BTreeMap<String, ToolAggregate>, String> =
        read_rows(&txn, TOOL_TABLE)?
            .into_iter()
            .map(|(key, bytes)| decode(&key, &bytes).map(|t| (key, t)))
            .collect();

    let (aggregates, aggregates_rebuilt) = match (daily, tools) {
        (Ok(daily), Ok(tools)) => (Aggregates { daily, tools }, false),
        (daily, tools) => {
            let reason = daily.err().or(tools.err()).unwrap_or_default();
            tracing::debug!(reason = %reason, "undecodable aggregate row");
            (Aggregates::rebuild(&events), true)
        }
    };

    Ok(Loaded {
        snapshot: StoreSnapshot {
            events,
            aggregates,
            sessions,
        },
        aggregates_rebuilt,
    })
}

fn read_rows(
    txn: &redb::ReadTransaction,
    table: TableDefinition<&str, &[u8]>,
) -> std::result::Result<Vec<(String, Vec<u8>)>, Failure> {
    let table = txn
        .open_table(table)
        .map_err(|e| Failure::Corrupt(format!("cannot open table: {}", e)))?;
    let mut rows = Vec::new();
    for entry in table
        .iter()
        .map_err(|e| Failure::Corrupt(format!("cannot iterate table: {}", e)))?
    {
        let (key, value) = entry.map_err(|e| Failure::Corrupt(format!("cannot read row: {}", e)))?;
        rows.push((key.value().to_string(), value.value().to_vec()));
    }
    Ok(rows)
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> std::result::Result<T, String> {
    serde_json::from_slice(bytes).map_err(|e| format!("row {:?} is undecodable: {}", key, e))
}
