//! Outbound forwarding of usage events.
//!
//! Appends hand events to a bounded queue drained by one worker thread.
//! Enqueueing never blocks: a full queue drops the event. Failed deliveries
//! are retried with linear backoff, then dropped. Every drop is logged.

use crate::config::SyncConfig;
use crate::error::{PulseError, Result};
use crate::event::UsageEvent;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Destination for forwarded events.
pub trait Collector: Send + Sync {
    fn deliver(&self, event: &UsageEvent) -> Result<()>;
}

/// Appends events as JSON lines to a spool file under an exclusive lock.
#[derive(Debug, Clone)]
pub struct OutboxCollector {
    path: PathBuf,
}

impl OutboxCollector {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Collector for OutboxCollector {
    fn deliver(&self, event: &UsageEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line =
            serde_json::to_string(event).map_err(|e| PulseError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.lock_exclusive()?;
        let written = file.write_all(line.as_bytes()).and_then(|_| file.flush());
        let unlocked = FileExt::unlock(&file);
        written?;
        unlocked?;
        Ok(())
    }
}

/// Counters describing queue activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub dropped_full: u64,
    pub dropped_failed: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    dropped_full: AtomicU64,
    dropped_failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> SyncStats {
        SyncStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            dropped_failed: self.dropped_failed.load(Ordering::Relaxed),
        }
    }
}

/// Bounded queue with a single delivery worker.
pub struct SyncQueue {
    sender: Mutex<Option<SyncSender<UsageEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl SyncQueue {
    /// Spawns the worker thread.
    pub fn start(collector: Arc<dyn Collector>, config: &SyncConfig) -> Self {
        let (tx, rx) = mpsc::sync_channel(config.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);
        let max_retries = config.max_retries;
        let backoff = config.retry_backoff();

        let worker = thread::Builder::new()
            .name("devpulse-sync".to_string())
            .spawn(move || drain(rx, collector, worker_counters, max_retries, backoff))
            .map_err(|e| tracing::warn!(error = %e, "failed to spawn sync worker; events will be dropped"))
            .ok();

        Self {
            sender: Mutex::new(worker.as_ref().map(|_| tx)),
            worker: Mutex::new(worker),
            counters,
        }
    }

    /// Queues an event without blocking. Returns false if it was dropped.
    pub fn enqueue(&self, event: UsageEvent) -> bool {
        let guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(sender) = guard.as_ref() else {
            self.counters.dropped_full.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(event_id = %event.id, "sync queue closed; event dropped");
            return false;
        };

        match sender.try_send(event) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(event)) | Err(TrySendError::Disconnected(event)) => {
                let dropped = self.counters.dropped_full.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(event_id = %event.id, dropped_total = dropped, "sync queue full; event dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.counters.snapshot()
    }

    /// Closes the queue, waits for queued events to be delivered or dropped.
    pub fn shutdown(&self) -> SyncStats {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);

        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = worker {
            if handle.join().is_err() {
                tracing::warn!("sync worker panicked");
            }
        }
        self.stats()
    }
}

impl Drop for SyncQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn drain(
    rx: Receiver<UsageEvent>,
    collector: Arc<dyn Collector>,
    counters: Arc<Counters>,
    max_retries: u32,
    backoff: Duration,
) {
    for event in rx {
        let mut attempt = 0;
        loop {
            match collector.deliver(&event) {
                Ok(()) => {
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    tracing::debug!(event_id = %event.id, attempt, error = %e, "sync delivery failed; retrying");
                    thread::sleep(backoff * attempt);
                }
                Err(e) => {
                    counters.dropped_failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(event_id = %event.id, attempts = attempt + 1, error = %e, "sync delivery failed; event dropped");
                    break;
                }
            }
        }
    }
}
