//! Polling sync cache.
//!
//! Keeps a client-side snapshot of the entry sequence fresh by asking an
//! [`EntrySource`] for the full list right away and then on a fixed
//! interval. There is no push channel; polling is the only mechanism.
//!
//! Rules:
//! - a successful poll replaces the snapshot wholesale
//! - a failed poll keeps the previous snapshot (stale-but-available)
//! - `loading` is true only until the first successful poll
//! - polls run one at a time on a single task, so results apply in the
//!   order they were requested
//!
//! Readers hold a [`SnapshotReader`], which is a thin wrapper around a
//! `tokio::sync::watch` receiver.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::model::Entry;
use crate::store::{SharedStore, StoreError};

/// Read side of the entry store, as seen by the cache.
pub trait EntrySource: Send + Sync {
    fn fetch_entries(&self) -> impl Future<Output = Result<Vec<Entry>, StoreError>> + Send;
}

impl EntrySource for SharedStore {
    async fn fetch_entries(&self) -> Result<Vec<Entry>, StoreError> {
        self.list().await
    }
}

/// Polling configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay between polls.
    pub interval: Duration,

    /// Bound on a single poll.
    pub poll_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            poll_timeout: Duration::from_secs(10),
        }
    }
}

/// The client's current view of the entry sequence.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Newest first, exactly as the source returned them.
    pub entries: Arc<Vec<Entry>>,

    /// Bumped every time `entries` is replaced with different content.
    pub revision: u64,

    /// When the last successful poll finished.
    pub fetched_at: Option<DateTime<Utc>>,

    /// True until the first successful poll.
    pub loading: bool,
}

impl ClientSnapshot {
    fn initial() -> Self {
        Self {
            entries: Arc::new(Vec::new()),
            revision: 0,
            fetched_at: None,
            loading: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Poll outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub successes: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Change-aware read handle on the snapshot.
#[derive(Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<ClientSnapshot>,
}

impl SnapshotReader {
    /// The latest snapshot. Never blocks on the network.
    pub fn current(&self) -> ClientSnapshot {
        self.rx.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.rx.borrow().loading
    }

    /// Whether a new snapshot arrived since the last `changed`.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the cache has been deactivated.
    pub async fn changed(&mut self) -> Option<ClientSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Owns the polling task. Polling stops on [`deactivate`](Self::deactivate)
/// or when the cache is dropped.
pub struct SyncCache {
    rx: watch::Receiver<ClientSnapshot>,
    counters: Arc<Counters>,
    task: Option<JoinHandle<()>>,
}

impl SyncCache {
    /// Start polling `source`. The first poll is issued immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn activate<S>(source: S, config: SyncConfig) -> Self
    where
        S: EntrySource + 'static,
    {
        let (tx, rx) = watch::channel(ClientSnapshot::initial());
        let counters = Arc::new(Counters::default());

        info!(
            interval = ?config.interval,
            poll_timeout = ?config.poll_timeout,
            "Sync cache activated"
        );

        let task = tokio::spawn(poll_loop(source, tx, config, Arc::clone(&counters)));

        Self {
            rx,
            counters,
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> SnapshotReader {
        SnapshotReader { rx: self.rx.clone() }
    }

    pub fn current(&self) -> ClientSnapshot {
        self.rx.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            successes: self.counters.successes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Stop polling and wait for the task to finish.
    ///
    /// No poll runs after this returns. The last snapshot stays readable.
    pub async fn deactivate(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            info!("Sync cache deactivated");
        }
    }
}

impl Drop for SyncCache {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn poll_loop<S: EntrySource>(
    source: S,
    tx: watch::Sender<ClientSnapshot>,
    config: SyncConfig,
    counters: Arc<Counters>,
) {
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match timeout(config.poll_timeout, source.fetch_entries()).await {
            Ok(Ok(entries)) => {
                counters.successes.fetch_add(1, Ordering::Relaxed);
                publish(&tx, entries);
            }
            Ok(Err(e)) => {
                counters.failures.fetch_add(1, Ordering::Relaxed);
                if e.is_transient() {
                    debug!(error = %e, "Poll failed, keeping previous snapshot");
                } else {
                    warn!(error = %e, "Poll rejected, keeping previous snapshot");
                }
            }
            Err(_) => {
                counters.failures.fetch_add(1, Ordering::Relaxed);
                debug!(timeout = ?config.poll_timeout, "Poll timed out, keeping previous snapshot");
            }
        }
    }
}

fn publish(tx: &watch::Sender<ClientSnapshot>, entries: Vec<Entry>) {
    tx.send_if_modified(|snapshot| {
        snapshot.fetched_at = Some(Utc::now());

        if !snapshot.loading && *snapshot.entries == entries {
            return false;
        }

        debug!(
            count = entries.len(),
            revision = snapshot.revision + 1,
            "Snapshot replaced"
        );
        snapshot.entries = Arc::new(entries);
        snapshot.revision += 1;
        snapshot.loading = false;
        true
    });
}
