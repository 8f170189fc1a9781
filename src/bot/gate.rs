// src/bot/gate.rs - Per-user mutual exclusion for message ingestion

use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Duration;

use crate::config::GateSettings;

/// Errors from user-lock acquisition. These are surfaced to the caller, never
/// swallowed: silently skipping a message would leave reward and AFK
/// bookkeeping inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("shutdown requested while waiting for user lock '{user_id}'")]
    ShutdownRequested { user_id: String },
}

/// One registry entry per user seen so far.
struct UserLockEntry {
    lock: Mutex<()>,
    last_acquired: RwLock<DateTime<Utc>>,
    /// Callers currently between lookup and acquisition; guards eviction.
    pending: AtomicUsize,
}

impl UserLockEntry {
    fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            last_acquired: RwLock::new(Utc::now()),
            pending: AtomicUsize::new(0),
        }
    }
}

/// Holds the pending-acquisition count on an entry. Dropping the guard
/// restores the count, so a caller cancelled at any await point (task abort,
/// caller-side timeout) never leaves the entry pinned against eviction.
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn new(pending: &'a AtomicUsize) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        Self(pending)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serializes message processing per user: for a fixed user id at most one
/// body runs at a time, while different users proceed fully in parallel.
/// This is what makes currency rewards, AFK transitions, and history appends
/// race-free without a central lock.
///
/// Owned and constructor-injected rather than a process-wide static, so tests
/// can run multiple isolated gates.
pub struct UserGate {
    entries: RwLock<HashMap<String, Arc<UserLockEntry>>>,
    settings: GateSettings,
    shutdown: broadcast::Sender<()>,
    closing: AtomicBool,
    locks_created: AtomicU64,
}

impl UserGate {
    pub fn new(settings: GateSettings) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            entries: RwLock::new(HashMap::new()),
            settings,
            shutdown,
            closing: AtomicBool::new(false),
            locks_created: AtomicU64::new(0),
        }
    }

    /// Run `body` while holding the user's exclusive lock.
    ///
    /// The lock is acquired asynchronously (other users are never blocked),
    /// `last_acquired` is refreshed, and the lock is released on every exit
    /// path via guard scoping. Waiting acquisitions are abandoned with a
    /// distinct error when shutdown is requested.
    pub async fn with_user_lock<F, Fut, T>(&self, user_id: &str, body: F) -> Result<T, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // Subscribe first, then check the flag: a shutdown landing between
        // the two is seen either by the check or by the receiver.
        let mut shutdown_rx = self.shutdown.subscribe();
        if self.closing.load(Ordering::SeqCst) {
            return Err(GateError::ShutdownRequested {
                user_id: user_id.to_string(),
            });
        }

        let entry = self.entry(user_id).await;
        let pending = PendingGuard::new(&entry.pending);

        let guard = tokio::select! {
            guard = entry.lock.lock() => guard,
            _ = shutdown_rx.recv() => {
                return Err(GateError::ShutdownRequested {
                    user_id: user_id.to_string(),
                });
            }
        };
        drop(pending);
        *entry.last_acquired.write().await = Utc::now();

        let out = body().await;
        drop(guard);
        Ok(out)
    }

    /// Atomic get-or-create of the user's entry.
    async fn entry(&self, user_id: &str) -> Arc<UserLockEntry> {
        {
            let map = self.entries.read().await;
            if let Some(entry) = map.get(user_id) {
                return Arc::clone(entry);
            }
        }
        let mut map = self.entries.write().await;
        let entry = map.entry(user_id.to_string()).or_insert_with(|| {
            self.locks_created.fetch_add(1, Ordering::Relaxed);
            Arc::new(UserLockEntry::new())
        });
        Arc::clone(entry)
    }

    /// Evict entries idle longer than the configured threshold.
    ///
    /// An entry is only removed when no caller is mid-acquisition (pending
    /// counter zero, no outstanding handle, `try_lock` succeeds). Returns the
    /// number of evicted entries.
    pub async fn sweep_idle_entries(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.settings.idle_evict_seconds);
        let mut map = self.entries.write().await;
        let before = map.len();
        map.retain(|_, entry| {
            if entry.pending.load(Ordering::SeqCst) > 0 {
                return true;
            }
            // A caller still holds a clone of the handle.
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            let _guard = match entry.lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => return true,
            };
            match entry.last_acquired.try_read() {
                Ok(last) => *last > cutoff,
                Err(_) => true,
            }
        });
        let evicted = before - map.len();
        if evicted > 0 {
            debug!("evicted {} idle user lock entries", evicted);
        }
        evicted
    }

    /// Spawn the periodic eviction sweep; exits on shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let gate = Arc::clone(self);
        // Subscribe before spawning; a broadcast receiver only sees sends
        // after its subscribe, and the closing flag covers anything earlier.
        let mut shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(gate.settings.sweep_interval_seconds));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if gate.closing.load(Ordering::SeqCst) {
                            break;
                        }
                        gate.sweep_idle_entries().await;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            info!("user gate sweeper stopped");
        })
    }

    /// Reject new acquisitions and abandon queued ones.
    pub fn shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        // No receivers just means nothing was waiting.
        let _ = self.shutdown.send(());
    }

    /// Number of entries currently in the registry.
    pub async fn registry_len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Total entries created since start (best-effort statistic).
    pub fn locks_created(&self) -> u64 {
        self.locks_created.load(Ordering::Relaxed)
    }
}
