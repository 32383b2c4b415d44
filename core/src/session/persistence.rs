//! Session Persistence
//!
//! Saves and restores the visible terminal conversation for one terminal id.
//!
//! # Features
//!
//! - **Best effort**: load and save never fail the caller; problems are logged
//! - **Autosave**: a background interval task, stopped by dropping its handle
//! - **Expiry**: records older than the configured maximum age are discarded
//! - **Teardown flush**: a final synchronous save when the session ends

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::snapshot::{self, Decoded, SessionSnapshot};
use super::store::SessionStore;
use crate::diagnostics::DiagnosticLog;
use crate::{diag_error, diag_info};

const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 3600);
const DEFAULT_HISTORY_CAP: usize = 50;
const MIN_AUTOSAVE_INTERVAL: Duration = Duration::from_millis(1);

struct Inner {
    store: Arc<dyn SessionStore>,
    terminal_id: String,
    session_id: Mutex<String>,
    max_age: Duration,
    history_cap: usize,
    diagnostics: Option<DiagnosticLog>,
    /// Held for the whole encode + write of one save
    write_lock: Mutex<()>,
    /// Set by the teardown flush; later autosaves are stale
    flushed: AtomicBool,
}

/// Cheaply clonable persistence handle for one terminal id
#[derive(Clone)]
pub struct PersistenceManager {
    inner: Arc<Inner>,
}

impl PersistenceManager {
    pub fn new(store: Arc<dyn SessionStore>, terminal_id: impl Into<String>) -> Self {
        Self::with_options(store, terminal_id, DEFAULT_MAX_AGE, DEFAULT_HISTORY_CAP, None)
    }

    pub fn with_options(
        store: Arc<dyn SessionStore>,
        terminal_id: impl Into<String>,
        max_age: Duration,
        history_cap: usize,
        diagnostics: Option<DiagnosticLog>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                terminal_id: terminal_id.into(),
                session_id: Mutex::new(new_session_id()),
                max_age,
                history_cap,
                diagnostics,
                write_lock: Mutex::new(()),
                flushed: AtomicBool::new(false),
            }),
        }
    }

    pub fn terminal_id(&self) -> &str {
        &self.inner.terminal_id
    }

    pub fn session_id(&self) -> String {
        self.inner.session_id.lock().clone()
    }

    /// Stored snapshot, if one exists, is readable and has not expired.
    /// Expired and unreadable records are removed.
    pub fn load(&self) -> Option<SessionSnapshot> {
        let payload = match self.inner.store.read(&self.inner.terminal_id) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                self.report_failure("load", &e.to_string());
                return None;
            }
        };

        match snapshot::decode(&payload, Utc::now(), self.inner.max_age, self.inner.history_cap) {
            Decoded::Restored {
                snapshot,
                session_id,
            } => {
                if let Some(id) = session_id {
                    *self.inner.session_id.lock() = id;
                }
                info!(
                    "[Persistence] Loaded session for {} ({} lines)",
                    self.inner.terminal_id,
                    snapshot.lines.len()
                );
                Some(snapshot)
            }
            Decoded::Expired => {
                info!("[Persistence] Discarding expired session for {}", self.inner.terminal_id);
                self.remove_record();
                None
            }
            Decoded::Invalid => {
                warn!("[Persistence] Discarding unreadable session for {}", self.inner.terminal_id);
                self.remove_record();
                None
            }
        }
    }

    /// Persist `snapshot`. Failures are logged, never returned.
    pub fn save(&self, snapshot: &SessionSnapshot) {
        let _guard = self.inner.write_lock.lock();
        self.write(snapshot);
    }

    /// Final synchronous save when the session goes away. Autosaves still
    /// running afterwards do not overwrite it.
    pub fn flush_on_teardown(&self, snapshot: &SessionSnapshot) {
        let _guard = self.inner.write_lock.lock();
        self.inner.flushed.store(true, Ordering::SeqCst);
        self.write(snapshot);
    }

    fn autosave(&self, snapshot: &SessionSnapshot) {
        let _guard = self.inner.write_lock.lock();
        if self.inner.flushed.load(Ordering::SeqCst) {
            debug!("[Persistence] Autosave after teardown skipped");
            return;
        }
        self.write(snapshot);
    }

    fn write(&self, snapshot: &SessionSnapshot) {
        let session_id = self.session_id();
        let result = snapshot::encode(snapshot, &session_id, Utc::now())
            .and_then(|payload| self.inner.store.write(&self.inner.terminal_id, &payload));
        match result {
            Ok(()) => debug!("[Persistence] Saved session {}", session_id),
            Err(e) => self.report_failure("save", &e.to_string()),
        }
    }

    /// Remove the stored record and start a fresh session id
    pub fn clear(&self) {
        self.remove_record();
        let id = new_session_id();
        if let Some(log) = &self.inner.diagnostics {
            diag_info!(log, "Session cleared; new session id {}", id);
        }
        *self.inner.session_id.lock() = id;
    }

    /// Save `get_snapshot()` every `interval` (at least 1 ms) until the
    /// handle is dropped. Ticks with nothing to save are skipped.
    pub fn schedule_autosave<F>(&self, get_snapshot: F, interval: Duration) -> AutosaveHandle
    where
        F: Fn() -> SessionSnapshot + Send + Sync + 'static,
    {
        let manager = self.clone();
        let interval = interval.max(MIN_AUTOSAVE_INTERVAL);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let snapshot = get_snapshot();
                if snapshot.is_empty() {
                    continue;
                }
                let manager = manager.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || manager.autosave(&snapshot)).await {
                    error!("[Persistence] Autosave task failed: {}", e);
                }
            }
        });
        AutosaveHandle { task: Some(task) }
    }

    fn remove_record(&self) {
        if let Err(e) = self.inner.store.remove(&self.inner.terminal_id) {
            self.report_failure("remove", &e.to_string());
        }
    }

    fn report_failure(&self, operation: &str, message: &str) {
        error!(
            "[Persistence] {} failed for {}: {}",
            operation, self.inner.terminal_id, message
        );
        if let Some(log) = &self.inner.diagnostics {
            diag_error!(log, "session {} failed: {}", operation, message);
        }
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Running autosave timer. Dropping the handle stops it.
pub struct AutosaveHandle {
    task: Option<JoinHandle<()>>,
}

impl AutosaveHandle {
    pub fn stop(mut self) {
        self.abort();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::{FileStore, MemoryStore};
    use crate::terminal::{LineContent, LineKind, TerminalLine};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snapshot_with(text: &str) -> SessionSnapshot {
        SessionSnapshot {
            lines: vec![TerminalLine {
                id: 1,
                kind: LineKind::Input,
                content: LineContent::Text(text.to_string()),
                created_at: Utc::now(),
            }],
            history: vec![text.trim_start_matches("> ").to_string()],
            input_draft: String::new(),
            scroll_offset: 0,
        }
    }

    fn manager(store: Arc<MemoryStore>) -> PersistenceManager {
        PersistenceManager::new(store, "apex-os-terminal")
    }

    #[test]
    fn test_save_then_load() {
        let store = Arc::new(MemoryStore::new());
        let pm = manager(store.clone());
        pm.save(&snapshot_with("> help"));

        let fresh = manager(store);
        let loaded = fresh.load().unwrap();
        assert_eq!(loaded.lines[0].text(), Some("> help"));
        assert_eq!(loaded.history, vec!["help"]);
        assert_eq!(fresh.session_id(), pm.session_id());
    }

    #[test]
    fn test_draft_only_record_is_restored() {
        let store = Arc::new(MemoryStore::new());
        let draft = SessionSnapshot {
            input_draft: "hel".to_string(),
            scroll_offset: 3,
            ..SessionSnapshot::default()
        };
        manager(store.clone()).save(&draft);

        let loaded = manager(store).load();
        assert_eq!(loaded, Some(draft));
    }

    #[test]
    fn test_nothing_stored() {
        let pm = manager(Arc::new(MemoryStore::new()));
        assert!(pm.load().is_none());
    }

    #[test]
    fn test_invalid_record_removed() {
        let store = Arc::new(MemoryStore::new());
        store.write("apex-os-terminal", "{{{").unwrap();
        let pm = manager(store.clone());
        assert!(pm.load().is_none());
        assert!(store.get("apex-os-terminal").is_none());
    }

    #[test]
    fn test_expired_record_ignored_and_removed() {
        let store = Arc::new(MemoryStore::new());
        let stale = chrono::Utc::now() - chrono::Duration::hours(30);
        let payload = snapshot::encode(&snapshot_with("> old"), "old", stale).unwrap();
        store.write("apex-os-terminal", &payload).unwrap();

        let pm = manager(store.clone());
        assert!(pm.load().is_none());
        assert!(store.get("apex-os-terminal").is_none());
    }

    #[test]
    fn test_save_failure_is_logged_not_raised() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes(true);
        let log = DiagnosticLog::new();
        let pm = PersistenceManager::with_options(
            store,
            "t",
            DEFAULT_MAX_AGE,
            DEFAULT_HISTORY_CAP,
            Some(log.clone()),
        );
        pm.save(&snapshot_with("> x"));
        assert_eq!(log.count_at(crate::diagnostics::Level::Error), 1);
    }

    #[test]
    fn test_clear_rotates_session_id() {
        let store = Arc::new(MemoryStore::new());
        let pm = manager(store.clone());
        pm.save(&snapshot_with("> x"));
        let before = pm.session_id();

        pm.clear();
        assert_ne!(pm.session_id(), before);
        assert!(store.get("apex-os-terminal").is_none());
    }

    #[test]
    fn test_file_backed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn SessionStore> = Arc::new(FileStore::new(dir.path()));
        let pm = PersistenceManager::new(store.clone(), "apex-os-terminal");
        pm.save(&snapshot_with("> vibe"));

        let loaded = PersistenceManager::new(store, "apex-os-terminal").load().unwrap();
        assert_eq!(loaded.history, vec!["vibe"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_skips_empty_and_stops_on_drop() {
        let store = Arc::new(MemoryStore::new());
        let pm = manager(store.clone());
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = ticks.clone();
        let handle = pm.schedule_autosave(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    SessionSnapshot::default()
                } else {
                    snapshot_with("> saved")
                }
            },
            Duration::from_secs(4),
        );

        tokio::time::sleep(Duration::from_millis(8_500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert!(store.get("apex-os-terminal").is_none());

        tokio::time::sleep(Duration::from_secs(4)).await;
        // Let the blocking save finish
        for _ in 0..10 {
            if store.get("apex-os-terminal").is_some() {
                break;
            }
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(store.get("apex-os-terminal").is_some());

        drop(handle);
        let seen = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_autosave_after_teardown_flush_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let pm = manager(store.clone());
        pm.flush_on_teardown(&snapshot_with("> final"));
        pm.autosave(&snapshot_with("> stale"));

        let loaded = manager(store).load().unwrap();
        assert_eq!(loaded.lines[0].text(), Some("> final"));
    }

    #[tokio::test]
    async fn test_zero_interval_still_autosaves() {
        let store = Arc::new(MemoryStore::new());
        let handle = manager(store.clone())
            .schedule_autosave(|| snapshot_with("> fast"), Duration::ZERO);

        for _ in 0..200 {
            if store.get("apex-os-terminal").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(handle.is_running());
        assert!(store.get("apex-os-terminal").is_some());
    }
}
