//! Request admission cache
//!
//! A short-lived map from request key to first-seen instant. A key is
//! admitted once; it is forgotten after the TTL whether or not the request
//! succeeded.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// `{epoch_ms}-{9 base36}-{8 base36}`
pub fn generate_request_key() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{}-{}-{}", millis, random_base36(9), random_base36(8))
}

#[derive(Clone)]
pub struct IdempotencyCache {
    entries: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Admit `key` unless it is already present and unexpired.
    /// This is the only admission point.
    pub fn begin_if_absent(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, seen| now.duration_since(*seen) < self.ttl);
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), now);
        true
    }

    pub fn release(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .is_some_and(|seen| now.duration_since(*seen) < self.ttl)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove `key` once the TTL has elapsed. Must be called from within a
    /// tokio runtime.
    pub fn schedule_release(&self, key: String) {
        let entries = Arc::clone(&self.entries);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut entries = entries.lock();
            // A re-admission after a lazy purge gets its own timer
            if entries
                .get(&key)
                .is_some_and(|seen| seen.elapsed() >= ttl)
            {
                entries.remove(&key);
            }
        });
    }
}
