//! Session diagnostic log
//!
//! A bounded ring buffer of diagnostic records owned by one terminal
//! session. Every record is also forwarded to `tracing`, so the binary's
//! subscriber sees the same stream. The `logs` command reads from here.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Debug => write!(f, "DEBUG"),
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub module: String,
    pub message: String,
}

impl fmt::Display for DiagnosticEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.module,
            self.message
        )
    }
}

struct RingBuffer {
    entries: VecDeque<DiagnosticEntry>,
    max_entries: usize,
}

/// Cheaply clonable handle to a session's diagnostic ring buffer
#[derive(Clone)]
pub struct DiagnosticLog {
    inner: Arc<Mutex<RingBuffer>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            inner: Arc::new(Mutex::new(RingBuffer {
                entries: VecDeque::with_capacity(max_entries.min(DEFAULT_CAPACITY)),
                max_entries,
            })),
        }
    }

    pub fn record(&self, level: Level, module: &str, message: impl Into<String>) {
        let message = message.into();
        match level {
            Level::Debug => tracing::debug!(target: "apex_hud", module, "{}", message),
            Level::Info => tracing::info!(target: "apex_hud", module, "{}", message),
            Level::Warn => tracing::warn!(target: "apex_hud", module, "{}", message),
            Level::Error => tracing::error!(target: "apex_hud", module, "{}", message),
        }

        let entry = DiagnosticEntry {
            timestamp: Local::now(),
            level,
            module: module.to_string(),
            message,
        };

        let mut buffer = self.inner.lock();
        if buffer.entries.len() >= buffer.max_entries {
            buffer.entries.pop_front();
        }
        buffer.entries.push_back(entry);
    }

    /// Most recent `n` entries, newest first
    pub fn recent(&self, n: usize) -> Vec<DiagnosticEntry> {
        self.inner.lock().entries.iter().rev().take(n).cloned().collect()
    }

    pub fn count_at(&self, level: Level) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.level == level)
            .count()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}

#[macro_export]
macro_rules! diag_debug {
    ($log:expr, $($arg:tt)*) => {
        $log.record($crate::diagnostics::Level::Debug, module_path!(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! diag_info {
    ($log:expr, $($arg:tt)*) => {
        $log.record($crate::diagnostics::Level::Info, module_path!(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! diag_warn {
    ($log:expr, $($arg:tt)*) => {
        $log.record($crate::diagnostics::Level::Warn, module_path!(), format!($($arg)*))
    };
}

#[macro_export]
macro_rules! diag_error {
    ($log:expr, $($arg:tt)*) => {
        $log.record($crate::diagnostics::Level::Error, module_path!(), format!($($arg)*))
    };
}
