//! Processing flag with a watchdog
//!
//! Setting the flag arms a single timer; any further toggle disarms it and
//! (when set again) re-arms it. If the timer fires while the flag is still
//! set, the flag is forced back to false, one warning is recorded and
//! `ProcessingChanged(false)` is published. The in-flight work itself keeps
//! running; only the flag is reset.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::diag_warn;
use crate::diagnostics::DiagnosticLog;
use crate::error::HudError;
use crate::events::{EventBus, HudEvent};
use crate::terminal::messages;

struct Inner {
    flag: AtomicBool,
    ceiling: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    events: EventBus,
    diagnostics: DiagnosticLog,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

#[derive(Clone)]
pub struct ProcessingState {
    inner: Arc<Inner>,
}

impl ProcessingState {
    pub fn new(ceiling: Duration, events: EventBus, diagnostics: DiagnosticLog) -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                ceiling,
                timer: Mutex::new(None),
                events,
                diagnostics,
            }),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    pub fn ceiling(&self) -> Duration {
        self.inner.ceiling
    }

    pub fn set(&self, processing: bool) {
        let previous = self.inner.flag.swap(processing, Ordering::SeqCst);

        {
            let mut timer = self.inner.timer.lock();
            if let Some(old) = timer.take() {
                old.abort();
            }
            if processing {
                *timer = self.arm();
            }
        }

        if previous != processing {
            self.inner.events.publish(HudEvent::ProcessingChanged(processing));
        }
    }

    fn arm(&self) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No tokio runtime; processing watchdog not armed");
                return None;
            }
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let ceiling = self.inner.ceiling;

        Some(handle.spawn(async move {
            tokio::time::sleep(ceiling).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.flag.swap(false, Ordering::SeqCst) {
                let err = HudError::StuckProcessing { after: ceiling };
                diag_warn!(inner.diagnostics, "{} ({})", messages::STUCK_PROCESSING, err);
                inner.events.publish(HudEvent::ProcessingChanged(false));
            }
        }))
    }
}
