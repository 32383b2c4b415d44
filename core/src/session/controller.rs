//! Terminal session controller
//!
//! Owns one [`SessionContext`] and drives its lifecycle:
//!
//! 1. `start()` restores the stored session or plays the boot intro
//! 2. `submit()` runs one input through sanitize and dispatch
//! 3. `teardown()` (or drop) stops background tasks and flushes state
//!
//! Background work (autosave, prewarm, event listening) reads a mirror of
//! the snapshot that is refreshed after every foreground mutation, so the
//! context itself is never shared.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::context::SessionContext;
use super::persistence::{AutosaveHandle, PersistenceManager};
use super::snapshot::SessionSnapshot;
use super::store::SessionStore;
use super::watchdog::ProcessingState;
use crate::ai::{AiGateway, AiPreferences};
use crate::commands::{dispatch, CommandRegistry};
use crate::config::{HudConfig, TerminalConfig};
use crate::diagnostics::DiagnosticLog;
use crate::events::{EventBus, HudEvent};
use crate::terminal::{messages, sanitize_or_reject, LineKind, TerminalLine};

const PREWARM_MESSAGE: &str = "handshake";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Booting,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was dispatched
    Accepted,
    /// A previous submission is still processing
    Busy,
    /// Input was empty or unusable
    Ignored,
    /// `start()` has not completed
    NotReady,
}

pub struct TerminalSession {
    ctx: SessionContext,
    phase: Phase,
    config: TerminalConfig,
    mirror: Arc<Mutex<SessionSnapshot>>,
    autosave: Option<AutosaveHandle>,
    listener: Option<JoinHandle<()>>,
    prewarmed: Arc<AtomicBool>,
    torn_down: bool,
}

impl TerminalSession {
    pub fn new(
        config: TerminalConfig,
        watchdog_ceiling: Duration,
        gateway: Arc<AiGateway>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let events = EventBus::new();
        let diagnostics = DiagnosticLog::new();
        let persistence = PersistenceManager::with_options(
            store,
            config.terminal_id.clone(),
            config.session_max_age(),
            config.history_cap,
            Some(diagnostics.clone()),
        );
        let processing = ProcessingState::new(watchdog_ceiling, events.clone(), diagnostics.clone());
        let ctx = SessionContext::new(
            &config,
            processing,
            gateway,
            Arc::new(CommandRegistry::with_builtins()),
            events,
            diagnostics,
            persistence,
        );

        Self {
            ctx,
            phase: Phase::Booting,
            config,
            mirror: Arc::new(Mutex::new(SessionSnapshot::default())),
            autosave: None,
            listener: None,
            prewarmed: Arc::new(AtomicBool::new(false)),
            torn_down: false,
        }
    }

    /// Session wired from a full configuration with HTTP provider backends
    pub fn from_config(config: &HudConfig, store: Arc<dyn SessionStore>, client: reqwest::Client) -> Self {
        let gateway = Arc::new(AiGateway::from_config(&config.ai, client));
        Self::new(
            config.terminal.clone(),
            config.ai.watchdog_ceiling(),
            gateway,
            store,
        )
    }

    /// Replace the command set. Only meaningful before `start()`.
    pub fn with_registry(mut self, registry: CommandRegistry) -> Self {
        self.ctx.set_registry(Arc::new(registry));
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn events(&self) -> &EventBus {
        self.ctx.events()
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        self.ctx.diagnostics()
    }

    pub fn is_processing(&self) -> bool {
        self.ctx.processing().is_processing()
    }

    /// Lines as they should be shown
    pub fn visible_lines(&self) -> Vec<&TerminalLine> {
        self.ctx.lines.visible()
    }

    pub fn draft(&self) -> &str {
        &self.ctx.input_draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.ctx.input_draft = text.into();
        self.ctx.history.reset_navigation();
        self.sync_mirror();
    }

    /// Lines scrolled back from the newest one
    pub fn scroll_offset(&self) -> usize {
        self.ctx.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: usize) {
        self.ctx.scroll_offset = offset;
        self.sync_mirror();
    }

    /// Restore or boot, then start autosave and event handling
    pub async fn start(&mut self) {
        if self.phase == Phase::Ready || self.torn_down {
            return;
        }

        match self.ctx.persistence().load() {
            Some(snapshot) => {
                let restored = snapshot.lines.len();
                self.ctx.restore(snapshot);
                self.ctx.add_line(LineKind::System, messages::SESSION_RESTORED);
                info!("Restored session with {} lines", restored);
                self.ctx
                    .events()
                    .publish(HudEvent::SessionRestored { lines: restored });
            }
            None => {
                tokio::time::sleep(self.config.boot_delay()).await;
                if !self.ctx.lines.has_branding() {
                    self.ctx.add_widget(LineKind::Branding, messages::BRANDING_WIDGET);
                }
                debug!("Boot sequence complete");
                self.ctx.events().publish(HudEvent::BootCompleted);
            }
        }

        self.phase = Phase::Ready;
        self.sync_mirror();

        let mirror = Arc::clone(&self.mirror);
        self.autosave = Some(
            self.ctx
                .persistence()
                .schedule_autosave(move || mirror.lock().clone(), self.config.autosave_interval()),
        );
        self.listener = Some(self.spawn_listener());
    }

    /// Run one raw input through the pipeline
    pub async fn submit(&mut self, raw: &str) -> SubmitOutcome {
        if self.phase != Phase::Ready {
            return SubmitOutcome::NotReady;
        }
        if self.is_processing() {
            debug!("Submission refused while processing");
            return SubmitOutcome::Busy;
        }
        if raw.trim().is_empty() {
            return SubmitOutcome::Ignored;
        }

        let input = match sanitize_or_reject(raw) {
            Ok(input) => input,
            Err(err) => {
                debug!("Submission rejected: {}", err);
                self.ctx.add_line(LineKind::Error, err.user_message());
                self.sync_mirror();
                return SubmitOutcome::Ignored;
            }
        };

        self.ctx.input_draft.clear();
        self.ctx.scroll_offset = 0;
        dispatch(&input, &mut self.ctx).await;
        self.sync_mirror();
        SubmitOutcome::Accepted
    }

    /// Older history entry into the draft
    pub fn history_up(&mut self) -> Option<String> {
        let draft = self.ctx.input_draft.clone();
        let entry = self.ctx.history.up(&draft)?;
        self.ctx.input_draft = entry.clone();
        self.sync_mirror();
        Some(entry)
    }

    /// Newer history entry, or the original draft past the newest
    pub fn history_down(&mut self) -> Option<String> {
        let entry = self.ctx.history.down()?;
        self.ctx.input_draft = entry.clone();
        self.sync_mirror();
        Some(entry)
    }

    /// Complete the draft against command names. A unique match replaces
    /// the draft; several matches are listed as a system line.
    pub fn complete_input(&mut self) -> Option<String> {
        let prefix = self.ctx.input_draft.trim_start().to_lowercase();
        if prefix.is_empty() || prefix.contains(char::is_whitespace) {
            return None;
        }

        let registry = Arc::clone(self.ctx.registry());
        let matches = registry.complete(&prefix);
        match matches.as_slice() {
            [] => None,
            [only] => {
                self.ctx.input_draft = only.to_string();
                self.sync_mirror();
                Some(only.to_string())
            }
            several => {
                self.ctx.add_line(LineKind::System, several.join("  "));
                self.sync_mirror();
                None
            }
        }
    }

    /// One background handshake query. Later calls do nothing.
    pub fn prewarm(&self) {
        spawn_prewarm(
            Arc::clone(self.ctx.gateway()),
            Arc::clone(&self.prewarmed),
            self.ctx.preferences.clone(),
        );
    }

    /// Stop background tasks and flush the snapshot. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(autosave) = self.autosave.take() {
            autosave.stop();
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.ctx.processing().set(false);

        // Never started: the stored record is still authoritative
        if self.phase != Phase::Ready {
            return;
        }
        let snapshot = self.ctx.snapshot();
        self.ctx.persistence().flush_on_teardown(&snapshot);
    }

    fn sync_mirror(&self) {
        *self.mirror.lock() = self.ctx.snapshot();
    }

    fn spawn_listener(&self) -> JoinHandle<()> {
        let mut rx = self.ctx.events().subscribe();
        let gateway = Arc::clone(self.ctx.gateway());
        let prewarmed = Arc::clone(&self.prewarmed);
        let preferences = self.ctx.preferences.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(HudEvent::PrewarmRequested) => {
                        spawn_prewarm(Arc::clone(&gateway), Arc::clone(&prewarmed), preferences.clone())
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Session listener skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn spawn_prewarm(gateway: Arc<AiGateway>, prewarmed: Arc<AtomicBool>, preferences: AiPreferences) {
    if prewarmed.swap(true, Ordering::SeqCst) {
        return;
    }
    tokio::spawn(async move {
        match gateway.ask(PREWARM_MESSAGE, &[], &preferences).await {
            Ok(reply) if reply.response.is_offline() => {
                warn!("Prewarm found no provider online: {}", reply.response.content)
            }
            Ok(reply) => info!(
                "Prewarmed {} (tier {}) in {}ms",
                reply.response.provider,
                reply.response.tier,
                reply.response.latency.as_millis()
            ),
            Err(e) => warn!("Prewarm failed: {}", e),
        }
    });
}
