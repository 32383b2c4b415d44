//! Mutable state of one terminal session, handed to command handlers

use std::sync::Arc;

use super::persistence::PersistenceManager;
use super::snapshot::SessionSnapshot;
use super::watchdog::ProcessingState;
use crate::ai::{generate_request_key, AiGateway, AiPreferences};
use crate::commands::CommandRegistry;
use crate::config::TerminalConfig;
use crate::diag_warn;
use crate::diagnostics::DiagnosticLog;
use crate::events::EventBus;
use crate::terminal::{CommandHistory, LineBuffer, LineContent, LineKind, TerminalLine};

pub struct SessionContext {
    pub lines: LineBuffer,
    pub history: CommandHistory,
    pub input_draft: String,
    pub scroll_offset: usize,
    pub preferences: AiPreferences,
    processing: ProcessingState,
    gateway: Arc<AiGateway>,
    registry: Arc<CommandRegistry>,
    events: EventBus,
    diagnostics: DiagnosticLog,
    persistence: PersistenceManager,
}

impl SessionContext {
    pub fn new(
        config: &TerminalConfig,
        processing: ProcessingState,
        gateway: Arc<AiGateway>,
        registry: Arc<CommandRegistry>,
        events: EventBus,
        diagnostics: DiagnosticLog,
        persistence: PersistenceManager,
    ) -> Self {
        Self {
            lines: LineBuffer::new(config.max_lines),
            history: CommandHistory::new(config.history_cap),
            input_draft: String::new(),
            scroll_offset: 0,
            preferences: AiPreferences::default(),
            processing,
            gateway,
            registry,
            events,
            diagnostics,
            persistence,
        }
    }

    pub fn processing(&self) -> &ProcessingState {
        &self.processing
    }

    pub fn gateway(&self) -> &Arc<AiGateway> {
        &self.gateway
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub(crate) fn set_registry(&mut self, registry: Arc<CommandRegistry>) {
        self.registry = registry;
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    pub fn add_line(&mut self, kind: LineKind, text: impl Into<String>) -> u64 {
        self.lines.push_text(kind, text)
    }

    pub fn add_widget(&mut self, kind: LineKind, widget: impl Into<String>) -> u64 {
        self.lines.push(kind, LineContent::Widget(widget.into()))
    }

    pub fn clear_lines(&mut self) {
        self.lines.clear();
        self.scroll_offset = 0;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            lines: self.lines.iter().cloned().collect(),
            history: self.history.entries(),
            input_draft: self.input_draft.clone(),
            scroll_offset: self.scroll_offset,
        }
    }

    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        self.lines.restore(snapshot.lines);
        self.history.restore(snapshot.history);
        self.input_draft = snapshot.input_draft;
        self.scroll_offset = snapshot.scroll_offset;
    }

    /// Send `message` through the gateway with the visible conversation as
    /// history. The echo of the current submission is not part of it.
    /// A request that is already in flight answers with a notice instead.
    pub async fn ask_ai(&self, message: &str) -> String {
        self.ask_ai_with_key(&generate_request_key(), message).await
    }

    pub(crate) async fn ask_ai_with_key(&self, key: &str, message: &str) -> String {
        let lines: Vec<&TerminalLine> = self.lines.iter().collect();
        let end = match lines.last() {
            Some(last) if last.kind == LineKind::Input => lines.len() - 1,
            _ => lines.len(),
        };
        let history = self.gateway.history_from_lines(lines[..end].iter().copied());

        let gateway = Arc::clone(&self.gateway);
        match gateway.ask_with_key(key, message, &history, &self.preferences).await {
            Ok(reply) => reply.text,
            Err(e) => {
                diag_warn!(self.diagnostics, "AI request not sent: {}", e);
                e.user_message()
            }
        }
    }
}
