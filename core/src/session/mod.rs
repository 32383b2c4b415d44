//! Terminal sessions
//!
//! - `controller`: lifecycle of one interactive session
//! - `context`: the mutable state commands operate on
//! - `persistence`, `snapshot`, `store`: saving and restoring that state
//! - `watchdog`: the processing flag and its stuck-state recovery

pub mod context;
pub mod controller;
pub mod persistence;
pub mod snapshot;
pub mod store;
pub mod watchdog;

pub use context::SessionContext;
pub use controller::{Phase, SubmitOutcome, TerminalSession};
pub use persistence::{AutosaveHandle, PersistenceManager};
pub use snapshot::SessionSnapshot;
pub use store::{FileStore, MemoryStore, SessionStore};
pub use watchdog::ProcessingState;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::ai::gateway::test_support::{gateway_with, ScriptedBackend};
    use crate::commands::CommandRegistry;
    use crate::config::TerminalConfig;
    use crate::diagnostics::DiagnosticLog;
    use crate::events::EventBus;

    /// Context over a single scripted backend and an in-memory store
    pub fn context_with(backend: Arc<ScriptedBackend>) -> SessionContext {
        let events = EventBus::new();
        let diagnostics = DiagnosticLog::new();
        SessionContext::new(
            &TerminalConfig::default(),
            ProcessingState::new(Duration::from_secs(60), events.clone(), diagnostics.clone()),
            Arc::new(gateway_with(backend)),
            Arc::new(CommandRegistry::with_builtins()),
            events,
            diagnostics,
            PersistenceManager::new(Arc::new(MemoryStore::new()), "test-terminal"),
        )
    }

    /// Session over a single scripted backend and the given store
    pub fn session_with(backend: Arc<ScriptedBackend>, store: Arc<MemoryStore>) -> TerminalSession {
        TerminalSession::new(
            TerminalConfig::default(),
            Duration::from_secs(60),
            Arc::new(gateway_with(backend)),
            store,
        )
    }
}

#[cfg(test)]
mod tests;
