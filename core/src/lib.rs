pub mod ai;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod session;
pub mod terminal;

// Re-exports for convenience
pub use ai::{AiGateway, ChatPanel, QueryRouter};
pub use commands::{Command, CommandRegistry};
pub use config::HudConfig;
pub use diagnostics::DiagnosticLog;
pub use error::{HudError, Result};
pub use events::{EventBus, HudEvent};
pub use session::{FileStore, MemoryStore, SessionStore, SubmitOutcome, TerminalSession};
