//! Terminal primitives: lines, history, input cleanup and text formatting

pub mod format;
pub mod history;
pub mod line;
pub mod messages;
pub mod sanitize;

pub use format::markdown_to_terminal;
pub use history::CommandHistory;
pub use line::{LineBuffer, LineContent, LineKind, TerminalLine};
pub use sanitize::{sanitize, sanitize_or_reject, MESSAGE_MAX_CHARS};
