//! Terminal commands
//!
//! A command is a named handler with a declared argument contract. The
//! registry is filled once at session construction and shared read-only
//! afterwards; anything the registry does not know is handed to the AI by
//! the dispatcher.

pub mod builtin;
pub mod dispatch;

pub use dispatch::dispatch;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::session::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CommandCategory {
    Ai,
    Session,
    System,
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandCategory::Ai => write!(f, "AI ASSISTANCE"),
            CommandCategory::Session => write!(f, "SESSION"),
            CommandCategory::System => write!(f, "SYSTEM"),
        }
    }
}

/// What a command accepts after its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSpec {
    /// No arguments
    None,
    /// Anything, including nothing
    Optional,
    /// At least one argument
    Required,
    /// Nothing, or exactly one of the listed words (case-insensitive)
    Choice(&'static [&'static str]),
}

impl ArgSpec {
    pub fn accepts(&self, args: &[String]) -> bool {
        match self {
            ArgSpec::None => args.is_empty(),
            ArgSpec::Optional => true,
            ArgSpec::Required => !args.is_empty(),
            ArgSpec::Choice(words) => match args {
                [] => true,
                [one] => words.iter().any(|w| w.eq_ignore_ascii_case(one)),
                _ => false,
            },
        }
    }
}

/// A terminal command.
///
/// Handlers write their output to the context as lines. Returning an error
/// makes the dispatcher render a single error line; handlers should not
/// render their own failures.
#[async_trait]
pub trait Command: Send + Sync {
    /// Lower-case name typed by the user
    fn name(&self) -> &str;

    /// One-line description shown by `help`
    fn description(&self) -> &str;

    /// Synopsis, e.g. `ask <question>`
    fn usage(&self) -> &str;

    fn category(&self) -> CommandCategory {
        CommandCategory::System
    }

    fn args(&self) -> ArgSpec {
        ArgSpec::None
    }

    async fn run(&self, ctx: &mut SessionContext, args: &[String]) -> Result<()>;
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Add a command. A later registration under the same name replaces the
    /// earlier one.
    pub fn register<C: Command + 'static>(&mut self, command: C) {
        let name = command.name().to_lowercase();
        if self.commands.insert(name.clone(), Arc::new(command)).is_some() {
            tracing::debug!("Command '{}' re-registered", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_lowercase())
    }

    /// Names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn commands(&self) -> impl Iterator<Item = &Arc<dyn Command>> {
        self.commands.values()
    }

    /// Names starting with `prefix`
    pub fn complete(&self, prefix: &str) -> Vec<&str> {
        let prefix = prefix.to_lowercase();
        self.commands
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
