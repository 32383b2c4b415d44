//! Structured error types for the HUD terminal engine
//!
//! Every failure path in the engine ends in one of these variants. The
//! dispatcher and the AI gateway turn them into rendered terminal lines;
//! persistence failures only ever reach the diagnostic log.

use std::time::Duration;
use thiserror::Error;

/// Primary error type for the terminal engine
#[derive(Error, Debug)]
pub enum HudError {
    // =========================================================================
    // Input / Command Errors
    // =========================================================================
    /// Sanitizer rejected the raw text
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Arguments did not satisfy the command's declared contract
    #[error("Usage: {usage}")]
    Usage { usage: String },

    /// A registered handler failed
    #[error("{command}: {message}")]
    CommandExecution { command: String, message: String },

    // =========================================================================
    // AI Provider Errors
    // =========================================================================
    /// A single provider call failed
    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    /// A provider call exceeded its time budget
    #[error("{provider} timeout after {}ms", duration.as_millis())]
    ProviderTimeout { provider: String, duration: Duration },

    /// Provider is configured but cannot be used (missing key, failed probe)
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Every enabled tier failed
    #[error("all providers failed after {attempts} attempt(s): {last_error}")]
    AllProvidersExhausted { attempts: usize, last_error: String },

    /// Idempotency key already admitted
    #[error("request {key} is already being processed")]
    DuplicateInFlight { key: String },

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// Load or save of the session snapshot failed
    #[error("session {operation} failed: {message}")]
    PersistenceFailure { operation: &'static str, message: String },

    /// Processing flag outlived the watchdog ceiling
    #[error("processing stuck for {}s", after.as_secs())]
    StuckProcessing { after: Duration },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    // =========================================================================
    // External Error Wrappers
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl HudError {
    /// Shorthand for handler failures
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Shorthand for provider failures
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Check if error is transient. `FixedRetry` stops at the first error
    /// that is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { message, .. } => {
                let msg = message.to_lowercase();
                !(msg.contains("400")
                    || msg.contains("401")
                    || msg.contains("403")
                    || msg.contains("404")
                    || msg.contains("unauthorized"))
            }
            Self::ProviderTimeout { .. } => true,
            // Zero attempts means no provider is enabled at all
            Self::AllProvidersExhausted { attempts, .. } => *attempts > 0,
            Self::Http(_) => true,
            Self::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionRefused
            ),

            Self::InvalidInput { .. }
            | Self::Usage { .. }
            | Self::CommandExecution { .. }
            | Self::ProviderUnavailable { .. }
            | Self::DuplicateInFlight { .. }
            | Self::PersistenceFailure { .. }
            | Self::StuckProcessing { .. }
            | Self::InvalidConfig { .. }
            | Self::Json(_) => false,
        }
    }

    /// Message shown in the terminal for this error
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput { .. } => "Invalid input".to_string(),
            Self::Usage { usage } => format!("Usage: {}", usage),
            Self::CommandExecution { message, .. } => message.clone(),
            Self::DuplicateInFlight { .. } => crate::terminal::messages::ALREADY_PROCESSING.to_string(),
            Self::AllProvidersExhausted { last_error, .. } => last_error.clone(),
            _ => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for HudError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<reqwest::Error> for HudError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<toml::de::Error> for HudError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig {
            message: err.to_string(),
        }
    }
}

/// Result type alias using HudError
pub type Result<T> = std::result::Result<T, HudError>;
