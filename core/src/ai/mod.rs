//! AI query layer
//!
//! - `backend`: the per-provider HTTP contract
//! - `router`: ordered multi-tier fallback across provider slots
//! - `retry`: fixed-count retry used by the chat panel
//! - `idempotency`: short-lived admission cache for request keys
//! - `gateway`: what the terminal calls; glues the pieces above together
//! - `sync`: best-effort out-of-band notifications

pub mod backend;
pub mod chat;
pub mod gateway;
pub mod idempotency;
pub mod retry;
pub mod router;
pub mod sync;

pub use backend::{build_backend, AiBackend, BackendReply, BackendRequest};
pub use chat::{companion_fallback, ChatPanel, ChatReply};
pub use gateway::{AiGateway, GatewayReply};
pub use idempotency::{generate_request_key, IdempotencyCache};
pub use retry::FixedRetry;
pub use router::{is_complex_request, ProviderSlot, QueryRouter};
pub use sync::{HttpSyncNotifier, NoopSync, SyncNotifier};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::ModelClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of conversation history sent with a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Unified answer returned by the router
#[derive(Debug, Clone, PartialEq)]
pub struct AiResponse {
    pub content: String,
    pub provider: String,
    /// 1 for the first enabled slot, higher for fallbacks, 0 when synthetic
    pub tier: usize,
    pub model: String,
    pub latency: Duration,
}

impl AiResponse {
    pub fn is_offline(&self) -> bool {
        self.tier == 0
    }
}

/// Which provider family to try first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderPreference {
    #[default]
    Auto,
    Family(String),
}

impl ProviderPreference {
    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        if s.is_empty() || s == "auto" {
            Self::Auto
        } else {
            Self::Family(s)
        }
    }
}

impl fmt::Display for ProviderPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Family(name) => write!(f, "{}", name),
        }
    }
}

/// Which model class to try first within a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreference {
    #[default]
    Auto,
    Fast,
    Pro,
}

impl QualityPreference {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "fast" => Some(Self::Fast),
            "pro" => Some(Self::Pro),
            _ => None,
        }
    }

    /// Resolve `Auto` against the complexity of the request
    pub fn resolve(self, message: &str, history_len: usize) -> ModelClass {
        match self {
            Self::Fast => ModelClass::Fast,
            Self::Pro => ModelClass::Pro,
            Self::Auto if is_complex_request(message, history_len) => ModelClass::Pro,
            Self::Auto => ModelClass::Fast,
        }
    }
}

impl fmt::Display for QualityPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Fast => write!(f, "fast"),
            Self::Pro => write!(f, "pro"),
        }
    }
}

/// Routing preferences owned by a terminal session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AiPreferences {
    pub provider: ProviderPreference,
    pub quality: QualityPreference,
}

/// Everything the router needs for one query
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub system_prompt: String,
    pub preferences: AiPreferences,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_parsing() {
        assert_eq!(ProviderPreference::parse("AUTO"), ProviderPreference::Auto);
        assert_eq!(
            ProviderPreference::parse("Vertex"),
            ProviderPreference::Family("vertex".to_string())
        );
        assert_eq!(QualityPreference::parse("pro"), Some(QualityPreference::Pro));
        assert_eq!(QualityPreference::parse("turbo"), None);
    }

    #[test]
    fn test_quality_resolution() {
        assert_eq!(QualityPreference::Auto.resolve("hi", 0), ModelClass::Fast);
        assert_eq!(
            QualityPreference::Auto.resolve("please analyze this stack trace", 0),
            ModelClass::Pro
        );
        assert_eq!(QualityPreference::Fast.resolve(&"x".repeat(500), 10), ModelClass::Fast);
    }
}
