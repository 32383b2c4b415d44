//! AI gateway
//!
//! The single call site the terminal uses for AI queries. Each call is
//! admitted through the idempotency cache, bounded by the request timeout,
//! routed across provider tiers and annotated for display. Successful
//! answers are also pushed to the sync notifier in the background.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::idempotency::{generate_request_key, IdempotencyCache};
use super::router::QueryRouter;
use super::sync::{HttpSyncNotifier, NoopSync, SyncNotifier, SyncPayload};
use super::{AiPreferences, AiResponse, ChatTurn, QueryOptions};
use crate::config::AiConfig;
use crate::error::{HudError, Result};
use crate::terminal::{messages, LineKind, TerminalLine};

/// Text ready for the terminal plus the response it came from
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub text: String,
    pub response: AiResponse,
}

pub struct AiGateway {
    router: Arc<QueryRouter>,
    cache: IdempotencyCache,
    sync: Arc<dyn SyncNotifier>,
    system_prompt: String,
    request_timeout: Duration,
    history_window: usize,
}

impl AiGateway {
    pub fn new(
        router: Arc<QueryRouter>,
        cache: IdempotencyCache,
        sync: Arc<dyn SyncNotifier>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            router,
            cache,
            sync,
            system_prompt: system_prompt.into(),
            request_timeout: Duration::from_secs(45),
            history_window: 10,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Wire router, cache and sync notifier from the `[ai]` section
    pub fn from_config(config: &AiConfig, client: reqwest::Client) -> Self {
        let router = Arc::new(QueryRouter::from_config(&config.providers, client.clone()));
        let sync: Arc<dyn SyncNotifier> = match &config.sync_url {
            Some(url) if !url.trim().is_empty() => Arc::new(HttpSyncNotifier::new(url.trim(), client)),
            _ => Arc::new(NoopSync),
        };
        Self::new(
            router,
            IdempotencyCache::new(config.idempotency_ttl()),
            sync,
            config.system_prompt.clone(),
        )
        .with_request_timeout(config.request_timeout())
        .with_history_window(config.history_window)
    }

    pub fn router(&self) -> &Arc<QueryRouter> {
        &self.router
    }

    pub fn cache(&self) -> &IdempotencyCache {
        &self.cache
    }

    /// Conversation history for a query: the last `history_window`
    /// input/ai lines, with the `> ` echo prefix stripped from input.
    pub fn history_from_lines<'a>(
        &self,
        lines: impl Iterator<Item = &'a TerminalLine>,
    ) -> Vec<ChatTurn> {
        let relevant: Vec<&TerminalLine> = lines
            .filter(|l| matches!(l.kind, LineKind::Input | LineKind::Ai))
            .collect();
        let skip = relevant.len().saturating_sub(self.history_window);
        relevant
            .into_iter()
            .skip(skip)
            .filter_map(|line| {
                let text = line.text()?;
                Some(match line.kind {
                    LineKind::Input => ChatTurn::user(text.strip_prefix("> ").unwrap_or(text)),
                    _ => ChatTurn::assistant(text),
                })
            })
            .collect()
    }

    pub async fn ask(
        &self,
        message: &str,
        history: &[ChatTurn],
        preferences: &AiPreferences,
    ) -> Result<GatewayReply> {
        self.ask_with_key(&generate_request_key(), message, history, preferences)
            .await
    }

    /// Fails only with `DuplicateInFlight`; provider failures and timeouts
    /// come back as synthetic tier-0 replies.
    pub async fn ask_with_key(
        &self,
        key: &str,
        message: &str,
        history: &[ChatTurn],
        preferences: &AiPreferences,
    ) -> Result<GatewayReply> {
        if !self.cache.begin_if_absent(key) {
            tracing::warn!("Duplicate AI request {} rejected", key);
            return Err(HudError::DuplicateInFlight {
                key: key.to_string(),
            });
        }
        self.cache.schedule_release(key.to_string());

        let options = QueryOptions {
            system_prompt: self.system_prompt.clone(),
            preferences: preferences.clone(),
        };

        let response =
            match timeout(self.request_timeout, self.router.query(message, history, &options)).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(
                        "AI request {} timed out after {}s",
                        key,
                        self.request_timeout.as_secs()
                    );
                    AiResponse {
                        content: messages::request_timeout(self.request_timeout.as_secs()),
                        provider: "timeout".to_string(),
                        tier: 0,
                        model: "error-handler".to_string(),
                        latency: self.request_timeout,
                    }
                }
            };

        if !response.is_offline() {
            self.notify_sync(&response);
        }

        Ok(GatewayReply {
            text: display_text(&response),
            response,
        })
    }

    fn notify_sync(&self, response: &AiResponse) {
        let sync = Arc::clone(&self.sync);
        let payload = SyncPayload {
            terminal_log: response.content.clone(),
            provider: response.provider.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = sync.notify(&payload).await {
                tracing::warn!("Sync notification failed: {}", e);
            }
        });
    }
}

fn display_text(response: &AiResponse) -> String {
    let content = if response.content.trim().is_empty() {
        messages::HANDSHAKE_COMPLETE
    } else {
        response.content.as_str()
    };
    if response.tier > 1 {
        format!("{}{}", messages::tier_prefix(&response.provider, response.tier), content)
    } else {
        content.to_string()
    }
}
