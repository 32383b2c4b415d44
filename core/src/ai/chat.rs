//! Companion chat panel
//!
//! A second, simpler consumer of the router. It keeps its own transcript,
//! retries a failed query a fixed number of times and then answers from a
//! local pool of canned responses so the panel never goes silent.

use rand::seq::SliceRandom;
use std::sync::Arc;

use super::retry::FixedRetry;
use super::router::QueryRouter;
use super::{AiPreferences, ChatTurn, QueryOptions};
use crate::config::ChatConfig;
use crate::terminal::messages::companion;
use crate::terminal::sanitize;

const TRANSCRIPT_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    /// False when the answer came from the canned pool
    pub from_ai: bool,
}

pub struct ChatPanel {
    router: Arc<QueryRouter>,
    retry: FixedRetry,
    system_prompt: String,
    transcript: Vec<ChatTurn>,
}

impl ChatPanel {
    pub fn new(router: Arc<QueryRouter>, retry: FixedRetry, system_prompt: impl Into<String>) -> Self {
        Self {
            router,
            retry,
            system_prompt: system_prompt.into(),
            transcript: Vec::new(),
        }
    }

    pub fn from_config(router: Arc<QueryRouter>, config: &ChatConfig) -> Self {
        Self::new(
            router,
            FixedRetry::new(
                config.max_retries,
                std::time::Duration::from_millis(config.retry_delay_ms),
            ),
            config.system_prompt.clone(),
        )
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    /// Send one message. Returns `None` for input that sanitizes to nothing.
    pub async fn send(&mut self, raw: &str) -> Option<ChatReply> {
        let message = sanitize(raw)?;

        let skip = self.transcript.len().saturating_sub(TRANSCRIPT_WINDOW);
        let history: Vec<ChatTurn> = self.transcript[skip..].to_vec();
        let options = QueryOptions {
            system_prompt: self.system_prompt.clone(),
            preferences: AiPreferences::default(),
        };

        let router: &QueryRouter = &self.router;
        let (msg, hist, opts) = (message.as_str(), history.as_slice(), &options);
        let result = self
            .retry
            .run(move |_| router.try_query(msg, hist, opts))
            .await;

        let reply = match result {
            Ok(response) => ChatReply {
                text: response.content,
                from_ai: true,
            },
            Err(e) => {
                tracing::warn!("Chat panel falling back to canned answer: {}", e);
                ChatReply {
                    text: companion_fallback(&message),
                    from_ai: false,
                }
            }
        };

        self.transcript.push(ChatTurn::user(message));
        self.transcript.push(ChatTurn::assistant(reply.text.clone()));
        Some(reply)
    }
}

/// Pick a canned answer by keyword
pub fn companion_fallback(input: &str) -> String {
    let lower = input.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let pool = if has(&["help"]) {
        companion::HELP
    } else if has(&["quest", "mission", "objective"]) {
        companion::QUEST
    } else if has(&["tip", "trick"]) {
        companion::TIP
    } else if has(&["advice", "suggest"]) {
        companion::ADVICE
    } else if has(&["vibe", "philosophy", "wisdom"]) {
        companion::VIBE
    } else {
        companion::DEFAULT
    };

    pool.choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Keep pushing forward, Player One.")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::gateway::test_support::ScriptedBackend;
    use crate::ai::ProviderSlot;
    use crate::config::ModelClass;
    use std::time::Duration;

    fn panel(backend: Arc<ScriptedBackend>) -> ChatPanel {
        let router = QueryRouter::new(vec![ProviderSlot::new(
            "dm",
            "dm",
            ModelClass::Standard,
            backend,
        )]);
        ChatPanel::new(Arc::new(router), FixedRetry::default(), "dm prompt")
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_canned_fallback() {
        let backend = ScriptedBackend::failing();
        let mut panel = panel(backend.clone());

        let reply = panel.send("any quest for me?").await.unwrap();
        assert!(!reply.from_ai);
        assert!(companion::QUEST.contains(&reply.text.as_str()));
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_ai_answer_and_transcript() {
        let backend = ScriptedBackend::answering("greetings");
        let mut panel = panel(backend.clone());

        let reply = panel.send("hello").await.unwrap();
        assert_eq!(
            reply,
            ChatReply {
                text: "greetings".to_string(),
                from_ai: true
            }
        );
        panel.send("again").await.unwrap();

        let requests = backend.requests.lock();
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].system_prompt, "dm prompt");
        assert_eq!(panel.transcript().len(), 4);
    }

    #[tokio::test]
    async fn test_blank_input_ignored() {
        let backend = ScriptedBackend::answering("x");
        let mut panel = panel(backend.clone());
        assert!(panel.send("  \u{200B} ").await.is_none());
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn test_fallback_keywords() {
        assert!(companion::HELP.contains(&companion_fallback("HELP me").as_str()));
        assert!(companion::TIP.contains(&companion_fallback("got a trick?").as_str()));
        assert!(companion::ADVICE.contains(&companion_fallback("suggest something").as_str()));
        assert!(companion::VIBE.contains(&companion_fallback("wisdom pls").as_str()));
        assert!(companion::DEFAULT.contains(&companion_fallback("hmm").as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_providers_falls_back_without_waiting() {
        let mut panel = ChatPanel::new(
            Arc::new(QueryRouter::new(Vec::new())),
            FixedRetry::default(),
            "dm prompt",
        );
        let started = tokio::time::Instant::now();
        let reply = panel.send("hello").await.unwrap();
        assert!(!reply.from_ai);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_is_fixed() {
        let backend = ScriptedBackend::failing();
        let mut panel = panel(backend);
        let started = tokio::time::Instant::now();
        panel.send("anything").await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }
}
