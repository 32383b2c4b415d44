//! Multi-tier query router
//!
//! Tries provider slots one after another until one answers. The order is
//! decided per query from the session's preferences:
//!
//! 1. slots of the preferred provider family first (if any);
//! 2. families otherwise keep their declared priority;
//! 3. inside a family, slots of the effective model class come first.
//!
//! Disabled slots are never attempted and do not count towards the tier.

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

use super::backend::{build_backend, AiBackend, BackendRequest};
use super::{AiResponse, ChatTurn, ProviderPreference, QueryOptions};
use crate::config::{ModelClass, ProviderSlotConfig};
use crate::error::{HudError, Result};
use crate::terminal::messages;

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

lazy_static! {
    static ref COMPLEX_HINT: Regex = Regex::new(
        r"(?i)\b(analy[sz]e|strategy|architecture|root cause|optimi|debug|plan|design|deep dive|spec)|```"
    )
    .unwrap();
}

/// Heuristic for routing `auto` quality to the pro model class
pub fn is_complex_request(message: &str, history_len: usize) -> bool {
    message.chars().count() > 240
        || message.lines().count() > 3
        || COMPLEX_HINT.is_match(message)
        || history_len > 6
}

pub struct ProviderSlot {
    pub name: String,
    pub family: String,
    pub class: ModelClass,
    pub model: String,
    pub priority: u32,
    pub timeout: Duration,
    pub probe_health: bool,
    pub enabled: bool,
    pub backend: Arc<dyn AiBackend>,
}

impl ProviderSlot {
    pub fn new(
        name: impl Into<String>,
        family: impl Into<String>,
        class: ModelClass,
        backend: Arc<dyn AiBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            class,
            model: String::new(),
            priority: 0,
            timeout: Duration::from_secs(20),
            probe_health: false,
            enabled: true,
            backend,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_health_probe(mut self, probe: bool) -> Self {
        self.probe_health = probe;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

pub struct QueryRouter {
    slots: Vec<ProviderSlot>,
}

impl QueryRouter {
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        Self { slots }
    }

    /// Build slots from configuration. Slots without an API key stay
    /// registered but disabled.
    pub fn from_config(configs: &[ProviderSlotConfig], client: reqwest::Client) -> Self {
        let slots = configs
            .iter()
            .map(|cfg| {
                let (backend, enabled) = match build_backend(cfg, client.clone()) {
                    Some(backend) => (backend, cfg.enabled),
                    None => (Arc::new(UnconfiguredBackend(cfg.name.clone())) as Arc<dyn AiBackend>, false),
                };
                let mut slot = ProviderSlot::new(&cfg.name, &cfg.family, cfg.class, backend)
                    .with_priority(cfg.priority)
                    .with_model(&cfg.model)
                    .with_timeout(cfg.timeout())
                    .with_health_probe(cfg.probe_health);
                slot.enabled = enabled;
                slot
            })
            .collect();
        Self::new(slots)
    }

    pub fn slots(&self) -> &[ProviderSlot] {
        &self.slots
    }

    /// Distinct provider families, in declaration order
    pub fn families(&self) -> Vec<String> {
        let mut families: Vec<String> = Vec::new();
        for slot in &self.slots {
            if !families.contains(&slot.family) {
                families.push(slot.family.clone());
            }
        }
        families
    }

    pub fn enabled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.enabled).count()
    }

    /// Enabled slots in the order they will be attempted
    pub fn attempt_order(
        &self,
        message: &str,
        history_len: usize,
        options: &QueryOptions,
    ) -> Vec<&ProviderSlot> {
        let class = options.preferences.quality.resolve(message, history_len);
        let preferred_family = match &options.preferences.provider {
            ProviderPreference::Auto => None,
            ProviderPreference::Family(name) => Some(name.as_str()),
        };

        let family_rank = |family: &str| -> u32 {
            self.slots
                .iter()
                .filter(|s| s.family == family)
                .map(|s| s.priority)
                .min()
                .unwrap_or(u32::MAX)
        };
        let class_rank = |c: ModelClass| -> u8 {
            if c == class {
                0
            } else if c == ModelClass::Standard {
                1
            } else {
                2
            }
        };

        let mut order: Vec<&ProviderSlot> = self.slots.iter().filter(|s| s.enabled).collect();
        order.sort_by(|a, b| {
            let a_pref = preferred_family != Some(a.family.as_str());
            let b_pref = preferred_family != Some(b.family.as_str());
            a_pref
                .cmp(&b_pref)
                .then_with(|| family_rank(&a.family).cmp(&family_rank(&b.family)))
                .then_with(|| a.family.cmp(&b.family))
                .then_with(|| class_rank(a.class).cmp(&class_rank(b.class)))
                .then_with(|| a.priority.cmp(&b.priority))
        });
        order
    }

    /// Attempt every enabled tier in order. Fails only if all of them fail.
    pub async fn try_query(
        &self,
        message: &str,
        history: &[ChatTurn],
        options: &QueryOptions,
    ) -> Result<AiResponse> {
        let order = self.attempt_order(message, history.len(), options);
        if order.is_empty() {
            return Err(HudError::AllProvidersExhausted {
                attempts: 0,
                last_error: "no AI providers are configured".to_string(),
            });
        }

        let mut last_error = String::new();
        for (index, slot) in order.iter().enumerate() {
            let tier = index + 1;
            let started = Instant::now();

            match self.attempt(slot, message, history, options).await {
                Ok(reply) => {
                    let latency = started.elapsed();
                    tracing::info!(
                        "AI answer from {} (tier {}, {}ms)",
                        slot.name,
                        tier,
                        latency.as_millis()
                    );
                    return Ok(AiResponse {
                        content: reply.content,
                        provider: slot.name.clone(),
                        tier,
                        model: if reply.model.is_empty() {
                            slot.model.clone()
                        } else {
                            reply.model
                        },
                        latency,
                    });
                }
                Err(e) => {
                    tracing::warn!("Provider {} failed (tier {}): {}", slot.name, tier, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(HudError::AllProvidersExhausted {
            attempts: order.len(),
            last_error,
        })
    }

    /// Like `try_query`, but total failure resolves to a synthetic tier-0
    /// answer instead of an error.
    pub async fn query(
        &self,
        message: &str,
        history: &[ChatTurn],
        options: &QueryOptions,
    ) -> AiResponse {
        match self.try_query(message, history, options).await {
            Ok(response) => response,
            Err(e) => {
                let status = match &e {
                    HudError::AllProvidersExhausted { last_error, .. } => last_error.clone(),
                    other => other.to_string(),
                };
                tracing::error!("All AI providers failed: {}", status);
                AiResponse {
                    content: messages::all_ai_offline(&status),
                    provider: "offline".to_string(),
                    tier: 0,
                    model: "fallback".to_string(),
                    latency: Duration::ZERO,
                }
            }
        }
    }

    async fn attempt(
        &self,
        slot: &ProviderSlot,
        message: &str,
        history: &[ChatTurn],
        options: &QueryOptions,
    ) -> Result<super::BackendReply> {
        if slot.probe_health {
            match timeout(HEALTH_PROBE_TIMEOUT, slot.backend.health_check()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(HudError::ProviderUnavailable {
                        provider: slot.name.clone(),
                        reason: "health probe timed out".to_string(),
                    })
                }
            }
        }

        let request = BackendRequest {
            message: message.to_string(),
            history: history.to_vec(),
            system_prompt: options.system_prompt.clone(),
            model: slot.model.clone(),
        };
        match timeout(slot.timeout, slot.backend.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(HudError::ProviderTimeout {
                provider: slot.name.clone(),
                duration: slot.timeout,
            }),
        }
    }
}

/// Placeholder for slots whose key is missing; never attempted
struct UnconfiguredBackend(String);

#[async_trait::async_trait]
impl AiBackend for UnconfiguredBackend {
    fn name(&self) -> &str {
        &self.0
    }

    async fn complete(&self, _request: &BackendRequest) -> Result<super::BackendReply> {
        Err(HudError::ProviderUnavailable {
            provider: self.0.clone(),
            reason: "API key not configured".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiPreferences, BackendReply, QualityPreference};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that fails or answers on a script and counts calls
    struct Scripted {
        name: String,
        fail: bool,
        healthy: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(name: &str) -> Arc<Self> {
            Arc::new(Self::inner(name))
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Self::inner(name)
            })
        }

        fn unhealthy(name: &str) -> Arc<Self> {
            Arc::new(Self {
                healthy: false,
                ..Self::inner(name)
            })
        }

        fn slow(name: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay: Some(delay),
                ..Self::inner(name)
            })
        }

        fn inner(name: &str) -> Self {
            Self {
                name: name.to_string(),
                fail: false,
                healthy: true,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AiBackend for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, request: &BackendRequest) -> Result<BackendReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(HudError::provider(&self.name, "503 unavailable"));
            }
            Ok(BackendReply {
                content: format!("{} says hi", self.name),
                model: request.model.clone(),
            })
        }

        async fn health_check(&self) -> Result<()> {
            if self.healthy {
                Ok(())
            } else {
                Err(HudError::ProviderUnavailable {
                    provider: self.name.clone(),
                    reason: "probe failed".to_string(),
                })
            }
        }
    }

    fn options(provider: ProviderPreference, quality: QualityPreference) -> QueryOptions {
        QueryOptions {
            system_prompt: "sys".to_string(),
            preferences: AiPreferences { provider, quality },
        }
    }

    fn auto() -> QueryOptions {
        options(ProviderPreference::Auto, QualityPreference::Auto)
    }

    fn names(order: &[&ProviderSlot]) -> Vec<String> {
        order.iter().map(|s| s.name.clone()).collect()
    }

    fn standard_router() -> QueryRouter {
        QueryRouter::new(vec![
            ProviderSlot::new("vertex-fast", "vertex", ModelClass::Fast, Scripted::ok("vf"))
                .with_priority(1),
            ProviderSlot::new("vertex-pro", "vertex", ModelClass::Pro, Scripted::ok("vp"))
                .with_priority(2),
            ProviderSlot::new("perplexity", "perplexity", ModelClass::Standard, Scripted::ok("px"))
                .with_priority(3),
            ProviderSlot::new("groq", "groq", ModelClass::Standard, Scripted::ok("gq"))
                .with_priority(4),
        ])
    }

    #[tokio::test]
    async fn test_fallback_reports_tier() {
        let a = Scripted::failing("a");
        let b = Scripted::failing("b");
        let c = Scripted::ok("c");
        let router = QueryRouter::new(vec![
            ProviderSlot::new("a", "a", ModelClass::Standard, a.clone()).with_priority(1),
            ProviderSlot::new("b", "b", ModelClass::Standard, b.clone()).with_priority(2),
            ProviderSlot::new("c", "c", ModelClass::Standard, c.clone()).with_priority(3),
        ]);

        let response = router.try_query("hello", &[], &auto()).await.unwrap();
        assert_eq!(response.tier, 3);
        assert_eq!(response.provider, "c");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        assert_eq!(c.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_slots_not_counted() {
        let skipped = Scripted::ok("skipped");
        let router = QueryRouter::new(vec![
            ProviderSlot::new("off", "x", ModelClass::Standard, skipped.clone())
                .with_priority(1)
                .disabled(),
            ProviderSlot::new("on", "y", ModelClass::Standard, Scripted::ok("on"))
                .with_priority(2),
        ]);
        let response = router.try_query("hello", &[], &auto()).await.unwrap();
        assert_eq!(response.tier, 1);
        assert_eq!(skipped.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_fail() {
        let router = QueryRouter::new(vec![
            ProviderSlot::new("a", "a", ModelClass::Standard, Scripted::failing("a")),
            ProviderSlot::new("b", "b", ModelClass::Standard, Scripted::failing("b")),
        ]);
        match router.try_query("hello", &[], &auto()).await {
            Err(HudError::AllProvidersExhausted { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected exhaustion, got {:?}", other),
        }

        let offline = router.query("hello", &[], &auto()).await;
        assert!(offline.is_offline());
        assert!(offline.content.contains("ALL_AI_OFFLINE"));
    }

    #[tokio::test]
    async fn test_no_slots_is_exhaustion() {
        let router = QueryRouter::new(Vec::new());
        assert!(matches!(
            router.try_query("hello", &[], &auto()).await,
            Err(HudError::AllProvidersExhausted { attempts: 0, .. })
        ));
    }

    #[test]
    fn test_auto_simple_prefers_fast() {
        let router = standard_router();
        let order = router.attempt_order("hi there", 0, &auto());
        assert_eq!(names(&order), vec!["vertex-fast", "vertex-pro", "perplexity", "groq"]);
    }

    #[test]
    fn test_auto_complex_prefers_pro() {
        let router = standard_router();
        let order = router.attempt_order("Analyze the architecture of my app", 0, &auto());
        assert_eq!(names(&order), vec!["vertex-pro", "vertex-fast", "perplexity", "groq"]);
    }

    #[test]
    fn test_family_preference_goes_first() {
        let router = standard_router();
        let opts = options(
            ProviderPreference::Family("perplexity".to_string()),
            QualityPreference::Fast,
        );
        let order = router.attempt_order("hi", 0, &opts);
        assert_eq!(names(&order), vec!["perplexity", "vertex-fast", "vertex-pro", "groq"]);
    }

    #[test]
    fn test_quality_override() {
        let router = standard_router();
        let opts = options(ProviderPreference::Auto, QualityPreference::Pro);
        let order = router.attempt_order("hi", 0, &opts);
        assert_eq!(order[0].name, "vertex-pro");
    }

    #[tokio::test]
    async fn test_failed_probe_counts_as_attempt() {
        let probed = Scripted::unhealthy("probed");
        let backup = Scripted::ok("backup");
        let router = QueryRouter::new(vec![
            ProviderSlot::new("probed", "p", ModelClass::Standard, probed.clone())
                .with_priority(1)
                .with_health_probe(true),
            ProviderSlot::new("backup", "b", ModelClass::Standard, backup).with_priority(2),
        ]);
        let response = router.try_query("hello", &[], &auto()).await.unwrap();
        assert_eq!(response.tier, 2);
        assert_eq!(probed.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_timeout_moves_on() {
        let slow = Scripted::slow("slow", Duration::from_secs(30));
        let router = QueryRouter::new(vec![
            ProviderSlot::new("slow", "s", ModelClass::Standard, slow)
                .with_priority(1)
                .with_timeout(Duration::from_secs(12)),
            ProviderSlot::new("fast", "f", ModelClass::Standard, Scripted::ok("fast"))
                .with_priority(2),
        ]);
        let response = router.try_query("hello", &[], &auto()).await.unwrap();
        assert_eq!(response.provider, "fast");
        assert_eq!(response.tier, 2);
    }

    #[test]
    fn test_complexity_heuristic() {
        assert!(!is_complex_request("hello", 0));
        assert!(is_complex_request(&"a".repeat(241), 0));
        assert!(is_complex_request("a\nb\nc\nd", 0));
        assert!(is_complex_request("```rust\nfn x() {}\n```", 0));
        assert!(is_complex_request("Help me Debug this", 0));
        assert!(is_complex_request("hi", 7));
    }
}
