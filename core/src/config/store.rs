//! Configuration Store
//!
//! Loading and saving of the `apex-hud` TOML config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HudError, Result};

/// Unified HUD configuration
///
/// Every section is optional in the file; missing keys fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HudConfig {
    #[serde(default)]
    pub terminal: TerminalConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

/// Line buffer, history and persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Persistence key; one stored snapshot per id
    #[serde(default = "default_terminal_id")]
    pub terminal_id: String,

    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    #[serde(default = "default_autosave_ms")]
    pub autosave_interval_ms: u64,

    /// Snapshots older than this are discarded on load
    #[serde(default = "default_max_age_hours")]
    pub session_max_age_hours: u64,

    #[serde(default = "default_boot_delay_ms")]
    pub boot_delay_ms: u64,

    /// Send one background handshake when an interactive session opens
    #[serde(default = "default_true")]
    pub prewarm_on_start: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            terminal_id: default_terminal_id(),
            max_lines: default_max_lines(),
            history_cap: default_history_cap(),
            autosave_interval_ms: default_autosave_ms(),
            session_max_age_hours: default_max_age_hours(),
            boot_delay_ms: default_boot_delay_ms(),
            prewarm_on_start: true,
        }
    }
}

impl TerminalConfig {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_hours * 3600)
    }

    pub fn boot_delay(&self) -> Duration {
        Duration::from_millis(self.boot_delay_ms)
    }
}

/// AI routing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_idempotency_ttl")]
    pub idempotency_ttl_secs: u64,

    /// Ceiling for the processing watchdog
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,

    /// Bound on one routed call, all tiers included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Number of recent input/ai lines sent as conversation history
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Endpoint receiving best-effort sync notifications
    #[serde(default)]
    pub sync_url: Option<String>,

    #[serde(default = "default_provider_slots")]
    pub providers: Vec<ProviderSlotConfig>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            idempotency_ttl_secs: default_idempotency_ttl(),
            watchdog_secs: default_watchdog_secs(),
            request_timeout_secs: default_request_timeout(),
            history_window: default_history_window(),
            sync_url: None,
            providers: default_provider_slots(),
        }
    }
}

impl AiConfig {
    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }

    pub fn watchdog_ceiling(&self) -> Duration {
        Duration::from_secs(self.watchdog_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Wire protocol spoken by a provider slot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `/chat/completions` style endpoints
    OpenAi,
    /// `generateContent` endpoints
    Gemini,
}

/// Model class of a slot, matched against the quality preference
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    Fast,
    Pro,
    #[default]
    Standard,
}

/// One `[[ai.providers]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSlotConfig {
    pub name: String,

    /// Grouping used by the provider preference (e.g. "vertex")
    pub family: String,

    #[serde(default)]
    pub class: ModelClass,

    pub kind: BackendKind,

    pub base_url: String,

    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Lower runs earlier when no preference applies
    #[serde(default)]
    pub priority: u32,

    #[serde(default = "default_slot_timeout")]
    pub timeout_secs: u64,

    /// Probe the provider before each call
    #[serde(default)]
    pub probe_health: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderSlotConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// API key from the environment, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Companion chat panel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_retries")]
    pub max_retries: u32,

    #[serde(default = "default_chat_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_chat_prompt")]
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_retries: default_chat_retries(),
            retry_delay_ms: default_chat_delay_ms(),
            system_prompt: default_chat_prompt(),
        }
    }
}

fn default_terminal_id() -> String {
    "apex-os-terminal".to_string()
}

fn default_max_lines() -> usize {
    100
}

fn default_history_cap() -> usize {
    50
}

fn default_autosave_ms() -> u64 {
    4000
}

fn default_max_age_hours() -> u64 {
    24
}

fn default_boot_delay_ms() -> u64 {
    300
}

fn default_system_prompt() -> String {
    "You are the APEX OS terminal assistant. Answer concisely, use markdown \
     sparingly, and prefer actionable steps."
        .to_string()
}

fn default_idempotency_ttl() -> u64 {
    60
}

fn default_watchdog_secs() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    45
}

fn default_history_window() -> usize {
    10
}

fn default_slot_timeout() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

fn default_chat_retries() -> u32 {
    2
}

fn default_chat_delay_ms() -> u64 {
    1000
}

fn default_chat_prompt() -> String {
    "You are the Dungeon Master, a terse and playful guide for players of \
     the APEX HUD. Keep answers short."
        .to_string()
}

fn default_provider_slots() -> Vec<ProviderSlotConfig> {
    vec![
        ProviderSlotConfig {
            name: "vertex-fast".to_string(),
            family: "vertex".to_string(),
            class: ModelClass::Fast,
            kind: BackendKind::Gemini,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash-lite".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            priority: 1,
            timeout_secs: 12,
            probe_health: false,
            enabled: true,
        },
        ProviderSlotConfig {
            name: "vertex-pro".to_string(),
            family: "vertex".to_string(),
            class: ModelClass::Pro,
            kind: BackendKind::Gemini,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-pro".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            priority: 2,
            timeout_secs: 12,
            probe_health: false,
            enabled: true,
        },
        ProviderSlotConfig {
            name: "perplexity".to_string(),
            family: "perplexity".to_string(),
            class: ModelClass::Standard,
            kind: BackendKind::OpenAi,
            base_url: "https://api.perplexity.ai".to_string(),
            model: "sonar-reasoning-pro".to_string(),
            api_key_env: "PERPLEXITY_API_KEY".to_string(),
            priority: 3,
            timeout_secs: 15,
            probe_health: true,
            enabled: true,
        },
        ProviderSlotConfig {
            name: "groq".to_string(),
            family: "groq".to_string(),
            class: ModelClass::Standard,
            kind: BackendKind::OpenAi,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            priority: 4,
            timeout_secs: 20,
            probe_health: false,
            enabled: true,
        },
    ]
}

impl HudConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HudConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| HudError::InvalidConfig {
            message: e.to_string(),
        })?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the first config file found, or defaults
    pub fn load_or_default() -> Self {
        if let Some(path) = super::find_config_file() {
            match Self::load(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Ignoring config at {}: {}", path.display(), e);
                }
            }
        }
        Self::default()
    }

    /// Get default config file path
    pub fn default_path() -> Option<PathBuf> {
        super::get_config_dir().map(|d| d.join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.terminal.max_lines == 0 {
            return Err(HudError::InvalidConfig {
                message: "terminal.max_lines must be at least 1".to_string(),
            });
        }
        if self.terminal.autosave_interval_ms == 0 {
            return Err(HudError::InvalidConfig {
                message: "terminal.autosave_interval_ms must be at least 1".to_string(),
            });
        }
        if self.terminal.terminal_id.trim().is_empty() {
            return Err(HudError::InvalidConfig {
                message: "terminal.terminal_id must not be empty".to_string(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for slot in &self.ai.providers {
            if !seen.insert(slot.name.as_str()) {
                return Err(HudError::InvalidConfig {
                    message: format!("duplicate provider slot '{}'", slot.name),
                });
            }
        }
        Ok(())
    }
}
