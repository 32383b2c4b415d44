//! Provider backends
//!
//! A backend turns `{message, history, system prompt, model}` into
//! `{content, model}` or an error. Any error makes the router move on to the
//! next tier, so backends do no retrying of their own.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ChatTurn, Role};
use crate::config::{BackendKind, ProviderSlotConfig};
use crate::error::{HudError, Result};

#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub message: String,
    pub history: Vec<ChatTurn>,
    pub system_prompt: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    pub content: String,
    pub model: String,
}

#[async_trait]
pub trait AiBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &BackendRequest) -> Result<BackendReply>;

    /// Cheap reachability probe. Only called for slots that ask for it.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the backend for a configured slot. Returns `None` when the slot's
/// API key is not available, which leaves the slot disabled.
pub fn build_backend(slot: &ProviderSlotConfig, client: Client) -> Option<Arc<dyn AiBackend>> {
    let api_key = match slot.api_key().map(|k| validate_api_key(&k)) {
        Some(Ok(key)) => key,
        Some(Err(e)) => {
            tracing::warn!("Provider slot '{}' disabled: {}", slot.name, e);
            return None;
        }
        None => {
            tracing::debug!(
                "Provider slot '{}' disabled: {} is not set",
                slot.name,
                slot.api_key_env
            );
            return None;
        }
    };
    let base_url = match sanitize_base_url(&slot.base_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Provider slot '{}' disabled: {}", slot.name, e);
            return None;
        }
    };

    let backend: Arc<dyn AiBackend> = match slot.kind {
        BackendKind::OpenAi => Arc::new(OpenAiCompatibleBackend {
            name: slot.name.clone(),
            base_url,
            api_key,
            client,
        }),
        BackendKind::Gemini => Arc::new(GeminiBackend {
            name: slot.name.clone(),
            base_url,
            api_key,
            client,
        }),
    };
    Some(backend)
}

/// Reject keys that cannot be sent in an Authorization header
pub fn validate_api_key(api_key: &str) -> Result<String> {
    let trimmed = api_key.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Err(HudError::InvalidConfig {
            message: "API key is empty or set to 'none'".to_string(),
        });
    }
    if let Some((index, _)) = trimmed.char_indices().find(|(_, c)| c.is_control()) {
        return Err(HudError::InvalidConfig {
            message: format!("API key contains a control character at position {}", index),
        });
    }
    format!("Bearer {}", trimmed)
        .parse::<header::HeaderValue>()
        .map_err(|_| HudError::InvalidConfig {
            message: format!(
                "API key results in an invalid Authorization header ({} chars)",
                trimmed.len()
            ),
        })?;
    Ok(trimmed.to_string())
}

/// Trim and check a base URL; the trailing slash is removed
pub fn sanitize_base_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(HudError::InvalidConfig {
            message: format!("base URL must start with http:// or https://: '{}'", trimmed),
        });
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(HudError::InvalidConfig {
            message: "base URL contains whitespace or control characters".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn status_error(provider: &str, status: StatusCode, body: Option<serde_json::Value>) -> HudError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            HudError::provider(provider, format!("{} authentication failed", status.as_u16()))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            HudError::provider(provider, "429 rate limit exceeded")
        }
        status => {
            let detail = body
                .as_ref()
                .and_then(|v| v.get("error"))
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            HudError::provider(provider, format!("{} {}", status.as_u16(), detail))
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible (`/chat/completions`)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompatibleBackend {
    name: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiCompatibleBackend {
    fn messages<'a>(request: &'a BackendRequest) -> Vec<OpenAiMessage<'a>> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if !request.system_prompt.is_empty() {
            messages.push(OpenAiMessage {
                role: "system",
                content: &request.system_prompt,
            });
        }
        for turn in &request.history {
            messages.push(OpenAiMessage {
                role: match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &turn.content,
            });
        }
        messages.push(OpenAiMessage {
            role: "user",
            content: &request.message,
        });
        messages
    }
}

#[async_trait]
impl AiBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &BackendRequest) -> Result<BackendReply> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = OpenAiRequest {
            model: &request.model,
            messages: Self::messages(request),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| HudError::provider(&self.name, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.json().await.ok();
            return Err(status_error(&self.name, status, body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| HudError::provider(&self.name, e.to_string()))?;
        let parsed: OpenAiResponse = serde_json::from_str(&text).map_err(|e| {
            tracing::error!("Failed to parse {} response: {}. Raw body: {}", self.name, e, text);
            HudError::provider(&self.name, format!("malformed response: {}", e))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| HudError::provider(&self.name, "response contained no choices"))?;

        Ok(BackendReply {
            content,
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
        })
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| HudError::ProviderUnavailable {
                provider: self.name.clone(),
                reason: e.to_string(),
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(HudError::ProviderUnavailable {
                provider: self.name.clone(),
                reason: format!("health probe returned {}", response.status()),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Gemini (`generateContent`)
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

pub struct GeminiBackend {
    name: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl GeminiBackend {
    /// History plus the new message as Gemini contents. Consecutive turns of
    /// the same role are merged and the list always starts with a user turn.
    fn contents(request: &BackendRequest) -> Vec<GeminiContent> {
        let mut contents: Vec<GeminiContent> = Vec::new();
        let turns = request
            .history
            .iter()
            .map(|t| (t.role, t.content.as_str()))
            .chain(std::iter::once((Role::User, request.message.as_str())));

        for (role, text) in turns {
            if text.trim().is_empty() {
                continue;
            }
            let role = match role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            if let Some(last) = contents.last_mut() {
                if last.role == role {
                    if let Some(part) = last.parts.first_mut() {
                        part.text.push_str("\n\n");
                        part.text.push_str(text);
                        continue;
                    }
                }
            }
            contents.push(GeminiContent {
                role: role.to_string(),
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            });
        }

        while contents.first().is_some_and(|c| c.role != "user") {
            contents.remove(0);
        }
        contents
    }
}

#[async_trait]
impl AiBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &BackendRequest) -> Result<BackendReply> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        let body = GeminiRequest {
            contents: Self::contents(request),
            system_instruction: (!request.system_prompt.is_empty()).then(|| GeminiContent {
                role: "system".to_string(),
                parts: vec![GeminiPart {
                    text: request.system_prompt.clone(),
                }],
            }),
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| HudError::provider(&self.name, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.json().await.ok();
            return Err(status_error(&self.name, status, body));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| HudError::provider(&self.name, format!("malformed response: {}", e)))?;

        let content = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(HudError::provider(&self.name, "response contained no candidates"));
        }

        Ok(BackendReply {
            content,
            model: parsed.model_version.unwrap_or_else(|| request.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(history: Vec<ChatTurn>) -> BackendRequest {
        BackendRequest {
            message: "what now?".to_string(),
            history,
            system_prompt: "be brief".to_string(),
            model: "m".to_string(),
        }
    }

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("sk-abc123").is_ok());
        assert!(validate_api_key("  ").is_err());
        assert!(validate_api_key("none").is_err());
        assert!(validate_api_key("sk-\nabc").is_err());
    }

    #[test]
    fn test_sanitize_base_url() {
        assert_eq!(
            sanitize_base_url(" https://api.groq.com/openai/v1/ ").unwrap(),
            "https://api.groq.com/openai/v1"
        );
        assert!(sanitize_base_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_openai_messages_order() {
        let req = request(vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")]);
        let roles: Vec<_> = OpenAiCompatibleBackend::messages(&req)
            .iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }

    #[test]
    fn test_gemini_contents_merge_and_start_with_user() {
        let req = request(vec![
            ChatTurn::assistant("orphan"),
            ChatTurn::user("a"),
            ChatTurn::user("b"),
            ChatTurn::assistant("c"),
        ]);
        let contents = GeminiBackend::contents(&req);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[0].parts[0].text, "a\n\nb");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[2].parts[0].text, "what now?");
    }

    #[test]
    fn test_missing_key_disables_slot() {
        let mut slot = crate::config::HudConfig::default().ai.providers[0].clone();
        slot.api_key_env = "APEX_HUD_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(build_backend(&slot, Client::new()).is_none());
    }
}
