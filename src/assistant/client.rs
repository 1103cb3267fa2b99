//! HTTP client for the supported providers.
//!
//! Gemini uses `models/<model>:generateContent`; DeepSeek and OpenRouter speak the
//! OpenAI-compatible `chat/completions` shape.

use super::{AssistantConfig, AssistantError, ChatMessage, ChatProvider, ChatRole, ProviderKind};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Show only the first and last four characters of a key.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

fn openai_body(model: &str, system_prompt: &str, history: &[ChatMessage], user_message: &str) -> Value {
    let mut messages = vec![json!({"role": "system", "content": system_prompt})];
    for m in history {
        let role = match m.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        messages.push(json!({"role": role, "content": m.content}));
    }
    messages.push(json!({"role": "user", "content": user_message}));
    json!({
        "model": model,
        "messages": messages,
        "stream": false,
    })
}

fn gemini_body(system_prompt: &str, history: &[ChatMessage], user_message: &str) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|m| {
            let role = match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "model",
            };
            json!({"role": role, "parts": [{"text": m.content}]})
        })
        .collect();
    contents.push(json!({"role": "user", "parts": [{"text": user_message}]}));
    json!({
        "systemInstruction": {"parts": [{"text": system_prompt}]},
        "contents": contents,
    })
}

fn openai_reply(body: &Value) -> Option<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Gemini may split the reply over several parts.
fn gemini_reply(body: &Value) -> Option<String> {
    let parts = body.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

fn error_for_status(status: u16, body: &str) -> AssistantError {
    match status {
        401 | 403 => AssistantError::InvalidApiKey,
        429 => AssistantError::QuotaExhausted,
        _ => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| crate::logging::ellipse(body.trim(), 200));
            AssistantError::Upstream { status, message }
        }
    }
}

/// Assistant client
pub struct AssistantClient {
    pub config: AssistantConfig,
    client: reqwest::Client,
}

impl AssistantClient {
    pub fn new(config: AssistantConfig) -> anyhow::Result<Self> {
        config.validate()?;
        info!(
            "Assistant: Initializing {} client (model {}, endpoint {})",
            config.provider.label(),
            config.model,
            config.endpoint
        );
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Assistant HTTP client")?;
        Ok(Self { config, client })
    }

    fn request_url(&self) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        match self.config.provider {
            ProviderKind::Gemini => format!("{}/models/{}:generateContent", base, self.config.model),
            ProviderKind::DeepSeek | ProviderKind::OpenRouter => format!("{}/chat/completions", base),
        }
    }
}

#[async_trait]
impl ChatProvider for AssistantClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<String, AssistantError> {
        let url = self.request_url();
        let provider = self.config.provider;
        let request = match provider {
            ProviderKind::Gemini => self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .json(&gemini_body(system_prompt, history, user_message)),
            ProviderKind::DeepSeek | ProviderKind::OpenRouter => self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&openai_body(&self.config.model, system_prompt, history, user_message)),
        };
        debug!(
            "Assistant: POST {} ({} history message(s), key {})",
            url,
            history.len(),
            mask_key(&self.config.api_key)
        );

        let start_time = std::time::Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Assistant: {} returned HTTP {}", provider.label(), status);
            return Err(error_for_status(status.as_u16(), &body));
        }

        let value: Value = serde_json::from_str(&body)?;
        let reply = match provider {
            ProviderKind::Gemini => gemini_reply(&value),
            ProviderKind::DeepSeek | ProviderKind::OpenRouter => openai_reply(&value),
        }
        .filter(|r| !r.trim().is_empty())
        .ok_or(AssistantError::EmptyReply)?;
        info!(
            "Assistant: {} replied in {:?} ({} chars)",
            provider.label(),
            start_time.elapsed(),
            reply.chars().count()
        );
        Ok(reply)
    }
}
