//! Chat assistant integration.
//!
//! Builds the system prompt (command grammar + the user's current tasks) and talks to one of the
//! supported model providers. The reply text is handed to `turn::process_reply` untouched.

pub mod client;

pub use client::AssistantClient;

use crate::dates::{format_due_date, zone_label};
use crate::todo::Task;
use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    DeepSeek,
    OpenRouter,
}

impl ProviderKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "Gemini",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::OpenRouter => "OpenRouter",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::DeepSeek => "https://api.deepseek.com",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-2.5-flash",
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::OpenRouter => "openai/gpt-4o-mini",
        }
    }

    /// Environment variable consulted when config.json has no key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

/// Resolved provider configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub api_key: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl AssistantConfig {
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.endpoint).context("Invalid assistant endpoint URL")?;
        ensure!(!self.model.trim().is_empty(), "Model name must not be empty");
        ensure!(!self.api_key.trim().is_empty(), "API key must not be empty");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Assistant error types
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API key is invalid or expired")]
    InvalidApiKey,

    #[error("API quota exhausted, try again later")]
    QuotaExhausted,

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Model returned an empty reply")]
    EmptyReply,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One completion round-trip. `history` excludes the new user message.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<String, AssistantError>;
}

/// Numbered task list given to the model so it can reference ids.
pub fn todo_context(tasks: &[Task], zone: &FixedOffset) -> String {
    if tasks.is_empty() {
        return "The user currently has no to-do items.".to_string();
    }
    let lines: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let status = if t.completed { "✓ done" } else { "○ open" };
            let due = t
                .due_date
                .map(|d| format!(" (due: {})", format_due_date(&d, zone)))
                .unwrap_or_default();
            format!("{}. [ID:{}] {}: {}{}", i + 1, t.id, status, t.text, due)
        })
        .collect();
    format!("The user's current to-do items:\n{}", lines.join("\n"))
}

/// Prefix the user's message with the client clock so the model can resolve "tonight", "tomorrow".
pub fn with_client_time(message: &str, now: DateTime<Utc>, zone: &FixedOffset) -> String {
    format!(
        "[Current client time: {}] {}",
        now.with_timezone(zone).format("%Y/%m/%d %H:%M:%S"),
        message.trim()
    )
}

/// System prompt teaching the command grammar.
pub fn system_prompt(now: DateTime<Utc>, zone: &FixedOffset, todo_context: &str) -> String {
    let local = now.with_timezone(zone);
    format!(
        r#"You are a smart to-do list assistant.
Current time: {time} ({zone}). Do all date reasoning in this time zone.

[USER'S TASKS]
{context}

[COMMANDS]
You can change the user's to-do list by writing commands in your reply.
Format rules (follow exactly):
1. A command is exactly: 🔧[CMD:COMMAND|arg1|arg2]
   - the 🔧 emoji and the "[CMD:" prefix are required
   - arguments are separated by a vertical bar |, never by tabs or spaces
   - correct: 🔧[CMD:ADD|Finish report]
   - wrong:   🔧[CMD:ADD	Finish report]
2. Put each command on its own line with a blank line around it.
3. Do not use | or ] inside argument values.
4. The user never sees commands, only their results.

[THE 5 COMMANDS]
1. Add a task:          🔧[CMD:ADD|task text|YYYY-MM-DD HH:mm]   (due time optional)
2. Mark complete:       🔧[CMD:COMPLETE|task ID]
3. Delete:              🔧[CMD:DELETE|task ID]
4. Rename:              🔧[CMD:UPDATE|task ID|new task text]
5. Set due time:        🔧[CMD:SETDUEDATE|task ID|YYYY-MM-DD HH:mm]
   Use @latest (or @) instead of an ID to mean the task you created earlier in this same reply:
   🔧[CMD:ADD|Finish report]
   🔧[CMD:SETDUEDATE|@latest|2025-10-25 18:00]
   Prefer giving the due time directly in ADD when you know it.

[YOUR ROLE]
- Understand both what the user asks and what they likely need.
- Point out duplicates, overdue items and tasks missing due times, then fix them with commands.
- Explain briefly why you make each change."#,
        time = local.format("%Y-%m-%d %H:%M:%S (%A)"),
        zone = zone_label(zone),
        context = todo_context,
    )
}
