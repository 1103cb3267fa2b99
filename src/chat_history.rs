//! Per-session chat history.
//!
//! Each (user, session) conversation lives in
//! `~/.todo-assistant/chat/chat-<user>-<session>.json`. Only the clean assistant text is stored,
//! never command markup or execution records, so replaying history can't re-trigger commands.

use crate::assistant::{ChatMessage, ChatRole};
use crate::config::Config;
use crate::todo::UserId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Messages replayed to the provider on each turn.
pub const REPLAY_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct HistoryFile {
    messages: Vec<ChatMessage>,
}

pub struct ChatHistory {
    path: PathBuf,
    messages: Vec<ChatMessage>,
}

/// Make a filename-safe session slug.
fn session_slug(session: &str) -> String {
    let s: String = session
        .chars()
        .take(40)
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let s = s.trim_matches('_').to_lowercase();
    if s.is_empty() {
        "default".to_string()
    } else {
        s
    }
}

impl ChatHistory {
    /// Load from the default chat directory.
    pub fn open(user: UserId, session: &str) -> std::io::Result<Self> {
        Config::ensure_chat_directory()?;
        Self::open_in(&Config::chat_dir(), user, session)
    }

    /// Load from `dir`. A missing file is an empty history.
    pub fn open_in(dir: &Path, user: UserId, session: &str) -> std::io::Result<Self> {
        let path = dir.join(format!("chat-{}-{}.json", user, session_slug(session)));
        let messages = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => {
                let file: HistoryFile = serde_json::from_str(&raw)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                file.messages
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        debug!("Chat history: loaded {} message(s) from {}", messages.len(), path.display());
        Ok(Self { path, messages })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The most recent `REPLAY_LIMIT` messages, starting on a user turn.
    pub fn replay(&self) -> &[ChatMessage] {
        let mut start = self.messages.len().saturating_sub(REPLAY_LIMIT);
        while start < self.messages.len() && self.messages[start].role != ChatRole::User {
            start += 1;
        }
        &self.messages[start..]
    }

    pub fn push_exchange(&mut self, user_message: &str, assistant_clean_text: &str) {
        self.messages.push(ChatMessage::user(user_message));
        self.messages.push(ChatMessage::assistant(assistant_clean_text));
    }

    pub fn save(&self) -> std::io::Result<()> {
        let file = HistoryFile {
            messages: self.messages.clone(),
        };
        let body = serde_json::to_string_pretty(&file)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, body)?;
        debug!("Chat history: wrote {} ({} messages)", self.path.display(), self.messages.len());
        Ok(())
    }
}
