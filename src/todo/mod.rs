//! Todo store: per-user task records behind an async `TodoStore` trait.
//!
//! Two backends share the same record table (`table::TaskTable`):
//! - `MemoryStore`: in-process, used by tests and dry runs
//! - `JsonFileStore`: `~/.todo-assistant/todos.json`

pub mod cli;
pub mod file_store;
pub mod memory;
mod table;

pub use file_store::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub type TaskId = u64;
pub type UserId = u64;

/// Snapshot of one task as seen by the cache and the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
}

/// Input for `TodoStore::create_task`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub text: String,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            due_date: None,
        }
    }

    pub fn due(mut self, due_date: Option<DateTime<Utc>>) -> Self {
        self.due_date = due_date;
        self
    }
}

/// Partial update. `None` fields are left untouched; `due_date: Some(None)` clears the date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn due_date(due_date: Option<DateTime<Utc>>) -> Self {
        Self {
            due_date: Some(due_date),
            ..Self::default()
        }
    }

    /// Apply the patch to a snapshot (used for optimistic cache updates).
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(ref text) = self.text {
            task.text = text.clone();
        }
        if let Some(due) = self.due_date {
            task.due_date = due;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

/// Store error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("task {id} not found")]
    NotFound { id: TaskId },

    #[error("task text must not be empty")]
    EmptyText,

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage data error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent task repository. Every call is scoped to an already-authenticated user;
/// tasks owned by another user behave as if they did not exist.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn create_task(&self, user: UserId, new: NewTask) -> Result<Task, StoreError>;

    async fn update_task(&self, user: UserId, id: TaskId, patch: TaskPatch) -> Result<(), StoreError>;

    async fn delete_task(&self, user: UserId, id: TaskId) -> Result<(), StoreError>;

    /// All tasks of `user`, undated first, then by due date, then by id.
    async fn list_tasks(&self, user: UserId) -> Result<Vec<Task>, StoreError>;
}

/// Listing order shared by every backend.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.due_date
            .is_some()
            .cmp(&b.due_date.is_some())
            .then(a.due_date.cmp(&b.due_date))
            .then(a.id.cmp(&b.id))
    });
}
