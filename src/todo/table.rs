//! Record table shared by the memory and JSON file backends.

use super::{sort_tasks, NewTask, StoreError, Task, TaskId, TaskPatch, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskRecord {
    id: TaskId,
    user_id: UserId,
    text: String,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRecord {
    fn snapshot(&self) -> Task {
        Task {
            id: self.id,
            text: self.text.clone(),
            due_date: self.due_date,
            completed: self.completed,
        }
    }
}

/// On-disk / in-memory layout: `{ "next_id": N, "tasks": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct TaskTable {
    #[serde(default)]
    next_id: TaskId,
    #[serde(default)]
    tasks: Vec<TaskRecord>,
}

impl TaskTable {
    /// Ids are never reused, even after the highest one is deleted.
    fn allocate_id(&mut self) -> TaskId {
        let floor = self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let id = self.next_id.max(floor);
        self.next_id = id + 1;
        id
    }

    fn find_mut(&mut self, user: UserId, id: TaskId) -> Result<&mut TaskRecord, StoreError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user)
            .ok_or(StoreError::NotFound { id })
    }

    pub(crate) fn create(&mut self, user: UserId, new: NewTask, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let text = new.text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }
        let id = self.allocate_id();
        let record = TaskRecord {
            id,
            user_id: user,
            text: text.to_string(),
            due_date: new.due_date,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        let snapshot = record.snapshot();
        self.tasks.push(record);
        Ok(snapshot)
    }

    pub(crate) fn update(
        &mut self,
        user: UserId,
        id: TaskId,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if matches!(patch.text.as_deref(), Some(t) if t.trim().is_empty()) {
            return Err(StoreError::EmptyText);
        }
        let record = self.find_mut(user, id)?;
        if let Some(ref text) = patch.text {
            record.text = text.trim().to_string();
        }
        if let Some(due) = patch.due_date {
            record.due_date = due;
        }
        if let Some(completed) = patch.completed {
            record.completed = completed;
        }
        record.updated_at = now;
        Ok(())
    }

    pub(crate) fn delete(&mut self, user: UserId, id: TaskId) -> Result<(), StoreError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| !(t.id == id && t.user_id == user));
        if self.tasks.len() == before {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    pub(crate) fn list(&self, user: UserId) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.user_id == user)
            .map(TaskRecord::snapshot)
            .collect();
        sort_tasks(&mut tasks);
        tasks
    }
}
