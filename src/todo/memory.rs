//! In-process todo store.

use super::table::TaskTable;
use super::{NewTask, StoreError, Task, TaskId, TaskPatch, TodoStore, UserId};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

/// Todo store kept entirely in memory. Writes are serialized by the table mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<TaskTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn create_task(&self, user: UserId, new: NewTask) -> Result<Task, StoreError> {
        let task = self.table.lock().await.create(user, new, Utc::now())?;
        debug!("MemoryStore: created task {} for user {}", task.id, user);
        Ok(task)
    }

    async fn update_task(&self, user: UserId, id: TaskId, patch: TaskPatch) -> Result<(), StoreError> {
        self.table.lock().await.update(user, id, &patch, Utc::now())
    }

    async fn delete_task(&self, user: UserId, id: TaskId) -> Result<(), StoreError> {
        self.table.lock().await.delete(user, id)
    }

    async fn list_tasks(&self, user: UserId) -> Result<Vec<Task>, StoreError> {
        Ok(self.table.lock().await.list(user))
    }
}
