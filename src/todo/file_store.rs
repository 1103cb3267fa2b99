//! JSON file todo store: all users' tasks in one document (default `~/.todo-assistant/todos.json`).
//!
//! Each call is a full read-modify-write cycle under a mutex, written through a temp file and
//! renamed into place so a crash never leaves a half-written document.

use super::table::TaskTable;
use super::{NewTask, StoreError, Task, TaskId, TaskPatch, TodoStore, UserId};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<TaskTable, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(TaskTable::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TaskTable::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, table: &TaskTable) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(table)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Run `op` against the current table and persist the result.
    async fn modify<T>(
        &self,
        op: impl FnOnce(&mut TaskTable) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let out = op(&mut table)?;
        self.save(&table).await?;
        Ok(out)
    }
}

#[async_trait]
impl TodoStore for JsonFileStore {
    async fn create_task(&self, user: UserId, new: NewTask) -> Result<Task, StoreError> {
        let task = self
            .modify(|table| table.create(user, new, Utc::now()))
            .await?;
        info!("Todos: created task {} for user {} in {:?}", task.id, user, self.path);
        Ok(task)
    }

    async fn update_task(&self, user: UserId, id: TaskId, patch: TaskPatch) -> Result<(), StoreError> {
        self.modify(|table| table.update(user, id, &patch, Utc::now()))
            .await?;
        debug!("Todos: updated task {} for user {}", id, user);
        Ok(())
    }

    async fn delete_task(&self, user: UserId, id: TaskId) -> Result<(), StoreError> {
        self.modify(|table| table.delete(user, id)).await?;
        info!("Todos: deleted task {} for user {}", id, user);
        Ok(())
    }

    async fn list_tasks(&self, user: UserId) -> Result<Vec<Task>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.list(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scratch_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir()
            .join(format!("todo-assistant-store-{}-{}-{}", name, std::process::id(), nanos))
            .join("todos.json")
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let path = scratch_path("persist");
        let due = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        {
            let store = JsonFileStore::new(&path);
            let t = store
                .create_task(1, NewTask::new("write report").due(Some(due)))
                .await
                .unwrap();
            store.update_task(1, t.id, TaskPatch::text("write final report")).await.unwrap();
            store.create_task(2, NewTask::new("someone else's")).await.unwrap();
        }

        let reopened = JsonFileStore::new(&path);
        let tasks = reopened.list_tasks(1).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].text, "write final report");
        assert_eq!(tasks[0].due_date, Some(due));

        let next = reopened.create_task(1, NewTask::new("next")).await.unwrap();
        assert_eq!(next.id, 3);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty_and_failed_ops_do_not_write() {
        let path = scratch_path("missing");
        let store = JsonFileStore::new(&path);
        assert!(store.list_tasks(1).await.unwrap().is_empty());
        assert!(matches!(
            store.update_task(1, 5, TaskPatch::completed(true)).await,
            Err(StoreError::NotFound { id: 5 })
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_as_data_error() {
        let path = scratch_path("corrupt");
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(&path, "{ nope").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.list_tasks(1).await, Err(StoreError::Serde(_))));
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
