//! Session-local task cache.
//!
//! Mirrors one user's tasks between resyncs. The executor applies point mutations after each
//! successful store call so later commands in the same batch see them; `resync` replaces the
//! whole list from the store once the batch is done.

use crate::todo::{Task, TaskId, TaskPatch, TodoStore, StoreError, UserId};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCache {
    tasks: Vec<Task>,
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Authoritative replace.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Append a new snapshot; an existing entry with the same id is overwritten in place.
    pub fn insert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    /// Returns false if the id is not cached.
    pub fn update(&mut self, id: TaskId, patch: &TaskPatch) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                patch.apply_to(task);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index))
    }
}

/// Replace the cache with the store's current list for `user`.
/// On error the cache is left as it was.
pub async fn resync(store: &dyn TodoStore, user: UserId, cache: &mut TaskCache) -> Result<usize, StoreError> {
    let tasks = store.list_tasks(user).await?;
    let count = tasks.len();
    cache.replace_all(tasks);
    debug!("Cache: resynced {} task(s) for user {}", count, user);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::{MemoryStore, NewTask};

    fn task(id: TaskId, text: &str) -> Task {
        Task {
            id,
            text: text.to_string(),
            due_date: None,
            completed: false,
        }
    }

    #[test]
    fn point_mutations() {
        let mut cache = TaskCache::from_tasks(vec![task(1, "a"), task(2, "b")]);
        cache.insert(task(3, "c"));
        assert_eq!(cache.len(), 3);

        assert!(cache.update(2, &TaskPatch::completed(true)));
        assert!(!cache.update(99, &TaskPatch::completed(true)));
        assert!(cache.get(2).unwrap().completed);

        assert_eq!(cache.remove(1).map(|t| t.text), Some("a".to_string()));
        assert!(cache.remove(1).is_none());
        let ids: Vec<TaskId> = cache.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn insert_same_id_overwrites() {
        let mut cache = TaskCache::new();
        cache.insert(task(1, "old"));
        cache.insert(task(1, "new"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1).map(|t| t.text.as_str()), Some("new"));
    }

    #[tokio::test]
    async fn resync_replaces_stale_entries() {
        let store = MemoryStore::new();
        let real = store.create_task(1, NewTask::new("real")).await.unwrap();
        let mut cache = TaskCache::from_tasks(vec![task(500, "stale")]);

        let n = resync(&store, 1, &mut cache).await.unwrap();
        assert_eq!(n, 1);
        assert_eq!(cache.tasks(), &[real]);

        let before = cache.clone();
        resync(&store, 1, &mut cache).await.unwrap();
        assert_eq!(cache, before);
    }
}
