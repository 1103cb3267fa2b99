//! Executes parsed commands against the store and the session cache.
//!
//! Commands run strictly in reply order, each store call awaited before the next command starts.
//! Every failure, whether validation, a missing task, or a store error or timeout, becomes one
//! result line and the batch carries on.

use super::{is_latest_sentinel, Command, CommandName, DELIMITER};
use crate::cache::TaskCache;
use crate::dates::{format_due_date, local_zone, parse_due_date};
use crate::todo::{NewTask, StoreError, TaskId, TaskPatch, TodoStore, UserId};
use chrono::FixedOffset;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default per-command limit on a single store call.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Zone used to read wall-clock dates and to display them.
    pub zone: FixedOffset,
    /// None waits for the store indefinitely.
    pub command_timeout: Option<Duration>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            zone: local_zone(),
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
        }
    }
}

/// Tasks created so far in the current batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardRefs {
    created: Vec<TaskId>,
}

impl ForwardRefs {
    pub fn record(&mut self, id: TaskId) {
        self.created.push(id);
    }

    pub fn latest(&self) -> Option<TaskId> {
        self.created.last().copied()
    }

    pub fn created(&self) -> &[TaskId] {
        &self.created
    }
}

/// What one batch produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// One or more lines per command, in execution order.
    pub results: Vec<String>,
    /// True once any well-formed command was dispatched, whatever its outcome.
    /// A failed lookup may mean the cache is stale, so the caller resyncs either way.
    pub resync_needed: bool,
    pub refs: ForwardRefs,
}

pub struct Executor<'a> {
    store: &'a dyn TodoStore,
    user: UserId,
    options: &'a ExecutorOptions,
}

fn parse_task_id(raw: &str) -> Option<TaskId> {
    raw.trim().parse::<TaskId>().ok().filter(|id| *id > 0)
}

fn non_empty(arg: Option<&str>) -> Option<&str> {
    arg.filter(|a| !a.is_empty())
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a dyn TodoStore, user: UserId, options: &'a ExecutorOptions) -> Self {
        Self { store, user, options }
    }

    /// Run the batch. Never fails; see `BatchOutcome`.
    pub async fn run(&self, commands: &[Command], cache: &mut TaskCache) -> BatchOutcome {
        let mut batch = BatchOutcome::default();
        for (i, command) in commands.iter().enumerate() {
            batch.resync_needed = true;
            debug!(
                "Executor: command {}/{} {} {:?}",
                i + 1,
                commands.len(),
                command.name,
                command.args
            );
            let step = match &command.name {
                CommandName::Add => self.add(command, cache, &mut batch).await,
                CommandName::Complete => self.complete(command, cache, &mut batch).await,
                CommandName::Delete => self.delete(command, cache, &mut batch).await,
                CommandName::Update => self.update(command, cache, &mut batch).await,
                CommandName::SetDueDate => self.set_due_date(command, cache, &mut batch).await,
                CommandName::Unknown(name) => {
                    warn!("Executor: unknown command {}", name);
                    batch.results.push(format!("⚠️ Unknown command: {}", name));
                    Ok(())
                }
            };
            if let Err(e) = step {
                warn!("Executor: {} failed for user {}: {}", command.name, self.user, e);
                batch
                    .results
                    .push(format!("❌ Command failed: {} - {}", command.name, e));
            }
        }
        info!(
            "Executor: ran {} command(s) for user {} ({} created)",
            commands.len(),
            self.user,
            batch.refs.created().len()
        );
        batch
    }

    /// Await one store mutation under the per-command timeout.
    async fn mutate<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match self.options.command_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| StoreError::Timeout(limit))?,
            None => call.await,
        }
    }

    async fn add(&self, command: &Command, cache: &mut TaskCache, batch: &mut BatchOutcome) -> Result<(), StoreError> {
        let Some(text) = non_empty(command.arg(0)) else {
            batch.results.push("❌ ADD is missing its argument: task text".to_string());
            return Ok(());
        };
        let zone = &self.options.zone;
        let due_date = match non_empty(command.arg(1)) {
            Some(raw) => {
                let parsed = parse_due_date(raw, zone);
                if parsed.is_none() {
                    batch
                        .results
                        .push(format!("❌ Invalid date format: {}, due date ignored", raw));
                }
                parsed
            }
            None => None,
        };

        let new = NewTask::new(text).due(due_date);
        let task = self.mutate(self.store.create_task(self.user, new)).await?;

        let due = task
            .due_date
            .map(|d| format!(" (due: {})", format_due_date(&d, zone)))
            .unwrap_or_default();
        batch
            .results
            .push(format!("✅ Added task: \"{}\"{} [ID:{}]", task.text, due, task.id));
        batch.refs.record(task.id);
        cache.insert(task);
        Ok(())
    }

    /// Resolve the id argument against the cache, pushing the failure line when it does not resolve.
    fn lookup(&self, raw: &str, cache: &TaskCache, batch: &mut BatchOutcome) -> Option<(TaskId, String)> {
        let Some(id) = parse_task_id(raw) else {
            batch.results.push(format!("❌ Invalid task ID: {}", raw));
            return None;
        };
        self.lookup_id(id, cache, batch)
    }

    fn lookup_id(&self, id: TaskId, cache: &TaskCache, batch: &mut BatchOutcome) -> Option<(TaskId, String)> {
        match cache.get(id) {
            Some(task) => Some((id, task.text.clone())),
            None => {
                batch.results.push(format!("❌ Task {} not found", id));
                None
            }
        }
    }

    async fn complete(&self, command: &Command, cache: &mut TaskCache, batch: &mut BatchOutcome) -> Result<(), StoreError> {
        let Some(raw) = non_empty(command.arg(0)) else {
            batch.results.push("❌ COMPLETE is missing its argument: task ID".to_string());
            return Ok(());
        };
        let Some((id, text)) = self.lookup(raw, cache, batch) else {
            return Ok(());
        };
        let patch = TaskPatch::completed(true);
        self.mutate(self.store.update_task(self.user, id, patch.clone()))
            .await?;
        cache.update(id, &patch);
        batch.results.push(format!("✅ Marked complete: \"{}\"", text));
        Ok(())
    }

    async fn delete(&self, command: &Command, cache: &mut TaskCache, batch: &mut BatchOutcome) -> Result<(), StoreError> {
        let Some(raw) = non_empty(command.arg(0)) else {
            batch.results.push("❌ DELETE is missing its argument: task ID".to_string());
            return Ok(());
        };
        let Some((id, text)) = self.lookup(raw, cache, batch) else {
            return Ok(());
        };
        self.mutate(self.store.delete_task(self.user, id)).await?;
        cache.remove(id);
        batch.results.push(format!("✅ Deleted task: \"{}\"", text));
        Ok(())
    }

    async fn update(&self, command: &Command, cache: &mut TaskCache, batch: &mut BatchOutcome) -> Result<(), StoreError> {
        // The text is everything after the id, so it may itself contain the delimiter.
        let new_text = command
            .rest(1)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.chars().all(|c| c == DELIMITER || c.is_whitespace()));
        let (Some(raw), Some(new_text)) = (non_empty(command.arg(0)), new_text) else {
            batch
                .results
                .push("❌ UPDATE needs a task ID and the new task text".to_string());
            return Ok(());
        };
        let Some((id, old_text)) = self.lookup(raw, cache, batch) else {
            return Ok(());
        };
        let patch = TaskPatch::text(new_text.clone());
        self.mutate(self.store.update_task(self.user, id, patch.clone()))
            .await?;
        cache.update(id, &patch);
        batch
            .results
            .push(format!("✅ Updated task: \"{}\" → \"{}\"", old_text, new_text));
        Ok(())
    }

    async fn set_due_date(&self, command: &Command, cache: &mut TaskCache, batch: &mut BatchOutcome) -> Result<(), StoreError> {
        let (Some(target), Some(_)) = (non_empty(command.arg(0)), non_empty(command.arg(1))) else {
            batch
                .results
                .push("❌ SETDUEDATE needs a task ID and a date/time".to_string());
            return Ok(());
        };
        let resolved = if is_latest_sentinel(target) {
            match batch.refs.latest() {
                Some(id) => {
                    debug!("Executor: {} resolved to task {}", target, id);
                    self.lookup_id(id, cache, batch)
                }
                None => {
                    batch.results.push(
                        "❌ No task has been created earlier in this reply; specify a task ID".to_string(),
                    );
                    return Ok(());
                }
            }
        } else {
            self.lookup(target, cache, batch)
        };
        let Some((id, text)) = resolved else {
            return Ok(());
        };

        let raw_date = command.rest(1).unwrap_or_default();
        let zone = &self.options.zone;
        let Some(due) = parse_due_date(&raw_date, zone) else {
            batch.results.push(format!("❌ Invalid date format: {}", raw_date));
            return Ok(());
        };
        let patch = TaskPatch::due_date(Some(due));
        self.mutate(self.store.update_task(self.user, id, patch.clone()))
            .await?;
        cache.update(id, &patch);
        batch.results.push(format!(
            "✅ Due date set: \"{}\" → {}",
            text,
            format_due_date(&due, zone)
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_reply;
    use crate::todo::{MemoryStore, Task};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn options() -> ExecutorOptions {
        ExecutorOptions {
            zone: FixedOffset::east_opt(0).unwrap(),
            command_timeout: Some(Duration::from_secs(2)),
        }
    }

    async fn run(store: &dyn TodoStore, cache: &mut TaskCache, reply: &str) -> BatchOutcome {
        run_with(store, cache, reply, &options()).await
    }

    async fn run_with(
        store: &dyn TodoStore,
        cache: &mut TaskCache,
        reply: &str,
        opts: &ExecutorOptions,
    ) -> BatchOutcome {
        let parsed = parse_reply(reply);
        Executor::new(store, 1, opts).run(&parsed.commands, cache).await
    }

    #[tokio::test]
    async fn add_then_complete_in_same_batch() {
        let store = MemoryStore::new();
        let mut cache = TaskCache::new();
        let out = run(&store, &mut cache, "🔧[CMD:ADD|Buy milk] 🔧[CMD:COMPLETE|1]").await;
        assert_eq!(
            out.results,
            vec![
                "✅ Added task: \"Buy milk\" [ID:1]".to_string(),
                "✅ Marked complete: \"Buy milk\"".to_string(),
            ]
        );
        assert!(out.resync_needed);
        assert_eq!(out.refs.created(), &[1u64]);
        assert!(cache.get(1).unwrap().completed);
        assert!(store.list_tasks(1).await.unwrap()[0].completed);
    }

    #[tokio::test]
    async fn forward_reference_sets_due_date_on_new_task() {
        let store = MemoryStore::new();
        store.create_task(1, crate::todo::NewTask::new("existing")).await.unwrap();
        let mut cache = TaskCache::from_tasks(store.list_tasks(1).await.unwrap());

        let out = run(
            &store,
            &mut cache,
            "🔧[CMD:ADD|buy milk]\n🔧[CMD:SETDUEDATE|@latest|2025-01-01 10:00]",
        )
        .await;
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(out.results[1], "✅ Due date set: \"buy milk\" → 2025/01/01 10:00 UTC");
        assert_eq!(cache.get(2).unwrap().due_date, Some(expected));
        assert_eq!(cache.get(1).unwrap().due_date, None);
        let stored = store.list_tasks(1).await.unwrap();
        assert_eq!(stored.iter().find(|t| t.id == 2).unwrap().due_date, Some(expected));
    }

    #[tokio::test]
    async fn forward_reference_without_prior_add_fails() {
        let store = MemoryStore::new();
        let mut cache = TaskCache::new();
        let out = run(&store, &mut cache, "🔧[CMD:SETDUEDATE|@|2025-01-01 10:00] 🔧[CMD:ADD|after]").await;
        assert!(out.results[0].starts_with("❌ No task has been created"));
        assert!(out.results[1].starts_with("✅ Added task: \"after\""));
    }

    #[tokio::test]
    async fn add_with_bad_date_still_adds() {
        let store = MemoryStore::new();
        let mut cache = TaskCache::new();
        let out = run(&store, &mut cache, "🔧[CMD:ADD|Report|someday]").await;
        assert_eq!(out.results[0], "❌ Invalid date format: someday, due date ignored");
        assert_eq!(out.results[1], "✅ Added task: \"Report\" [ID:1]");
        assert_eq!(cache.get(1).unwrap().due_date, None);
    }

    #[tokio::test]
    async fn add_with_date_reports_it() {
        let store = MemoryStore::new();
        let mut cache = TaskCache::new();
        let out = run(&store, &mut cache, "🔧[CMD:ADD|Report|2025-10-25 18:00]").await;
        assert_eq!(out.results, vec!["✅ Added task: \"Report\" (due: 2025/10/25 18:00 UTC) [ID:1]".to_string()]);
    }

    #[tokio::test]
    async fn validation_failures_do_not_touch_the_store() {
        let store = MemoryStore::new();
        let mut cache = TaskCache::new();
        let out = run(
            &store,
            &mut cache,
            "🔧[CMD:ADD] 🔧[CMD:ADD|] 🔧[CMD:COMPLETE|9999] 🔧[CMD:DELETE|abc] 🔧[CMD:UPDATE|1] 🔧[CMD:SETDUEDATE|1]",
        )
        .await;
        assert_eq!(
            out.results,
            vec![
                "❌ ADD is missing its argument: task text".to_string(),
                "❌ ADD is missing its argument: task text".to_string(),
                "❌ Task 9999 not found".to_string(),
                "❌ Invalid task ID: abc".to_string(),
                "❌ UPDATE needs a task ID and the new task text".to_string(),
                "❌ SETDUEDATE needs a task ID and a date/time".to_string(),
            ]
        );
        assert!(out.resync_needed);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn update_keeps_delimiters_in_text_and_delete_reports_old_text() {
        let store = MemoryStore::new();
        let mut cache = TaskCache::new();
        let out = run(
            &store,
            &mut cache,
            "🔧[CMD:ADD|Draft] 🔧[CMD:UPDATE|1|Draft | v2] 🔧[CMD:DELETE|1]",
        )
        .await;
        assert_eq!(out.results[1], "✅ Updated task: \"Draft\" → \"Draft|v2\"");
        assert_eq!(out.results[2], "✅ Deleted task: \"Draft|v2\"");
        assert!(cache.is_empty());
        assert!(store.list_tasks(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_text_may_start_with_delimiter() {
        let store = MemoryStore::new();
        let mut cache = TaskCache::new();
        let out = run(
            &store,
            &mut cache,
            "🔧[CMD:ADD|Draft] 🔧[CMD:UPDATE|1||v2] 🔧[CMD:UPDATE|1| | ]",
        )
        .await;
        assert_eq!(out.results[1], "✅ Updated task: \"Draft\" → \"|v2\"");
        assert_eq!(out.results[2], "❌ UPDATE needs a task ID and the new task text");
        assert_eq!(store.list_tasks(1).await.unwrap()[0].text, "|v2");
    }

    #[tokio::test]
    async fn empty_batch_needs_no_resync() {
        let store = MemoryStore::new();
        let mut cache = TaskCache::new();
        let out = run(&store, &mut cache, "No commands, just 🔧[CMD:ADD\tmalformed].").await;
        assert!(out.results.is_empty());
        assert!(!out.resync_needed);
    }

    #[tokio::test]
    async fn set_due_date_rejects_bad_date_without_mutation() {
        let store = MemoryStore::new();
        let t = store.create_task(1, crate::todo::NewTask::new("x")).await.unwrap();
        let mut cache = TaskCache::from_tasks(vec![t]);
        let out = run(&store, &mut cache, "🔧[CMD:SETDUEDATE|1|next week]").await;
        assert_eq!(out.results, vec!["❌ Invalid date format: next week".to_string()]);
        assert!(out.resync_needed);
        assert_eq!(cache.get(1).unwrap().due_date, None);
    }

    #[tokio::test]
    async fn unknown_command_does_not_halt_batch() {
        let store = MemoryStore::new();
        let mut cache = TaskCache::new();
        let out = run(&store, &mut cache, "🔧[CMD:ARCHIVE|1] 🔧[CMD:ADD|kept]").await;
        assert_eq!(out.results[0], "⚠️ Unknown command: ARCHIVE");
        assert!(out.results[1].starts_with("✅ Added task: \"kept\""));
    }

    /// Store whose mutations fail every other call.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TodoStore for FlakyStore {
        async fn create_task(&self, user: UserId, new: crate::todo::NewTask) -> Result<Task, StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            self.inner.create_task(user, new).await
        }

        async fn update_task(&self, user: UserId, id: TaskId, patch: TaskPatch) -> Result<(), StoreError> {
            self.inner.update_task(user, id, patch).await
        }

        async fn delete_task(&self, user: UserId, id: TaskId) -> Result<(), StoreError> {
            self.inner.delete_task(user, id).await
        }

        async fn list_tasks(&self, user: UserId) -> Result<Vec<Task>, StoreError> {
            self.inner.list_tasks(user).await
        }
    }

    #[tokio::test]
    async fn backend_error_is_one_line_and_batch_continues() {
        let store = FlakyStore::default();
        let mut cache = TaskCache::new();
        let out = run(&store, &mut cache, "🔧[CMD:ADD|a] 🔧[CMD:ADD|b] 🔧[CMD:ADD|c]").await;
        assert_eq!(out.results.len(), 3);
        assert!(out.results[0].starts_with("✅"));
        assert_eq!(out.results[1], "❌ Command failed: ADD - store unavailable: connection reset");
        assert!(out.results[2].starts_with("✅"));
        assert_eq!(out.refs.created(), &[1u64, 2]);
        assert!(out.resync_needed);
    }

    /// Store whose deletes never return.
    #[derive(Default)]
    struct HangingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl TodoStore for HangingStore {
        async fn create_task(&self, user: UserId, new: crate::todo::NewTask) -> Result<Task, StoreError> {
            self.inner.create_task(user, new).await
        }

        async fn update_task(&self, user: UserId, id: TaskId, patch: TaskPatch) -> Result<(), StoreError> {
            self.inner.update_task(user, id, patch).await
        }

        async fn delete_task(&self, _user: UserId, _id: TaskId) -> Result<(), StoreError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn list_tasks(&self, user: UserId) -> Result<Vec<Task>, StoreError> {
            self.inner.list_tasks(user).await
        }
    }

    #[tokio::test]
    async fn hung_store_call_times_out_and_batch_continues() {
        let store = HangingStore::default();
        let mut cache = TaskCache::new();
        let opts = ExecutorOptions {
            command_timeout: Some(Duration::from_millis(50)),
            ..options()
        };
        let out = run_with(&store, &mut cache, "🔧[CMD:ADD|a] 🔧[CMD:DELETE|1] 🔧[CMD:COMPLETE|1]", &opts).await;
        assert_eq!(out.results[1], "❌ Command failed: DELETE - store call timed out after 50ms");
        assert_eq!(out.results[2], "✅ Marked complete: \"a\"");
        assert!(cache.get(1).is_some());
    }
}
