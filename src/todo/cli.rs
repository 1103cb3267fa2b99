//! CLI for direct task operations. Invoked from main when `todo_assistant todo <subcommand>` is used.

use super::{sort_tasks, NewTask, TaskId, TaskPatch, TodoStore, UserId};
use crate::dates::{format_due_date, parse_due_date};
use chrono::FixedOffset;
use clap::Subcommand;

/// Todo CLI subcommands. Parsed by main and passed to run().
#[derive(Subcommand, Debug)]
pub enum TodoCmd {
    /// Create a new task
    Add {
        text: String,
        /// Due date/time, e.g. "2025-10-25 18:00"
        #[arg(long)]
        due: Option<String>,
    },
    /// List tasks (all by default; --pending hides completed ones)
    List {
        #[arg(long)]
        pending: bool,
    },
    /// Mark a task complete
    Done { id: TaskId },
    /// Replace a task's text
    Update { id: TaskId, text: String },
    /// Set a task's due date/time
    Due { id: TaskId, when: String },
    /// Delete a task
    Remove { id: TaskId },
}

fn parse_due(raw: &str, zone: &FixedOffset) -> Result<chrono::DateTime<chrono::Utc>, i32> {
    parse_due_date(raw, zone).ok_or_else(|| {
        eprintln!("Error: invalid date format: {}", raw);
        1
    })
}

/// Run the todo CLI subcommand. Prints to stdout/stderr. Returns Ok(()) on success, Err(exit_code) on failure.
pub async fn run(cmd: TodoCmd, store: &dyn TodoStore, user: UserId, zone: &FixedOffset) -> Result<(), i32> {
    let outcome = match cmd {
        TodoCmd::Add { text, due } => {
            let due_date = match due.as_deref() {
                Some(raw) => Some(parse_due(raw, zone)?),
                None => None,
            };
            store
                .create_task(user, NewTask::new(text).due(due_date))
                .await
                .map(|task| println!("Created: [ID:{}] {}", task.id, task.text))
        }
        TodoCmd::List { pending } => store.list_tasks(user).await.map(|mut tasks| {
            sort_tasks(&mut tasks);
            let shown: Vec<_> = tasks.iter().filter(|t| !pending || !t.completed).collect();
            if shown.is_empty() {
                println!("No tasks.");
            }
            for t in shown {
                let mark = if t.completed { "x" } else { " " };
                let due = t
                    .due_date
                    .map(|d| format!("  (due: {})", format_due_date(&d, zone)))
                    .unwrap_or_default();
                println!("[{}] {:>4}  {}{}", mark, t.id, t.text, due);
            }
        }),
        TodoCmd::Done { id } => store
            .update_task(user, id, TaskPatch::completed(true))
            .await
            .map(|_| println!("Completed: {}", id)),
        TodoCmd::Update { id, text } => store
            .update_task(user, id, TaskPatch::text(text))
            .await
            .map(|_| println!("Updated: {}", id)),
        TodoCmd::Due { id, when } => {
            let due = parse_due(&when, zone)?;
            store
                .update_task(user, id, TaskPatch::due_date(Some(due)))
                .await
                .map(|_| println!("Due: {} → {}", id, format_due_date(&due, zone)))
        }
        TodoCmd::Remove { id } => store
            .delete_task(user, id)
            .await
            .map(|_| println!("Removed: {}", id)),
    };
    outcome.map_err(|e| {
        eprintln!("Error: {}", e);
        1
    })
}
