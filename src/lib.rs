//! todo-assistant Library
//!
//! A to-do list driven by a chat assistant. The assistant edits tasks by embedding
//! `🔧[CMD:NAME|arg|...]` commands in its replies; this crate parses them, runs them against the
//! task store, keeps a session cache in sync, and renders what the user sees.
//!
//! ## Architecture
//!
//! - `protocol`: command grammar, parser, executor and presentation filter
//! - `turn`: the per-reply pipeline (parse → execute → resync → render)
//! - `todo`: task types, the `TodoStore` trait and its memory / JSON file backends
//! - `cache`: session-local task cache and resync
//! - `assistant`: system prompt and provider clients (Gemini, DeepSeek, OpenRouter)
//! - `chat_history`: per-session conversation persistence
//! - `dates`: due-date parsing and display
//! - `config`: paths and `config.json` settings
//! - `logging`: tracing setup
//!
//! ## Main Entry Points
//!
//! - `run_todo()`: direct task CLI
//! - `run_apply()`: apply a saved assistant reply
//! - `run_chat()`: one chat turn against the configured provider

pub mod assistant;
pub mod cache;
pub mod chat_history;
pub mod config;
pub mod dates;
pub mod logging;
pub mod protocol;
pub mod todo;
pub mod turn;

pub use cache::TaskCache;
pub use logging::init_tracing;
pub use protocol::render::RenderedTurn;
pub use turn::{chat_turn, process_reply};

use crate::assistant::AssistantClient;
use crate::chat_history::ChatHistory;
use crate::config::{Config, Settings};
use crate::dates::local_zone;
use crate::protocol::executor::ExecutorOptions;
use crate::todo::cli::TodoCmd;
use crate::todo::{JsonFileStore, TodoStore};
use tracing::error;

fn load_settings() -> Result<Settings, i32> {
    Settings::load().map_err(|e| {
        error!("Config: {:#}", e);
        eprintln!("Error: {:#}", e);
        1
    })
}

fn executor_options(settings: &Settings) -> ExecutorOptions {
    ExecutorOptions {
        zone: local_zone(),
        command_timeout: Some(settings.command_timeout()),
    }
}

/// Load the user's tasks into a fresh cache.
async fn warm_cache(store: &dyn TodoStore, settings: &Settings) -> Result<TaskCache, i32> {
    let mut cache = TaskCache::new();
    cache::resync(store, settings.user_id, &mut cache)
        .await
        .map_err(|e| {
            eprintln!("Error: could not load tasks: {}", e);
            1
        })?;
    Ok(cache)
}

/// `todo <subcommand>`
pub async fn run_todo(cmd: TodoCmd) -> Result<(), i32> {
    let settings = load_settings()?;
    let store = JsonFileStore::new(Config::todos_file_path());
    todo::cli::run(cmd, &store, settings.user_id, &local_zone()).await
}

/// `apply <text|->`: run the command protocol over reply text, e.g. one captured from a model.
pub async fn run_apply(reply: &str) -> Result<(), i32> {
    let settings = load_settings()?;
    let store = JsonFileStore::new(Config::todos_file_path());
    let mut cache = warm_cache(&store, &settings).await?;
    let options = executor_options(&settings);
    let turn = process_reply(&store, &mut cache, settings.user_id, reply, &options).await;
    println!("{}", turn.display_message());
    Ok(())
}

/// `chat <message>`: one assistant turn with history for `session`.
pub async fn run_chat(session: &str, message: &str) -> Result<(), i32> {
    let settings = load_settings()?;
    let client = settings
        .assistant_config()
        .and_then(AssistantClient::new)
        .map_err(|e| {
            eprintln!("Error: {:#}", e);
            1
        })?;
    let store = JsonFileStore::new(Config::todos_file_path());
    let mut cache = warm_cache(&store, &settings).await?;
    let mut history = ChatHistory::open(settings.user_id, session).map_err(|e| {
        eprintln!("Error: could not open chat history: {}", e);
        1
    })?;
    let options = executor_options(&settings);

    match chat_turn(
        &client,
        &store,
        &mut cache,
        &mut history,
        settings.user_id,
        message,
        &options,
        chrono::Utc::now(),
    )
    .await
    {
        Ok(turn) => {
            println!("{}", turn.display_message());
            Ok(())
        }
        Err(e) => {
            error!("Chat: {}", e);
            eprintln!("Error: {}", e);
            Err(1)
        }
    }
}
