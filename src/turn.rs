//! One assistant turn end to end.
//!
//! `process_reply` is the protocol pipeline: parse the reply, run its commands in order,
//! resync the cache after any well-formed command, and render the result. `chat_turn` wraps it
//! with the provider round-trip and chat history.

use crate::assistant::{system_prompt, todo_context, with_client_time, AssistantError, ChatProvider};
use crate::cache::{resync, TaskCache};
use crate::chat_history::ChatHistory;
use crate::logging::ellipse;
use crate::protocol::executor::{Executor, ExecutorOptions};
use crate::protocol::parse_reply;
use crate::protocol::render::{render, RenderedTurn};
use crate::todo::{TodoStore, UserId};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Run the command protocol over one raw assistant reply.
///
/// Malformed-command warnings come first, then one line per executed command in reply order.
/// Any well-formed command, even one that fails, is followed by a resync so the cache matches
/// the store after the batch. A failed resync keeps the cache as the batch left it and adds a
/// warning line.
pub async fn process_reply(
    store: &dyn TodoStore,
    cache: &mut TaskCache,
    user: UserId,
    reply: &str,
    options: &ExecutorOptions,
) -> RenderedTurn {
    let parsed = parse_reply(reply);
    if !parsed.has_markup() {
        debug!("Turn: reply has no commands");
        return render(&parsed, Vec::new());
    }
    for m in &parsed.malformed {
        warn!("Turn: malformed command {}", ellipse(&m.raw, 80));
    }

    let mut results = parsed.warnings();
    let batch = Executor::new(store, user, options)
        .run(&parsed.commands, cache)
        .await;
    results.extend(batch.results);

    if batch.resync_needed {
        match resync(store, user, cache).await {
            Ok(count) => debug!("Turn: cache holds {} task(s) after resync", count),
            Err(e) => {
                warn!("Turn: resync failed for user {}, keeping local cache: {}", user, e);
                results.push(format!("⚠️ Could not refresh the task list: {}", e));
            }
        }
    }

    info!(
        "Turn: {} command(s), {} malformed, {} result line(s)",
        parsed.commands.len(),
        parsed.malformed.len(),
        results.len()
    );
    render(&parsed, results)
}

/// Ask the provider, apply its commands, and record the exchange in history.
///
/// Only the clean text is stored so replayed history never carries executable markup.
#[allow(clippy::too_many_arguments)]
pub async fn chat_turn(
    provider: &dyn ChatProvider,
    store: &dyn TodoStore,
    cache: &mut TaskCache,
    history: &mut ChatHistory,
    user: UserId,
    message: &str,
    options: &ExecutorOptions,
    now: DateTime<Utc>,
) -> Result<RenderedTurn, AssistantError> {
    let zone = &options.zone;
    let context = todo_context(cache.tasks(), zone);
    let prompt = system_prompt(now, zone, &context);
    let user_message = with_client_time(message, now, zone);

    let reply = provider
        .complete(&prompt, history.replay(), &user_message)
        .await?;
    debug!("Turn: raw reply {}", ellipse(&reply, 200));

    let turn = process_reply(store, cache, user, &reply, options).await;
    history.push_exchange(&user_message, &turn.clean_text);
    if let Err(e) = history.save() {
        warn!("Turn: could not save chat history {}: {}", history.path().display(), e);
    }
    Ok(turn)
}
