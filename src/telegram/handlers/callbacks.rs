//! URL messages and the selection dialog they open.

use std::sync::Arc;
use std::time::Instant;

use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId};

use super::types::{remember_selection, HandlerDeps, HandlerError};
use crate::core::config;
use crate::download::request::{CallerContext, DownloadRequest, OutputContainer};
use crate::telegram::bot::extract_url;
use crate::telegram::dialog::{
    backend_keyboard, container_keyboard, format_keyboard, format_list_keyboard, implicit_backend, next_step,
    CallbackAction, NextStep, PendingSelection,
};

const ASK_FORMAT: &str = "🎬 Choose the source format:";
const ASK_CONTAINER: &str = "🎚 Convert to:";
const ASK_BACKEND: &str = "💾 Where should the file go?";
const EXPIRED: &str = "⌛ This selection has expired. Send the link again.";

/// Handles a text message: starts the pipeline right away when nothing needs
/// to be asked, otherwise opens the selection dialog.
pub(super) async fn handle_url_message(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some(url) = msg.text().and_then(extract_url) else {
        bot.send_message(msg.chat.id, "🔗 Send me a link to download.").await?;
        return Ok(());
    };
    log::info!("URL from chat {}: {}", msg.chat.id, url);

    if let Some(container) = OutputContainer::configured_default() {
        if !deps.registry.should_prompt_user() {
            let request = DownloadRequest::new(
                deps.request_ids.allocate(),
                url,
                implicit_backend(&deps.registry),
                config::download::BEST_FORMAT,
                container,
                CallerContext::FromMessage {
                    chat_id: msg.chat.id,
                    message_id: msg.id,
                },
            );
            spawn_run(&deps, request);
            return Ok(());
        }
    }

    let keyboard_msg = bot
        .send_message(msg.chat.id, ASK_FORMAT)
        .reply_markup(format_keyboard())
        .await?;
    remember_selection(
        &deps.pending,
        (msg.chat.id, keyboard_msg.id),
        PendingSelection::new(url, msg.id),
        Instant::now(),
        config::dialog::pending_ttl(),
    );
    Ok(())
}

/// Handles a button press in the selection dialog.
pub(super) async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        log::warn!("Failed to answer callback query: {}", e);
    }

    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();
    let Some(action) = CallbackAction::parse(data) else {
        log::debug!("Ignoring unknown callback data {:?}", data);
        return Ok(());
    };
    let key = (chat_id, message_id);

    let explicit_backend = match action {
        CallbackAction::Abort => {
            deps.pending.remove(&key);
            show(&bot, chat_id, message_id, "✖️ Cancelled.", None).await;
            return Ok(());
        }
        CallbackAction::ListFormats => {
            list_formats(&bot, chat_id, message_id, &deps).await;
            return Ok(());
        }
        CallbackAction::Format(format) => {
            if let Some(mut selection) = deps.pending.get_mut(&key) {
                selection.format = Some(format);
            }
            None
        }
        CallbackAction::Container(container) => {
            if let Some(mut selection) = deps.pending.get_mut(&key) {
                selection.container = Some(container);
            }
            None
        }
        CallbackAction::Backend(backend_id) => {
            if !deps.registry.descriptor(&backend_id).is_some_and(|b| b.is_live) {
                log::warn!("Backend {} chosen but no longer available", backend_id);
                show(
                    &bot,
                    chat_id,
                    message_id,
                    &format!("⚠️ {} is not available right now.\n\n{}", backend_id, ASK_BACKEND),
                    Some(backend_keyboard(&deps.registry)),
                )
                .await;
                return Ok(());
            }
            Some(backend_id)
        }
    };

    let step = deps.pending.get_mut(&key).map(|mut selection| match explicit_backend {
        Some(backend_id) if selection.format.is_some() && selection.container.is_some() => {
            NextStep::Start { backend_id }
        }
        _ => next_step(&mut selection, OutputContainer::configured_default(), &deps.registry),
    });
    let Some(step) = step else {
        show(&bot, chat_id, message_id, EXPIRED, None).await;
        return Ok(());
    };

    match step {
        NextStep::AskFormat => show(&bot, chat_id, message_id, ASK_FORMAT, Some(format_keyboard())).await,
        NextStep::AskContainer => show(&bot, chat_id, message_id, ASK_CONTAINER, Some(container_keyboard())).await,
        NextStep::AskBackend => {
            show(
                &bot,
                chat_id,
                message_id,
                ASK_BACKEND,
                Some(backend_keyboard(&deps.registry)),
            )
            .await
        }
        NextStep::Start { backend_id } => {
            let Some((_, selection)) = deps.pending.remove(&key) else {
                return Ok(());
            };
            let request = DownloadRequest::new(
                deps.request_ids.allocate(),
                selection.url,
                backend_id,
                selection.format.unwrap_or_default(),
                selection.container.unwrap_or(OutputContainer::Video),
                CallerContext::FromCallback {
                    chat_id,
                    message_id,
                    origin_message_id: Some(selection.origin_message_id),
                },
            );
            spawn_run(&deps, request);
        }
    }
    Ok(())
}

async fn list_formats(bot: &Bot, chat_id: ChatId, message_id: MessageId, deps: &HandlerDeps) {
    let Some(url) = deps.pending.get(&(chat_id, message_id)).map(|s| s.url.clone()) else {
        show(bot, chat_id, message_id, EXPIRED, None).await;
        return;
    };
    show(bot, chat_id, message_id, "🔎 Looking up formats...", None).await;

    match deps.extractor.list_formats(&url).await {
        Ok(formats) if !formats.is_empty() => {
            show(bot, chat_id, message_id, ASK_FORMAT, Some(format_list_keyboard(&formats))).await
        }
        Ok(_) => {
            show(
                bot,
                chat_id,
                message_id,
                &format!("No formats listed for this link.\n\n{}", ASK_FORMAT),
                Some(format_keyboard()),
            )
            .await
        }
        Err(e) => {
            log::warn!("Failed to list formats for {}: {}", url, e);
            show(
                bot,
                chat_id,
                message_id,
                &format!("⚠️ Could not list formats.\n\n{}", ASK_FORMAT),
                Some(format_keyboard()),
            )
            .await
        }
    }
}

/// Replaces the dialog message; the keyboard is dropped when `markup` is `None`.
async fn show(bot: &Bot, chat_id: ChatId, message_id: MessageId, text: &str, markup: Option<InlineKeyboardMarkup>) {
    let request = bot.edit_message_text(chat_id, message_id, text.to_string());
    let result = match markup {
        Some(markup) => request.reply_markup(markup).await,
        None => request.await,
    };
    if let Err(e) = result {
        log::warn!("Failed to update dialog message {} in chat {}: {}", message_id.0, chat_id, e);
    }
}

/// Runs the request in the background so the dispatcher never waits on it.
fn spawn_run(deps: &HandlerDeps, request: DownloadRequest) {
    let orchestrator = Arc::clone(&deps.orchestrator);
    tokio::spawn(async move {
        let report = orchestrator.run(request).await;
        log::info!(
            "[{}] Pipeline finished: success={} states={:?}",
            report.request_id,
            report.outcome.is_success(),
            report.trace
        );
    });
}
