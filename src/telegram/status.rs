//! The single status message owned by one download request.
//!
//! Every progress line and the terminal outcome of a request are written into
//! the same message. Edits go through a per-message async mutex, so the
//! download phase and the upload phase (which run one after another, on
//! different tasks) can never interleave or reorder their writes.

use std::sync::Arc;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::Mutex;

use crate::core::error::AppError;
use crate::telegram::transport::ChatTransport;

/// Handle to a request's status message. Cheap to clone; clones share the edit lock.
#[derive(Clone)]
pub struct StatusMessage {
    transport: Arc<dyn ChatTransport>,
    chat_id: ChatId,
    message_id: MessageId,
    gate: Arc<Mutex<()>>,
}

impl std::fmt::Debug for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusMessage")
            .field("chat_id", &self.chat_id)
            .field("message_id", &self.message_id)
            .finish()
    }
}

impl StatusMessage {
    /// Wraps an already existing message (e.g. the keyboard message of a callback).
    pub fn existing(transport: Arc<dyn ChatTransport>, chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            transport,
            chat_id,
            message_id,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Sends a fresh message and wraps it.
    pub async fn send(transport: Arc<dyn ChatTransport>, chat_id: ChatId, text: &str) -> Result<Self, AppError> {
        let message_id = transport.send_message(chat_id, text).await?;
        Ok(Self::existing(transport, chat_id, message_id))
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Key identifying this message across the bot (used by the watcher registry).
    pub fn key(&self) -> (ChatId, MessageId) {
        (self.chat_id, self.message_id)
    }

    /// Replaces the message text. Failures are logged and reported as `false`.
    ///
    /// A rate-limited edit waits for the requested delay and is retried once.
    /// Dropping the future releases the edit lock, so callers may race it
    /// against cancellation.
    pub async fn edit(&self, text: &str) -> bool {
        let _guard = self.gate.lock().await;

        match self
            .transport
            .edit_message_text(self.chat_id, self.message_id, text)
            .await
        {
            Ok(()) => true,
            Err(e) if is_not_modified(&e) => true,
            Err(AppError::Telegram(teloxide::RequestError::RetryAfter(secs))) => {
                log::warn!(
                    "Rate limit hit when editing status message {} in chat {}: retry after {:?}",
                    self.message_id.0,
                    self.chat_id,
                    secs.duration()
                );
                tokio::time::sleep(secs.duration()).await;
                match self
                    .transport
                    .edit_message_text(self.chat_id, self.message_id, text)
                    .await
                {
                    Ok(()) => true,
                    Err(e) if is_not_modified(&e) => true,
                    Err(e) => {
                        log::warn!("Still failed to edit status message after rate limit wait: {}", e);
                        false
                    }
                }
            }
            Err(e) => {
                log::warn!(
                    "Failed to edit status message {} in chat {}: {}",
                    self.message_id.0,
                    self.chat_id,
                    e
                );
                false
            }
        }
    }

    /// Deletes the message that triggered the request, unless it is this status message.
    /// Deletion failures are logged, never surfaced.
    pub async fn delete_origin(&self, origin: Option<MessageId>) {
        let Some(origin) = origin else {
            return;
        };
        if origin == self.message_id {
            return;
        }
        match self.transport.delete_message(self.chat_id, origin).await {
            Ok(()) => log::info!("Deleted original user message: {}", origin.0),
            Err(e) => log::warn!("Could not delete original user message {}: {}", origin.0, e),
        }
    }
}

fn is_not_modified(err: &AppError) -> bool {
    err.to_string().contains("message is not modified")
}
