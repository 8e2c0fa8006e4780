//! The chat transport seam.
//!
//! All status communication in the pipeline goes through exactly three
//! operations: send, edit, delete. `TeloxideTransport` is the production
//! implementation; tests plug in a recording mock.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::MessageId;

use crate::core::error::AppError;

/// Minimal chat API used by the download pipeline. All texts are plain, never parsed.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends a new message and returns its id.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<MessageId, AppError>;

    /// Replaces the text of an existing message.
    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), AppError>;

    /// Deletes a message.
    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), AppError>;
}

/// `ChatTransport` backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TeloxideTransport {
    bot: Bot,
}

impl TeloxideTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TeloxideTransport {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<MessageId, AppError> {
        let msg = self.bot.send_message(chat_id, text.to_string()).await?;
        Ok(msg.id)
    }

    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), AppError> {
        self.bot
            .edit_message_text(chat_id, message_id, text.to_string())
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), AppError> {
        self.bot.delete_message(chat_id, message_id).await?;
        Ok(())
    }
}
