//! Recording `ChatTransport` mock

use async_trait::async_trait;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;
use teloxide::types::{ChatId, MessageId, Seconds};
use tubestash::core::error::AppError;
use tubestash::telegram::ChatTransport;

/// One recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send { chat_id: ChatId, text: String },
    Edit { message_id: MessageId, text: String },
    Delete { message_id: MessageId },
}

/// Records every call; sent messages get ids counting up from 100.
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI32,
    /// When set, every edit is rejected with `RetryAfter` and not recorded
    edit_retry_after: Option<u32>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(100),
            edit_retry_after: None,
        }
    }
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose edits are always rate limited for `secs` seconds.
    pub fn rate_limited(secs: u32) -> Self {
        Self {
            edit_retry_after: Some(secs),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edits_of(&self, message_id: MessageId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit { message_id: id, text } if id == message_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_edit_of(&self, message_id: MessageId) -> Option<String> {
        self.edits_of(message_id).pop()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete { message_id } => Some(message_id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<MessageId, AppError> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.calls.lock().unwrap().push(Call::Send {
            chat_id,
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn edit_message_text(
        &self,
        _chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), AppError> {
        if let Some(secs) = self.edit_retry_after {
            return Err(teloxide::RequestError::RetryAfter(Seconds::from_seconds(secs)).into());
        }
        self.calls.lock().unwrap().push(Call::Edit {
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, _chat_id: ChatId, message_id: MessageId) -> Result<(), AppError> {
        self.calls.lock().unwrap().push(Call::Delete { message_id });
        Ok(())
    }
}
