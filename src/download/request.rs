//! Download request descriptors.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use teloxide::types::{ChatId, MessageId};

use crate::core::config;

/// Identifier of one download request, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Hands out request ids from a monotonic counter.
#[derive(Debug, Default)]
pub struct RequestIdAllocator {
    next: AtomicU64,
}

impl RequestIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Output container requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputContainer {
    /// Audio only, transcoded to mp3
    Audio,
    /// Video in the container the extractor produced
    Video,
}

impl OutputContainer {
    /// Parses user/config spellings: `audio`/`mp3`, `video`/`mp4`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "audio" | "mp3" => Some(Self::Audio),
            "video" | "mp4" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Label shown in status messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Audio => "MP3 (audio)",
            Self::Video => "MP4 (video)",
        }
    }

    /// Container configured to be used without asking.
    pub fn configured_default() -> Option<Self> {
        config::DEFAULT_OUTPUT_FORMAT.as_deref().and_then(Self::parse)
    }
}

/// Where a request came from, resolved once when the request is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerContext {
    /// Selection dialog finished on an inline keyboard.
    ///
    /// `message_id` is the keyboard message, reused as the status message;
    /// `origin_message_id` is the user's URL message.
    FromCallback {
        chat_id: ChatId,
        message_id: MessageId,
        origin_message_id: Option<MessageId>,
    },
    /// Plain message handled without a dialog; a new status message is sent.
    FromMessage { chat_id: ChatId, message_id: MessageId },
}

impl CallerContext {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::FromCallback { chat_id, .. } | Self::FromMessage { chat_id, .. } => *chat_id,
        }
    }

    /// The user message to delete once the request reaches a terminal state.
    pub fn origin_message_id(&self) -> Option<MessageId> {
        match self {
            Self::FromCallback { origin_message_id, .. } => *origin_message_id,
            Self::FromMessage { message_id, .. } => Some(*message_id),
        }
    }
}

/// Everything needed to run one download. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub id: RequestId,
    pub source_url: String,
    pub backend_id: String,
    /// Concrete extractor format id or [`config::download::BEST_FORMAT`]
    pub source_format_selector: String,
    pub output_container: OutputContainer,
    pub caller_context: CallerContext,
}

impl DownloadRequest {
    pub fn new(
        id: RequestId,
        source_url: impl Into<String>,
        backend_id: impl Into<String>,
        source_format_selector: impl Into<String>,
        output_container: OutputContainer,
        caller_context: CallerContext,
    ) -> Self {
        let selector = source_format_selector.into();
        Self {
            id,
            source_url: source_url.into(),
            backend_id: backend_id.into(),
            source_format_selector: if selector.trim().is_empty() {
                config::download::BEST_FORMAT.to_string()
            } else {
                selector
            },
            output_container,
            caller_context,
        }
    }
}
