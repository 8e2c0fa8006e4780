//! Selection dialog: source format, then output container, then backend.
//!
//! Steps that have nothing to choose from are skipped: a configured default
//! container skips the container question, and the backend question is only
//! asked when [`BackendRegistry::should_prompt_user`] says so.

use std::time::{Duration, Instant};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};

use crate::core::config;
use crate::download::extractor::FormatOption;
use crate::download::request::OutputContainer;
use crate::storage::registry::{BackendRegistry, LOCAL_BACKEND};

const FORMAT_PREFIX: &str = "fmt:";
const CONTAINER_PREFIX: &str = "ct:";
const BACKEND_PREFIX: &str = "be:";
const LIST_FORMATS: &str = "fmt_list";
const ABORT: &str = "abort";

/// Maximum number of format buttons offered
pub const MAX_FORMAT_BUTTONS: usize = 24;

/// A button press in the selection dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Format(String),
    ListFormats,
    Container(OutputContainer),
    Backend(String),
    Abort,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if data == LIST_FORMATS {
            return Some(Self::ListFormats);
        }
        if data == ABORT {
            return Some(Self::Abort);
        }
        if let Some(format) = data.strip_prefix(FORMAT_PREFIX) {
            return (!format.is_empty()).then(|| Self::Format(format.to_string()));
        }
        if let Some(container) = data.strip_prefix(CONTAINER_PREFIX) {
            return OutputContainer::parse(container).map(Self::Container);
        }
        if let Some(backend) = data.strip_prefix(BACKEND_PREFIX) {
            return (!backend.is_empty()).then(|| Self::Backend(backend.to_string()));
        }
        None
    }

    pub fn to_data(&self) -> String {
        match self {
            Self::Format(f) => format!("{}{}", FORMAT_PREFIX, f),
            Self::ListFormats => LIST_FORMATS.to_string(),
            Self::Container(c) => format!("{}{}", CONTAINER_PREFIX, c.as_str()),
            Self::Backend(b) => format!("{}{}", BACKEND_PREFIX, b),
            Self::Abort => ABORT.to_string(),
        }
    }
}

/// Choices collected so far for one keyboard message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelection {
    pub url: String,
    pub origin_message_id: MessageId,
    pub format: Option<String>,
    pub container: Option<OutputContainer>,
    pub created_at: Instant,
}

impl PendingSelection {
    pub fn new(url: impl Into<String>, origin_message_id: MessageId) -> Self {
        Self {
            url: url.into(),
            origin_message_id,
            format: None,
            container: None,
            created_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

/// What the dialog needs next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    AskFormat,
    AskContainer,
    AskBackend,
    Start { backend_id: String },
}

/// Decides the next step, filling in the default container when one is configured.
pub fn next_step(
    selection: &mut PendingSelection,
    default_container: Option<OutputContainer>,
    registry: &BackendRegistry,
) -> NextStep {
    if selection.format.is_none() {
        return NextStep::AskFormat;
    }
    if selection.container.is_none() {
        match default_container {
            Some(container) => selection.container = Some(container),
            None => return NextStep::AskContainer,
        }
    }
    if registry.should_prompt_user() {
        return NextStep::AskBackend;
    }
    NextStep::Start {
        backend_id: implicit_backend(registry),
    }
}

/// Backend used when the user is not asked: the live default, else local.
pub fn implicit_backend(registry: &BackendRegistry) -> String {
    registry
        .default_backend()
        .unwrap_or_else(|| LOCAL_BACKEND.to_string())
}

fn button(label: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label.into(), action.to_data())
}

fn abort_row() -> Vec<InlineKeyboardButton> {
    vec![button("✖️ Cancel", CallbackAction::Abort)]
}

pub fn format_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button(
            "⭐ Best quality",
            CallbackAction::Format(config::download::BEST_FORMAT.to_string()),
        )],
        vec![button("📋 Select format", CallbackAction::ListFormats)],
        abort_row(),
    ])
}

pub fn format_list_keyboard(formats: &[FormatOption]) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![button(
        "⭐ Best quality",
        CallbackAction::Format(config::download::BEST_FORMAT.to_string()),
    )]];
    rows.extend(
        formats
            .iter()
            .take(MAX_FORMAT_BUTTONS)
            .map(|f| vec![button(f.label(), CallbackAction::Format(f.format_id.clone()))]),
    );
    rows.push(abort_row());
    InlineKeyboardMarkup::new(rows)
}

pub fn container_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("🎵 MP3", CallbackAction::Container(OutputContainer::Audio)),
            button("🎬 MP4", CallbackAction::Container(OutputContainer::Video)),
        ],
        abort_row(),
    ])
}

pub fn backend_keyboard(registry: &BackendRegistry) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = registry
        .available_backends()
        .into_iter()
        .map(|b| vec![button(b.display_name, CallbackAction::Backend(b.id))])
        .collect();
    rows.push(abort_row());
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::registry::{validate_backend_id, StorageSettings, MAX_BACKEND_ID_LEN};
    use pretty_assertions::assert_eq;

    fn heartbeat(root: &std::path::Path, id: &str) {
        let dir = root.join(id);
        std::fs::create_dir_all(&dir).unwrap();
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        std::fs::write(dir.join(".heartbeat"), now.to_string()).unwrap();
    }

    #[test]
    fn test_callback_roundtrip_and_garbage() {
        for action in [
            CallbackAction::Format("137".to_string()),
            CallbackAction::ListFormats,
            CallbackAction::Container(OutputContainer::Video),
            CallbackAction::Backend("gdrive".to_string()),
            CallbackAction::Abort,
        ] {
            assert_eq!(CallbackAction::parse(&action.to_data()), Some(action));
        }
        assert_eq!(CallbackAction::parse("fmt:"), None);
        assert_eq!(CallbackAction::parse("ct:flac"), None);
        assert_eq!(CallbackAction::parse("menu:main"), None);
    }

    #[test]
    fn test_longest_backend_id_fits_callback_data() {
        let id = "r".repeat(MAX_BACKEND_ID_LEN);
        assert!(validate_backend_id(&id).is_ok());
        assert!(CallbackAction::Backend(id).to_data().len() <= 64);
    }

    #[test]
    fn test_next_step_walks_the_dialog() {
        let tmp = tempfile::tempdir().unwrap();
        heartbeat(tmp.path(), "gdrive");
        let registry = BackendRegistry::new(StorageSettings::new(tmp.path()));
        let mut sel = PendingSelection::new("https://x/1", MessageId(1));

        assert_eq!(next_step(&mut sel, None, &registry), NextStep::AskFormat);
        sel.format = Some("best".to_string());
        assert_eq!(next_step(&mut sel, None, &registry), NextStep::AskContainer);
        assert_eq!(next_step(&mut sel, Some(OutputContainer::Audio), &registry), NextStep::AskBackend);
        assert_eq!(sel.container, Some(OutputContainer::Audio));
    }

    #[test]
    fn test_single_backend_starts_without_asking() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = BackendRegistry::new(StorageSettings::new(tmp.path()));
        let mut sel = PendingSelection::new("https://x/1", MessageId(1));
        sel.format = Some("best".to_string());
        sel.container = Some(OutputContainer::Video);
        assert_eq!(
            next_step(&mut sel, None, &registry),
            NextStep::Start {
                backend_id: "local".to_string()
            }
        );
    }

    #[test]
    fn test_live_default_backend_is_implicit() {
        let tmp = tempfile::tempdir().unwrap();
        heartbeat(tmp.path(), "gdrive");
        let registry = BackendRegistry::new(StorageSettings::new(tmp.path()).with_default_backend("gdrive"));
        assert_eq!(implicit_backend(&registry), "gdrive");
    }
}
