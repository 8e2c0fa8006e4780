//! Command handler implementations (/start, /help, /backends, /storage, /files)
//!
//! The `render_*` helpers are shared with the CLI subcommands.

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use super::types::{HandlerDeps, HandlerError};
use crate::core::utils::format_size;
use crate::storage::capacity::CapacityMonitor;
use crate::storage::files::{list_files, StoredFile};
use crate::storage::registry::{BackendKind, BackendRegistry};
use crate::telegram::bot::Command;

/// Maximum number of files listed by /files
pub const FILES_LIMIT: usize = 20;

pub fn start_text() -> String {
    "👋 Hi! Send me a link to a video or a track.\n\n\
     I will download it, convert it to MP3 or MP4 and put it into your storage.\n\
     /help lists everything else I can do."
        .to_string()
}

pub fn help_text() -> String {
    Command::descriptions().to_string()
}

/// Every backend the registry knows about, with its liveness.
pub fn render_backends(registry: &BackendRegistry) -> String {
    let mut text = String::from("💾 Storage backends:\n");
    for backend in registry.backends() {
        let state = match backend.kind {
            BackendKind::Local => "always available",
            BackendKind::Remote if backend.is_live => "🟢 sync running",
            BackendKind::Remote => "🔴 sync not running",
        };
        text.push_str(&format!(
            "\n• {} ({}): {}\n  {}",
            backend.display_name,
            backend.id,
            state,
            backend.root_path.display()
        ));
    }
    if let Some(default) = registry.default_backend() {
        text.push_str(&format!("\n\nDefault: {}", default));
    }
    text
}

/// Capacity report of every available backend.
pub async fn render_storage(registry: &BackendRegistry, capacity: &CapacityMonitor) -> String {
    let mut sections = Vec::new();
    for backend in registry.available_backends() {
        let section = match capacity.status_report(&backend.id, &backend.root_path).await {
            Some(report) => report,
            None => format!("❓ {} Storage (unavailable)", backend.id.to_uppercase()),
        };
        sections.push(section);
    }
    sections.join("\n\n")
}

pub fn render_files(files: &[StoredFile], query: Option<&str>) -> String {
    if files.is_empty() {
        return match query {
            Some(q) => format!("🔍 No stored files match \"{}\".", q),
            None => "📭 No stored files yet.".to_string(),
        };
    }
    let mut text = match query {
        Some(q) => format!("🔍 Files matching \"{}\":\n", q),
        None => "📂 Latest files:\n".to_string(),
    };
    for file in files {
        text.push_str(&format!(
            "\n• {} ({}, {}, {})",
            file.name,
            format_size(file.size_bytes),
            file.backend_id,
            file.modified.format("%Y-%m-%d %H:%M")
        ));
    }
    text
}

/// Dispatches a parsed bot command.
pub(super) async fn handle_command(bot: Bot, msg: Message, cmd: Command, deps: HandlerDeps) -> Result<(), HandlerError> {
    log::info!("Command {:?} from chat {}", cmd, msg.chat.id);
    let text = match cmd {
        Command::Start => start_text(),
        Command::Help => help_text(),
        Command::Backends => render_backends(&deps.registry),
        Command::Storage => render_storage(&deps.registry, &deps.capacity).await,
        Command::Files(query) => {
            let query = Some(query.trim()).filter(|q| !q.is_empty());
            let registry = deps.registry.clone();
            let owned = query.map(str::to_string);
            let files = tokio::task::spawn_blocking(move || list_files(&registry, owned.as_deref(), FILES_LIMIT)).await?;
            render_files(&files, query)
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
