//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.
//! The handlers are organized in a testable way, allowing integration tests
//! to use the same handler tree as production code.

mod callbacks;
mod commands;
mod schema;
mod types;

pub use commands::{help_text, render_backends, render_files, render_storage, start_text, FILES_LIMIT};
pub use schema::schema;
pub use types::{HandlerDeps, HandlerError, PendingSelections};
