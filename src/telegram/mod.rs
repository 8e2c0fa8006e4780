//! Telegram front-end: dispatcher glue, selection dialog and the chat transport.

pub mod bot;
pub mod dialog;
pub mod handlers;
pub mod messages;
pub mod status;
pub mod transport;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use status::StatusMessage;
pub use transport::{ChatTransport, TeloxideTransport};
