//! Bot initialization and command definitions
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - URL detection for plain messages

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Send me a link and I will store the media. Commands:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "list storage backends")]
    Backends,
    #[command(description = "show free space of every backend")]
    Storage,
    #[command(description = "list stored files, optionally filtered by name")]
    Files(String),
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token or invalid BOT_API_URL
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) is not set");
    }
    let bot = Bot::new(config::BOT_TOKEN.as_str());

    // Local Bot API server
    let bot = match std::env::var("BOT_API_URL") {
        Ok(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        Err(_) => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s<>]+").expect("url regex"));

/// First http(s) URL in a message text.
pub fn extract_url(text: &str) -> Option<String> {
    URL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ')', '!', '?']).to_string())
        .filter(|u| url::Url::parse(u).is_ok())
}
