//! Bot initialization, the command set and the reply keyboard.

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, KeyboardButton, KeyboardMarkup, Message};
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::telegram::Bot;

/// Reply keyboard labels. Incoming text equal to one of them is routed like
/// the matching command.
pub mod menu {
    pub const RANDOM: &str = "🎲 Tasodifiy kino";
    pub const MOVIES: &str = "🎞 Kinolar";
    pub const SEARCH: &str = "🔎 Qidiruv";
    pub const CHANNELS: &str = "📢 Kanallar";
    pub const SETTINGS: &str = "⚙️ Sozlamalar";
    pub const HELP: &str = "ℹ️ Yordam";
}

/// Bot commands enum with descriptions
///
/// Arguments are read from the message text by the handlers, so every variant
/// is a unit variant.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Buyruqlar:")]
pub enum Command {
    #[command(description = "botni ishga tushirish")]
    Start,
    #[command(description = "yordam")]
    Help,
    #[command(description = "tasodifiy kino")]
    Random,
    #[command(hide)]
    Randommovie,
    #[command(description = "kinolar ro'yxati")]
    Movies,
    #[command(description = "kino qidirish")]
    Qidir,
    #[command(description = "majburiy kanallar")]
    Channels,
    #[command(description = "taklif havolasi")]
    Referral,
    #[command(description = "sozlamalar")]
    Settings,
    #[command(hide)]
    Admin,
    #[command(hide)]
    Addmovie,
    #[command(hide)]
    Editmovie,
    #[command(hide)]
    Delmovie,
    #[command(hide)]
    Addchannel,
    #[command(hide)]
    Delchannel,
    #[command(hide)]
    Stats,
    #[command(hide)]
    Topmovies,
    #[command(hide)]
    GivePremium,
    #[command(hide)]
    RevokePremium,
    #[command(hide)]
    NewsAdd,
    #[command(hide)]
    NewsList,
    #[command(hide)]
    NewsSchedule,
    #[command(hide)]
    NewsUnschedule,
    #[command(hide)]
    Broadcast,
    #[command(hide)]
    Backup,
    #[command(hide)]
    Addadmin,
    #[command(hide)]
    Deladmin,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (invalid URL, client setup)
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    // Local Bot API server, if configured
    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot.set_api_url(url)
    } else {
        bot
    };

    Ok(bot)
}

/// Sets up the public commands shown in the Telegram menu
///
/// Admin commands stay hidden; admins get the list from `/admin`.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "botni ishga tushirish"),
        BotCommand::new("help", "yordam"),
        BotCommand::new("random", "tasodifiy kino"),
        BotCommand::new("movies", "kinolar ro'yxati"),
        BotCommand::new("qidir", "kino qidirish"),
        BotCommand::new("channels", "majburiy kanallar"),
        BotCommand::new("referral", "taklif havolasi"),
        BotCommand::new("settings", "sozlamalar"),
    ])
    .await?;

    Ok(())
}

/// The persistent reply keyboard shown after `/start`.
pub fn main_menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(menu::RANDOM), KeyboardButton::new(menu::MOVIES)],
        vec![KeyboardButton::new(menu::SEARCH), KeyboardButton::new(menu::CHANNELS)],
        vec![KeyboardButton::new(menu::SETTINGS), KeyboardButton::new(menu::HELP)],
    ])
    .resize_keyboard()
}

/// Telegram id of the sender, or 0 for channel posts and anonymous admins.
pub fn sender_id(msg: &Message) -> i64 {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(0)
}

/// Everything after the command token (`/cmd` or `/cmd@botname`), trimmed.
pub fn command_args(text: &str) -> &str {
    let text = text.trim_start();
    if !text.starts_with('/') {
        return text.trim();
    }
    match text.find(char::is_whitespace) {
        Some(pos) => text[pos..].trim(),
        None => "",
    }
}

/// First argument parsed as a Telegram id.
pub fn parse_id_arg(text: &str) -> Option<i64> {
    command_args(text).split_whitespace().next()?.parse().ok()
}

/// `/start <referrer_id>` payload, if it is a valid id.
pub fn start_referrer(text: &str) -> Option<i64> {
    parse_id_arg(text).filter(|id| *id > 0)
}

/// Text that selects the random movie: the menu label or the bare commands.
pub fn is_random_trigger(text: &str) -> bool {
    let text = text.trim();
    text.to_lowercase() == menu::RANDOM.to_lowercase()
        || text == "/random"
        || text == "/randommovie"
}

/// Digits-only text is a movie code.
pub fn parse_movie_code(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
