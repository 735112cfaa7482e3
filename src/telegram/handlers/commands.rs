//! Command handler implementations (/start, /help, /referral, /settings)

use fluent_templates::fluent_bundle::FluentArgs;
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{ensure_user_exists, HandlerDeps, HandlerError, UserInfo};
use crate::i18n;
use crate::storage::db;
use crate::storage::get_connection;
use crate::telegram::bot::{main_menu_keyboard, start_referrer};
use crate::telegram::catalog::language_keyboard;
use crate::telegram::Bot;

/// Handle /start command
///
/// Registers the sender (with the referrer from `/start <id>`), greets them
/// and shows the reply keyboard.
pub(super) async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user = UserInfo::from_message(msg);
    let referrer = msg.text().and_then(start_referrer);
    let registration = ensure_user_exists(&deps.db_pool, &user, referrer);

    let lang = i18n::user_lang_from_pool(&deps.db_pool, user.user_id);
    let mut args = FluentArgs::new();
    args.set("name", user.first_name.clone().unwrap_or_default());

    bot.send_message(msg.chat.id, i18n::t_args(&lang, "start-welcome", &args))
        .reply_markup(main_menu_keyboard())
        .await?;

    if registration.is_some_and(|r| r.referral_applied) {
        bot.send_message(msg.chat.id, i18n::t(&lang, "start-referral-applied"))
            .await?;
    }
    Ok(())
}

/// Handle /help command
pub(super) async fn handle_help_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let lang = i18n::user_lang_from_pool(&deps.db_pool, UserInfo::from_message(msg).user_id);
    bot.send_message(msg.chat.id, i18n::t(&lang, "help-text"))
        .reply_markup(main_menu_keyboard())
        .await?;
    Ok(())
}

/// Personal invite link. Falls back to a plain payload when the bot has no username.
pub fn referral_link(bot_username: Option<&str>, user_id: i64) -> String {
    match bot_username {
        Some(username) => format!("https://t.me/{}?start={}", username, user_id),
        None => format!("/start {}", user_id),
    }
}

/// Handle /referral command
pub(super) async fn handle_referral_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user_id = UserInfo::from_message(msg).user_id;
    let lang = i18n::user_lang_from_pool(&deps.db_pool, user_id);

    let count = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_user(&conn, user_id)?.map(|u| u.referrals).unwrap_or_default()
    };

    let mut args = FluentArgs::new();
    args.set("link", referral_link(deps.bot_username.as_deref(), user_id));
    args.set("count", count);
    bot.send_message(msg.chat.id, i18n::t_args(&lang, "referral-text", &args))
        .await?;
    Ok(())
}

/// Handle /settings command: inline language picker
pub(super) async fn handle_settings_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let lang = i18n::user_lang_from_pool(&deps.db_pool, UserInfo::from_message(msg).user_id);
    bot.send_message(msg.chat.id, i18n::t(&lang, "settings-choose-language"))
        .reply_markup(language_keyboard())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referral_link() {
        assert_eq!(referral_link(Some("kino_bot"), 42), "https://t.me/kino_bot?start=42");
        assert_eq!(referral_link(None, 42), "/start 42");
    }
}
