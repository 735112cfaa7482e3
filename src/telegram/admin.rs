//! Admin functionality for the Telegram bot
//!
//! This module contains all admin-related commands:
//! - Catalog management (/addmovie wizard, /editmovie, /delmovie)
//! - Mandatory channels, premium grants and the admin set
//! - News drafts, broadcasts, statistics and backups

use std::sync::Arc;

use anyhow::Result;
use fluent_templates::fluent_bundle::FluentArgs;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use unic_langid::LanguageIdentifier;

use crate::core::chart::{chart_legend, render_views_chart};
use crate::core::config;
use crate::i18n;
use crate::storage::backup::{create_backup, list_backups};
use crate::storage::catalog::{self, MovieEdit, MovieFilter};
use crate::storage::db::{self, ChannelInsert, DbPool};
use crate::storage::get_connection;
use crate::telegram::bot::{command_args, parse_id_arg};
use crate::telegram::broadcast::broadcast_text;
use crate::telegram::catalog::{format_movie_lines, split_message, truncate_chars, CAPTION_LIMIT, MESSAGE_LIMIT};
use crate::telegram::conversation::{
    is_affirmative, parse_news_line, wizard_input, Conversation, ConversationStore, Transition, WizardInput,
};
use crate::telegram::Bot;

/// Checks the admin set. Lookup failures count as "not an admin".
pub fn is_admin(db_pool: &Arc<DbPool>, user_id: i64) -> bool {
    let result = get_connection(db_pool)
        .map_err(anyhow::Error::from)
        .and_then(|conn| db::is_admin(&conn, user_id).map_err(anyhow::Error::from));
    match result {
        Ok(flag) => flag,
        Err(e) => {
            log::error!("Admin lookup for {} failed: {}", user_id, e);
            false
        }
    }
}

/// Replies with the denial text and returns `false` when the user is not an admin.
async fn ensure_admin(bot: &Bot, chat_id: ChatId, user_id: i64, db_pool: &Arc<DbPool>) -> Result<bool> {
    if is_admin(db_pool, user_id) {
        return Ok(true);
    }
    log::warn!("Unauthorized admin command attempt by {}", user_id);
    let lang = i18n::user_lang_from_pool(db_pool, user_id);
    bot.send_message(chat_id, i18n::t(&lang, "admin-denied")).await?;
    Ok(false)
}

fn id_args(key: &str, id: i64) -> FluentArgs<'static> {
    let mut args = FluentArgs::new();
    args.set(key.to_string(), id);
    args
}

async fn reply_id_usage(bot: &Bot, chat_id: ChatId, lang: &LanguageIdentifier, example: &str) -> Result<()> {
    let mut args = FluentArgs::new();
    args.set("example", example.to_string());
    bot.send_message(chat_id, i18n::t_args(lang, "admin-usage-id", &args)).await?;
    Ok(())
}

/// `/admin`: the command reference and the current admin set.
pub async fn handle_admin_command(bot: &Bot, chat_id: ChatId, user_id: i64, db_pool: Arc<DbPool>) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);
    let admins = {
        let conn = get_connection(&db_pool)?;
        db::list_admins(&conn)?
    };

    let mut args = FluentArgs::new();
    args.set(
        "admins",
        admins.iter().map(i64::to_string).collect::<Vec<_>>().join(", "),
    );
    let text = format!(
        "{}\n\n{}",
        i18n::t(&lang, "admin-panel"),
        i18n::t_args(&lang, "admin-list", &args)
    );
    bot.send_message(chat_id, text).await?;
    Ok(())
}

// ==================== Add-movie wizard and news drafts ====================

/// `/addmovie`: starts (or restarts) the wizard.
pub async fn handle_addmovie_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    db_pool: Arc<DbPool>,
    conversations: &ConversationStore,
) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let state = conversations.start_add_movie(user_id);
    log::info!("Admin {} started the add-movie wizard", user_id);

    let lang = i18n::user_lang_from_pool(&db_pool, user_id);
    bot.send_message(chat_id, i18n::t(&lang, state.prompt_key())).await?;
    Ok(())
}

/// `/news_add`: the next message from this admin becomes a news item.
pub async fn handle_news_add_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    db_pool: Arc<DbPool>,
    conversations: &ConversationStore,
) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    conversations.start_news(user_id);

    let lang = i18n::user_lang_from_pool(&db_pool, user_id);
    bot.send_message(chat_id, i18n::t(&lang, "news-prompt")).await?;
    Ok(())
}

/// What to tell the admin after one dialogue step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationReply {
    /// Ask the question behind this locale key
    Prompt(&'static str),
    MovieSaved(i64),
    /// Dialogue dropped; locale key of the explanation
    Aborted(&'static str),
    SaveFailed,
    NewsSaved(i64),
    NewsInvalid,
}

/// Feeds one message into the user's dialogue, persisting what it completes.
///
/// Returns `None` when the user has no dialogue in progress.
pub fn advance_conversation(
    conversations: &ConversationStore,
    db_pool: &Arc<DbPool>,
    user_id: i64,
    input: WizardInput,
) -> Option<ConversationReply> {
    let conversation = conversations.take(user_id)?;

    let reply = match conversation {
        Conversation::AddMovie(state) => match state.advance(input, user_id) {
            Transition::Next(next) => {
                let key = next.prompt_key();
                conversations.put(user_id, Conversation::AddMovie(next));
                ConversationReply::Prompt(key)
            }
            Transition::Abort(reason) => {
                log::info!("Add-movie wizard of {} aborted: {:?}", user_id, reason);
                ConversationReply::Aborted(reason.message_key())
            }
            Transition::Commit(movie) => {
                let saved = get_connection(db_pool)
                    .map_err(anyhow::Error::from)
                    .and_then(|conn| catalog::create_movie(&conn, &movie).map_err(anyhow::Error::from));
                match saved {
                    Ok(id) => {
                        log::info!("Movie {} '{}' added by {}", id, movie.name, user_id);
                        ConversationReply::MovieSaved(id)
                    }
                    Err(e) => {
                        log::error!("Failed to save movie from wizard of {}: {}", user_id, e);
                        ConversationReply::SaveFailed
                    }
                }
            }
        },
        Conversation::AwaitNews => {
            let WizardInput::Text(line) = input else {
                return Some(ConversationReply::NewsInvalid);
            };
            match parse_news_line(&line) {
                Ok(draft) => {
                    let saved = get_connection(db_pool).map_err(anyhow::Error::from).and_then(|conn| {
                        db::add_news(&conn, draft.kind, &draft.caption, &draft.content).map_err(anyhow::Error::from)
                    });
                    match saved {
                        Ok(id) => {
                            log::info!("News {} ({}) added by {}", id, draft.kind, user_id);
                            ConversationReply::NewsSaved(id)
                        }
                        Err(e) => {
                            log::error!("Failed to save news from {}: {}", user_id, e);
                            ConversationReply::SaveFailed
                        }
                    }
                }
                Err(e) => {
                    log::info!("Rejected news draft from {}: {}", user_id, e);
                    ConversationReply::NewsInvalid
                }
            }
        }
    };
    Some(reply)
}

/// Renders a dialogue reply in the admin's language.
pub fn conversation_reply_text(lang: &LanguageIdentifier, reply: &ConversationReply) -> String {
    match reply {
        ConversationReply::Prompt(key) | ConversationReply::Aborted(key) => i18n::t(lang, key),
        ConversationReply::MovieSaved(id) => i18n::t_args(lang, "wizard-saved", &id_args("id", *id)),
        ConversationReply::SaveFailed => i18n::t(lang, "wizard-save-failed"),
        ConversationReply::NewsSaved(id) => i18n::t_args(lang, "news-saved", &id_args("id", *id)),
        ConversationReply::NewsInvalid => i18n::t(lang, "news-invalid"),
    }
}

/// Handles a message from a user with a dialogue in progress.
pub async fn handle_conversation_message(
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    db_pool: Arc<DbPool>,
    conversations: &ConversationStore,
) -> Result<()> {
    let input = wizard_input(msg);
    let Some(reply) = advance_conversation(conversations, &db_pool, user_id, input) else {
        return Ok(());
    };
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);
    bot.send_message(msg.chat.id, conversation_reply_text(&lang, &reply)).await?;
    Ok(())
}

// ==================== Catalog management ====================

/// Parses `<id> <field> <value>` for `/editmovie`.
///
/// Fields: name, description, genre, premium. The value is the rest of the line.
pub fn parse_movie_edit(args: &str) -> Option<(i64, MovieEdit)> {
    let mut parts = args.trim().splitn(3, char::is_whitespace);
    let id: i64 = parts.next()?.parse().ok()?;
    let field = parts.next()?.to_lowercase();
    let value = parts.next()?.trim();
    if value.is_empty() {
        return None;
    }

    let mut edit = MovieEdit::default();
    match field.as_str() {
        "name" => edit.name = Some(value.to_string()),
        "description" => edit.description = Some(value.to_string()),
        "genre" => edit.genre = Some(value.to_string()),
        "premium" => edit.premium = Some(is_affirmative(value)),
        _ => return None,
    }
    Some((id, edit))
}

/// `/editmovie <id> <field> <value>`
pub async fn handle_editmovie_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    message_text: &str,
    db_pool: Arc<DbPool>,
) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let Some((movie_id, edit)) = parse_movie_edit(command_args(message_text)) else {
        bot.send_message(chat_id, i18n::t(&lang, "editmovie-usage")).await?;
        return Ok(());
    };

    let updated = {
        let conn = get_connection(&db_pool)?;
        catalog::edit_movie(&conn, movie_id, &edit)?
    };
    let text = if updated == 0 {
        i18n::t(&lang, "movie-not-found")
    } else {
        log::info!("Movie {} edited by {}: {:?}", movie_id, user_id, edit);
        i18n::t_args(&lang, "editmovie-done", &id_args("id", movie_id))
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}

/// `/delmovie [id]`. Without arguments lists the movies that can be deleted;
/// an argument that is not an id is rejected.
pub async fn handle_delmovie_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    message_text: &str,
    db_pool: Arc<DbPool>,
) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    if !command_args(message_text).trim().is_empty() {
        let Some(movie_id) = parse_id_arg(message_text) else {
            bot.send_message(chat_id, i18n::t(&lang, "invalid-id")).await?;
            return Ok(());
        };

        let deleted = {
            let conn = get_connection(&db_pool)?;
            catalog::delete_movie(&conn, movie_id)?
        };
        let text = if deleted == 0 {
            i18n::t(&lang, "movie-not-found")
        } else {
            log::info!("Movie {} deleted by {}", movie_id, user_id);
            i18n::t_args(&lang, "delmovie-done", &id_args("id", movie_id))
        };
        bot.send_message(chat_id, text).await?;
        return Ok(());
    }

    let movies = {
        let conn = get_connection(&db_pool)?;
        catalog::list_movies(
            &conn,
            &MovieFilter {
                limit: config::catalog::DELETE_LISTING_LIMIT,
                ..MovieFilter::default()
            },
        )?
    };
    if movies.is_empty() {
        bot.send_message(chat_id, i18n::t(&lang, "catalog-empty")).await?;
        return Ok(());
    }

    let mut args = FluentArgs::new();
    args.set("movies", format_movie_lines(&movies));
    for part in split_message(&i18n::t_args(&lang, "delmovie-list", &args), MESSAGE_LIMIT) {
        bot.send_message(chat_id, part).await?;
    }
    Ok(())
}

// ==================== Channels ====================

fn channel_args(channel: &str) -> FluentArgs<'static> {
    let mut args = FluentArgs::new();
    args.set("channel", channel.to_string());
    args
}

/// `/addchannel <@handle|chat id>`
pub async fn handle_addchannel_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    message_text: &str,
    db_pool: Arc<DbPool>,
) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let Some(channel) = command_args(message_text).split_whitespace().next() else {
        let mut args = FluentArgs::new();
        args.set("example", "/addchannel @kanal");
        bot.send_message(chat_id, i18n::t_args(&lang, "channel-usage", &args)).await?;
        return Ok(());
    };

    let channel = db::normalize_channel(channel);
    let outcome = {
        let conn = get_connection(&db_pool)?;
        db::add_channel(&conn, &channel)?
    };
    let key = match outcome {
        ChannelInsert::Added => {
            log::info!("Channel {} added by {}", channel, user_id);
            "channel-added"
        }
        ChannelInsert::AlreadyExists => "channel-exists",
    };
    bot.send_message(chat_id, i18n::t_args(&lang, key, &channel_args(&channel))).await?;
    Ok(())
}

/// `/delchannel <@handle|chat id>`
pub async fn handle_delchannel_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    message_text: &str,
    db_pool: Arc<DbPool>,
) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let Some(channel) = command_args(message_text).split_whitespace().next() else {
        let mut args = FluentArgs::new();
        args.set("example", "/delchannel @kanal");
        bot.send_message(chat_id, i18n::t_args(&lang, "channel-usage", &args)).await?;
        return Ok(());
    };

    let channel = db::normalize_channel(channel);
    let removed = {
        let conn = get_connection(&db_pool)?;
        db::remove_channel(&conn, &channel)?
    };
    let key = if removed == 0 {
        "channel-not-found"
    } else {
        log::info!("Channel {} removed by {}", channel, user_id);
        "channel-removed"
    };
    bot.send_message(chat_id, i18n::t_args(&lang, key, &channel_args(&channel))).await?;
    Ok(())
}

// ==================== Statistics ====================

/// `/stats`
pub async fn handle_stats_command(bot: &Bot, chat_id: ChatId, user_id: i64, db_pool: Arc<DbPool>) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let mut args = FluentArgs::new();
    {
        let conn = get_connection(&db_pool)?;
        args.set("users", db::count_users(&conn)?);
        args.set("premium", db::count_premium_users(&conn)?);
        args.set("movies", catalog::count_movies(&conn)?);
        args.set("channels", db::list_channels(&conn)?.len());
    }
    bot.send_message(chat_id, i18n::t_args(&lang, "stats-text", &args)).await?;
    Ok(())
}

/// `/topmovies`: bar chart of the most viewed movies with a numbered legend.
pub async fn handle_topmovies_command(bot: &Bot, chat_id: ChatId, user_id: i64, db_pool: Arc<DbPool>) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let top = {
        let conn = get_connection(&db_pool)?;
        catalog::top_movies_by_views(&conn, config::catalog::TOP_LIMIT)?
    };
    if top.is_empty() {
        bot.send_message(chat_id, i18n::t(&lang, "catalog-empty")).await?;
        return Ok(());
    }

    let entries: Vec<(String, i64)> = top.iter().map(|m| (m.name.clone(), m.views)).collect();
    let values: Vec<i64> = entries.iter().map(|(_, views)| *views).collect();
    let rendered = tokio::task::spawn_blocking(move || render_views_chart(&values)).await?;

    let mut args = FluentArgs::new();
    args.set("movies", chart_legend(&entries));
    let caption = truncate_chars(&i18n::t_args(&lang, "top-caption", &args), CAPTION_LIMIT);

    match rendered {
        Ok(chart) => {
            bot.send_photo(chat_id, InputFile::file(chart.path().to_path_buf()))
                .caption(caption)
                .await?;
        }
        Err(e) => {
            log::error!("Failed to render top movies chart: {}", e);
            bot.send_message(chat_id, caption).await?;
        }
    }
    Ok(())
}

// ==================== Premium ====================

/// `/give_premium <user_id>`
pub async fn handle_give_premium_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    message_text: &str,
    db_pool: Arc<DbPool>,
) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let Some(target) = parse_id_arg(message_text) else {
        return reply_id_usage(bot, chat_id, &lang, "/give_premium 123456789").await;
    };

    {
        let conn = get_connection(&db_pool)?;
        db::grant_premium(&conn, target)?;
    }
    log::info!("Premium granted to {} by {}", target, user_id);
    bot.send_message(chat_id, i18n::t_args(&lang, "premium-granted", &id_args("id", target)))
        .await?;
    Ok(())
}

/// `/revoke_premium <user_id>`
pub async fn handle_revoke_premium_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    message_text: &str,
    db_pool: Arc<DbPool>,
) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let Some(target) = parse_id_arg(message_text) else {
        return reply_id_usage(bot, chat_id, &lang, "/revoke_premium 123456789").await;
    };

    let updated = {
        let conn = get_connection(&db_pool)?;
        db::revoke_premium(&conn, target)?
    };
    let key = if updated == 0 {
        "premium-user-not-found"
    } else {
        log::info!("Premium revoked from {} by {}", target, user_id);
        "premium-revoked"
    };
    bot.send_message(chat_id, i18n::t_args(&lang, key, &id_args("id", target))).await?;
    Ok(())
}

// ==================== News and broadcasts ====================

/// `/news_list`: latest news items, scheduled ones marked with ⏰.
pub async fn handle_news_list_command(bot: &Bot, chat_id: ChatId, user_id: i64, db_pool: Arc<DbPool>) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let items = {
        let conn = get_connection(&db_pool)?;
        db::list_news(&conn, 20)?
    };
    if items.is_empty() {
        bot.send_message(chat_id, i18n::t(&lang, "news-empty")).await?;
        return Ok(());
    }

    let lines = items
        .iter()
        .map(|n| {
            let marker = if n.scheduled { " ⏰" } else { "" };
            let label = if n.caption.is_empty() { &n.content } else { &n.caption };
            format!("#{} [{}] {}{}", n.id, n.kind, truncate_chars(label, 60), marker)
        })
        .collect::<Vec<_>>()
        .join("\n");
    let text = format!("{}\n{}", i18n::t(&lang, "news-header"), lines);
    for part in split_message(&text, MESSAGE_LIMIT) {
        bot.send_message(chat_id, part).await?;
    }
    Ok(())
}

/// `/news_schedule <id>` and `/news_unschedule <id>`
pub async fn handle_news_schedule_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    message_text: &str,
    scheduled: bool,
    db_pool: Arc<DbPool>,
) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let Some(news_id) = parse_id_arg(message_text) else {
        let example = if scheduled { "/news_schedule 1" } else { "/news_unschedule 1" };
        return reply_id_usage(bot, chat_id, &lang, example).await;
    };

    let updated = {
        let conn = get_connection(&db_pool)?;
        db::set_news_scheduled(&conn, news_id, scheduled)?
    };
    let key = match (updated, scheduled) {
        (0, _) => "news-not-found",
        (_, true) => "news-scheduled",
        (_, false) => "news-unscheduled",
    };
    bot.send_message(chat_id, i18n::t_args(&lang, key, &id_args("id", news_id))).await?;
    Ok(())
}

/// `/broadcast <text>`: sends the text to every known user.
pub async fn handle_broadcast_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    message_text: &str,
    db_pool: Arc<DbPool>,
) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let text = command_args(message_text);
    if text.is_empty() {
        bot.send_message(chat_id, i18n::t(&lang, "broadcast-usage")).await?;
        return Ok(());
    }

    let recipients = {
        let conn = get_connection(&db_pool)?;
        db::get_all_user_ids(&conn)?
    };
    bot.send_message(chat_id, i18n::t(&lang, "broadcast-started")).await?;

    log::info!("Broadcast by {} to {} user(s)", user_id, recipients.len());
    let report = broadcast_text(bot, &recipients, text).await;
    log::info!(
        "Broadcast finished: {}/{} delivered, {} failed",
        report.delivered,
        report.total,
        report.failed
    );

    let mut args = FluentArgs::new();
    args.set("delivered", report.delivered);
    args.set("total", report.total);
    bot.send_message(chat_id, i18n::t_args(&lang, "broadcast-done", &args)).await?;
    Ok(())
}

// ==================== Backup ====================

/// `/backup`: on-demand copy of the database.
pub async fn handle_backup_command(bot: &Bot, chat_id: ChatId, user_id: i64, db_pool: Arc<DbPool>) -> Result<()> {
    if !ensure_admin(bot, chat_id, user_id, &db_pool).await? {
        return Ok(());
    }
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);

    let db_path = config::DATABASE_PATH.clone();
    let backup_dir = config::BACKUP_DIR.clone();
    let result = tokio::task::spawn_blocking(move || create_backup(&db_path, &backup_dir)).await?;

    match result {
        Ok(backup_path) => {
            let total = list_backups(&config::BACKUP_DIR).map(|b| b.len()).unwrap_or_default();
            log::info!("Manual backup {} by {} ({} kept)", backup_path.display(), user_id, total);
            let mut args = FluentArgs::new();
            args.set("path", backup_path.display().to_string());
            bot.send_message(chat_id, i18n::t_args(&lang, "backup-done", &args)).await?;
        }
        Err(e) => {
            log::error!("Manual backup failed: {}", e);
            bot.send_message(chat_id, i18n::t(&lang, "backup-failed")).await?;
        }
    }
    Ok(())
}

// ==================== Admin set ====================

/// `/addadmin <user_id>` and `/deladmin <user_id>`, primary admin only.
pub async fn handle_admin_set_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    message_text: &str,
    add: bool,
    primary_admin_id: i64,
    db_pool: Arc<DbPool>,
) -> Result<()> {
    let lang = i18n::user_lang_from_pool(&db_pool, user_id);
    if user_id != primary_admin_id {
        log::warn!("Non-primary user {} tried to change the admin set", user_id);
        bot.send_message(chat_id, i18n::t(&lang, "admin-primary-only")).await?;
        return Ok(());
    }

    let Some(target) = parse_id_arg(message_text) else {
        let example = if add { "/addadmin 123456789" } else { "/deladmin 123456789" };
        return reply_id_usage(bot, chat_id, &lang, example).await;
    };

    if !add && target == primary_admin_id {
        bot.send_message(chat_id, i18n::t(&lang, "admin-cannot-remove-primary")).await?;
        return Ok(());
    }

    let changed = {
        let conn = get_connection(&db_pool)?;
        if add {
            db::add_admin(&conn, target)?
        } else {
            db::remove_admin(&conn, target, primary_admin_id)?
        }
    };
    let key = match (add, changed) {
        (true, true) => "admin-added",
        (true, false) => "admin-already",
        (false, true) => "admin-removed",
        (false, false) => "admin-not-found",
    };
    if changed {
        log::info!("Admin set changed by {}: {} {}", user_id, if add { "added" } else { "removed" }, target);
    }
    bot.send_message(chat_id, i18n::t_args(&lang, key, &id_args("id", target))).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::create_pool;
    use crate::storage::db::register_user;
    use crate::telegram::conversation::MediaRef;
    use crate::storage::catalog::MediaKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn test_pool() -> (TempDir, Arc<DbPool>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("admin.db");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, Arc::new(pool))
    }

    #[test]
    fn test_parse_movie_edit() {
        let (id, edit) = parse_movie_edit("7 name The Matrix").unwrap();
        assert_eq!(id, 7);
        assert_eq!(edit.name.as_deref(), Some("The Matrix"));

        let (_, edit) = parse_movie_edit("7 premium ha").unwrap();
        assert_eq!(edit.premium, Some(true));
        let (_, edit) = parse_movie_edit("7 PREMIUM no").unwrap();
        assert_eq!(edit.premium, Some(false));

        assert_eq!(parse_movie_edit("7 file_id abc"), None);
        assert_eq!(parse_movie_edit("x name Foo"), None);
        assert_eq!(parse_movie_edit("7 name"), None);
        assert_eq!(parse_movie_edit(""), None);
    }

    #[test]
    fn test_is_admin_uses_admin_set() {
        let (_dir, pool) = test_pool();
        {
            let conn = get_connection(&pool).unwrap();
            db::seed_primary_admin(&conn, 1).unwrap();
        }
        assert!(is_admin(&pool, 1));
        assert!(!is_admin(&pool, 2));
    }

    #[test]
    fn test_wizard_commits_movie() {
        let (_dir, pool) = test_pool();
        let store = ConversationStore::new();
        store.start_add_movie(1);

        let steps = [
            (WizardInput::Text("Heat".into()), ConversationReply::Prompt("wizard-ask-description")),
            (WizardInput::Text("Crime saga".into()), ConversationReply::Prompt("wizard-ask-file")),
            (
                WizardInput::Media(MediaRef {
                    file_id: "BAAC".into(),
                    kind: MediaKind::Video,
                }),
                ConversationReply::Prompt("wizard-ask-genre"),
            ),
            (WizardInput::Text("crime".into()), ConversationReply::Prompt("wizard-ask-premium")),
        ];
        for (input, expected) in steps {
            assert_eq!(advance_conversation(&store, &pool, 1, input), Some(expected));
        }

        let reply = advance_conversation(&store, &pool, 1, WizardInput::Text("ha".into())).unwrap();
        let ConversationReply::MovieSaved(id) = reply else {
            panic!("expected a saved movie, got {:?}", reply);
        };
        assert!(!store.is_active(1));

        let conn = get_connection(&pool).unwrap();
        let movie = catalog::get_movie(&conn, id).unwrap().unwrap();
        assert_eq!(movie.name, "Heat");
        assert_eq!(movie.file_id, "BAAC");
        assert!(movie.premium);
        assert_eq!(movie.added_by, Some(1));
    }

    #[test]
    fn test_wizard_aborts_on_missing_file() {
        let (_dir, pool) = test_pool();
        let store = ConversationStore::new();
        store.start_add_movie(1);

        advance_conversation(&store, &pool, 1, WizardInput::Text("Heat".into()));
        advance_conversation(&store, &pool, 1, WizardInput::Text("Crime".into()));
        let reply = advance_conversation(&store, &pool, 1, WizardInput::Text("not a file".into()));

        assert_eq!(reply, Some(ConversationReply::Aborted("wizard-aborted-media")));
        assert!(!store.is_active(1));
        let conn = get_connection(&pool).unwrap();
        assert_eq!(catalog::count_movies(&conn).unwrap(), 0);
    }

    #[test]
    fn test_news_draft_saved_and_invalid() {
        let (_dir, pool) = test_pool();
        let store = ConversationStore::new();

        store.start_news(5);
        let reply = advance_conversation(&store, &pool, 5, WizardInput::Text("text|Yangi|Salom!".into()));
        assert!(matches!(reply, Some(ConversationReply::NewsSaved(_))));

        store.start_news(5);
        let reply = advance_conversation(&store, &pool, 5, WizardInput::Text("gif|x|y".into()));
        assert_eq!(reply, Some(ConversationReply::NewsInvalid));
        assert!(!store.is_active(5));

        let conn = get_connection(&pool).unwrap();
        assert_eq!(db::list_news(&conn, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_no_conversation() {
        let (_dir, pool) = test_pool();
        let store = ConversationStore::new();
        {
            let conn = get_connection(&pool).unwrap();
            register_user(&conn, 9, Some("Ann"), None).unwrap();
        }
        assert_eq!(advance_conversation(&store, &pool, 9, WizardInput::Text("hi".into())), None);
    }

    #[test]
    fn test_reply_text_localized() {
        let lang = i18n::lang_from_code("uz");
        let text = conversation_reply_text(&lang, &ConversationReply::MovieSaved(42));
        assert!(text.contains("42"));
    }
}
