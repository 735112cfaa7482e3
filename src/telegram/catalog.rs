//! User-facing catalog: movie delivery by code, random pick, listing, search
//! and the like/dislike reactions.

use std::sync::Arc;

use fluent_templates::fluent_bundle::FluentArgs;
use rand::seq::IndexedRandom;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile};
use unic_langid::LanguageIdentifier;

use crate::core::config;
use crate::i18n;
use crate::storage::catalog::{self, MediaKind, Movie, MovieFilter};
use crate::storage::db::{self, DbPool};
use crate::storage::get_connection;
use crate::telegram::membership::{check_subscription, format_channel_list};
use crate::telegram::Bot;

/// Telegram rejects media captions longer than this.
pub const CAPTION_LIMIT: usize = 1024;
/// Telegram rejects text messages longer than this.
pub const MESSAGE_LIMIT: usize = 4096;

/// What happened to a movie request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent(i64),
    NotFound,
    EmptyCatalog,
    /// Channels the user still has to join
    NotSubscribed(Vec<String>),
    PremiumRequired,
    SendFailed,
}

/// Parsed inline button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCallback {
    Like(i64),
    Dislike(i64),
    Language(String),
}

impl CatalogCallback {
    pub fn parse(data: &str) -> Option<Self> {
        let (action, value) = data.split_once(':')?;
        match action {
            "like" => value.parse().ok().map(CatalogCallback::Like),
            "dislike" => value.parse().ok().map(CatalogCallback::Dislike),
            "lang" => i18n::is_language_supported(value).map(|code| CatalogCallback::Language(code.to_string())),
            _ => None,
        }
    }
}

/// Cuts `text` to at most `limit` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Splits a long listing on line boundaries so every part fits one message.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let line = truncate_chars(line, limit);
        let needed = if current.is_empty() {
            line.chars().count()
        } else {
            current.chars().count() + 1 + line.chars().count()
        };
        if needed > limit && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

pub fn movie_caption(lang: &LanguageIdentifier, movie: &Movie) -> String {
    let mut args = FluentArgs::new();
    args.set("name", movie.name.clone());
    args.set("description", movie.description.clone());
    args.set("genre", movie.genre.clone());
    args.set("id", movie.id);
    truncate_chars(&i18n::t_args(lang, "movie-caption", &args), CAPTION_LIMIT)
}

pub fn reaction_keyboard(movie: &Movie) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(format!("👍 {}", movie.likes), format!("like:{}", movie.id)),
        InlineKeyboardButton::callback(format!("👎 {}", movie.dislikes), format!("dislike:{}", movie.id)),
    ]])
}

/// `17. Name (genre)` per movie, premium entries marked.
pub fn format_movie_lines(movies: &[Movie]) -> String {
    movies
        .iter()
        .map(|m| {
            let marker = if m.premium { " 💎" } else { "" };
            if m.genre.is_empty() {
                format!("{}. {}{}", m.id, m.name, marker)
            } else {
                format!("{}. {} ({}){}", m.id, m.name, m.genre, marker)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sends the stored file back with the method matching its kind.
pub async fn send_movie_media(bot: &Bot, chat_id: ChatId, movie: &Movie, caption: String) -> ResponseResult<()> {
    let file = InputFile::file_id(FileId(movie.file_id.clone()));
    let keyboard = reaction_keyboard(movie);
    match movie.media_kind {
        MediaKind::Video => {
            bot.send_video(chat_id, file).caption(caption).reply_markup(keyboard).await?;
        }
        MediaKind::Animation => {
            bot.send_animation(chat_id, file).caption(caption).reply_markup(keyboard).await?;
        }
        MediaKind::Document => {
            bot.send_document(chat_id, file).caption(caption).reply_markup(keyboard).await?;
        }
        MediaKind::Audio => {
            bot.send_audio(chat_id, file).caption(caption).reply_markup(keyboard).await?;
        }
        MediaKind::Photo => {
            bot.send_photo(chat_id, file).caption(caption).reply_markup(keyboard).await?;
        }
    }
    Ok(())
}

async fn gate(bot: &Bot, db_pool: &Arc<DbPool>, user_id: i64) -> anyhow::Result<Vec<String>> {
    let channels = {
        let conn = get_connection(db_pool)?;
        db::list_channels(&conn)?
    };
    Ok(check_subscription(bot, user_id, &channels).await.missing)
}

async fn send_and_count(
    bot: &Bot,
    db_pool: &Arc<DbPool>,
    chat_id: ChatId,
    user_id: i64,
    movie: &Movie,
) -> anyhow::Result<Delivery> {
    let lang = i18n::user_lang_from_pool(db_pool, user_id);
    if let Err(e) = send_movie_media(bot, chat_id, movie, movie_caption(&lang, movie)).await {
        log::error!("Failed to send movie {} to {}: {}", movie.id, chat_id, e);
        return Ok(Delivery::SendFailed);
    }

    let conn = get_connection(db_pool)?;
    catalog::increment_views(&conn, movie.id)?;
    log::info!("Movie {} sent to {}", movie.id, chat_id);
    Ok(Delivery::Sent(movie.id))
}

/// Serves a movie requested by its numeric code.
///
/// Order of checks: existence, channel subscription, premium access. Views
/// are counted only after Telegram accepted the media.
pub async fn deliver_movie(
    bot: &Bot,
    db_pool: &Arc<DbPool>,
    chat_id: ChatId,
    user_id: i64,
    movie_id: i64,
) -> anyhow::Result<Delivery> {
    let movie = {
        let conn = get_connection(db_pool)?;
        catalog::get_movie(&conn, movie_id)?
    };
    let Some(movie) = movie else {
        return Ok(Delivery::NotFound);
    };

    let missing = gate(bot, db_pool, user_id).await?;
    if !missing.is_empty() {
        return Ok(Delivery::NotSubscribed(missing));
    }

    if movie.premium {
        let conn = get_connection(db_pool)?;
        if !db::is_premium(&conn, user_id)? {
            return Ok(Delivery::PremiumRequired);
        }
    }

    send_and_count(bot, db_pool, chat_id, user_id, &movie).await
}

/// Serves a uniformly random movie from the first catalog page.
pub async fn deliver_random(bot: &Bot, db_pool: &Arc<DbPool>, chat_id: ChatId, user_id: i64) -> anyhow::Result<Delivery> {
    let picked = {
        let conn = get_connection(db_pool)?;
        let movies = catalog::list_movies(&conn, &MovieFilter::default())?;
        movies.choose(&mut rand::rng()).cloned()
    };
    let Some(movie) = picked else {
        return Ok(Delivery::EmptyCatalog);
    };

    let missing = gate(bot, db_pool, user_id).await?;
    if !missing.is_empty() {
        return Ok(Delivery::NotSubscribed(missing));
    }

    send_and_count(bot, db_pool, chat_id, user_id, &movie).await
}

/// Tells the user why nothing was sent. `Sent` needs no reply.
pub async fn reply_delivery(bot: &Bot, chat_id: ChatId, lang: &LanguageIdentifier, delivery: &Delivery) -> ResponseResult<()> {
    let text = match delivery {
        Delivery::Sent(_) => return Ok(()),
        Delivery::NotFound => i18n::t(lang, "movie-not-found"),
        Delivery::EmptyCatalog => i18n::t(lang, "catalog-empty"),
        Delivery::PremiumRequired => i18n::t(lang, "movie-premium-only"),
        Delivery::SendFailed => i18n::t(lang, "movie-send-failed"),
        Delivery::NotSubscribed(missing) => {
            let mut args = FluentArgs::new();
            args.set("channels", format_channel_list(missing));
            i18n::t_args(lang, "gate-subscribe", &args)
        }
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}

/// `/movies [genre]`
pub async fn handle_movies_command(bot: &Bot, chat_id: ChatId, user_id: i64, genre: &str, db_pool: &Arc<DbPool>) -> anyhow::Result<()> {
    let lang = i18n::user_lang_from_pool(db_pool, user_id);
    let filter = MovieFilter {
        genre: (!genre.is_empty()).then(|| genre.to_string()),
        ..MovieFilter::default()
    };
    let (movies, genres) = {
        let conn = get_connection(db_pool)?;
        (catalog::list_movies(&conn, &filter)?, catalog::list_genres(&conn)?)
    };

    if movies.is_empty() {
        bot.send_message(chat_id, i18n::t(&lang, "catalog-empty")).await?;
        return Ok(());
    }

    let mut text = format!("{}\n{}", i18n::t(&lang, "catalog-header"), format_movie_lines(&movies));
    if !genres.is_empty() {
        let mut args = FluentArgs::new();
        args.set("genres", genres.join(", "));
        text.push_str("\n\n");
        text.push_str(&i18n::t_args(&lang, "catalog-genres", &args));
    }

    for part in split_message(&text, MESSAGE_LIMIT) {
        bot.send_message(chat_id, part).await?;
    }
    Ok(())
}

/// `/qidir <words>`
pub async fn handle_search_command(bot: &Bot, chat_id: ChatId, user_id: i64, query: &str, db_pool: &Arc<DbPool>) -> anyhow::Result<()> {
    let lang = i18n::user_lang_from_pool(db_pool, user_id);
    if query.trim().is_empty() {
        bot.send_message(chat_id, i18n::t(&lang, "search-usage")).await?;
        return Ok(());
    }

    let results = {
        let conn = get_connection(db_pool)?;
        catalog::search_movies(&conn, query, config::catalog::SEARCH_LIMIT)?
    };
    log::info!("Search '{}' by {} returned {} result(s)", query, user_id, results.len());

    if results.is_empty() {
        bot.send_message(chat_id, i18n::t(&lang, "search-none")).await?;
        return Ok(());
    }

    let text = format!("{}\n{}", i18n::t(&lang, "search-header"), format_movie_lines(&results));
    for part in split_message(&text, MESSAGE_LIMIT) {
        bot.send_message(chat_id, part).await?;
    }
    Ok(())
}

/// `/channels`
pub async fn handle_channels_command(bot: &Bot, chat_id: ChatId, user_id: i64, db_pool: &Arc<DbPool>) -> anyhow::Result<()> {
    let lang = i18n::user_lang_from_pool(db_pool, user_id);
    let channels = {
        let conn = get_connection(db_pool)?;
        db::list_channels(&conn)?
    };

    let text = if channels.is_empty() {
        i18n::t(&lang, "channels-none")
    } else {
        let mut args = FluentArgs::new();
        args.set("channels", format_channel_list(&channels));
        i18n::t_args(&lang, "channels-list", &args)
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}

/// The inline language picker shown by `/settings`.
pub fn language_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![i18n::SUPPORTED_LANGS
        .iter()
        .map(|(code, name)| InlineKeyboardButton::callback(name.to_string(), format!("lang:{}", code)))
        .collect::<Vec<_>>()])
}

/// Handles like/dislike/language buttons.
pub async fn handle_catalog_callback(bot: &Bot, q: &CallbackQuery, db_pool: &Arc<DbPool>) -> anyhow::Result<()> {
    let user_id = i64::try_from(q.from.id.0).unwrap_or(0);
    let Some(callback) = q.data.as_deref().and_then(CatalogCallback::parse) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    match callback {
        CatalogCallback::Like(movie_id) => {
            let lang = i18n::user_lang_from_pool(db_pool, user_id);
            {
                let conn = get_connection(db_pool)?;
                catalog::increment_likes(&conn, movie_id)?;
            }
            bot.answer_callback_query(q.id.clone())
                .text(i18n::t(&lang, "like-thanks"))
                .await?;
        }
        CatalogCallback::Dislike(movie_id) => {
            let lang = i18n::user_lang_from_pool(db_pool, user_id);
            {
                let conn = get_connection(db_pool)?;
                catalog::increment_dislikes(&conn, movie_id)?;
            }
            bot.answer_callback_query(q.id.clone())
                .text(i18n::t(&lang, "dislike-noted"))
                .await?;
        }
        CatalogCallback::Language(code) => {
            {
                let conn = get_connection(db_pool)?;
                db::set_user_language(&conn, user_id, &code)?;
            }
            let lang = i18n::lang_from_code(&code);
            let mut args = FluentArgs::new();
            args.set("language", i18n::language_name(&code).to_string());
            let text = i18n::t_args(&lang, "settings-language-set", &args);
            bot.answer_callback_query(q.id.clone()).await?;
            if let Some(message) = q.message.as_ref() {
                bot.send_message(message.chat().id, text).await?;
            }
        }
    }
    Ok(())
}
