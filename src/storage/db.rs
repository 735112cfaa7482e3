use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Result};
use serde::Serialize;
use std::time::Duration;
use strum::{AsRefStr, Display, EnumString};

use crate::core::error::AppResult;
use crate::storage::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// A bot user, created on first interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Telegram user id
    pub id: i64,
    /// Telegram first name, if known
    pub first_name: Option<String>,
    pub is_premium: bool,
    /// Interface language code ("uz", "ru", "en")
    pub language: String,
    pub theme: String,
    /// How many users joined through this user's link
    pub referrals: i64,
    pub referred_by: Option<i64>,
    /// RFC 3339, UTC
    pub joined_at: String,
}

/// What `register_user` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registration {
    /// The user row did not exist before this call
    pub created: bool,
    /// A referral was recorded for the new user
    pub referral_applied: bool,
}

/// Outcome of adding a mandatory channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelInsert {
    Added,
    AlreadyExists,
}

/// Payload type of a news item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum NewsKind {
    Text,
    Photo,
    Video,
}

/// A news item created by an admin and consumed by the daily broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct News {
    pub id: i64,
    pub kind: NewsKind,
    /// Text for `Text`, media file id for `Photo`/`Video`
    pub content: String,
    pub caption: String,
    pub scheduled: bool,
    pub created_at: String,
}

/// Create a new database connection pool
///
/// Initializes a pool with up to 10 connections and applies the embedded
/// migrations on the first connection.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use kinotreyler::storage::db;
///
/// let pool = db::create_pool("kinotreyler.db")?;
/// # Ok::<(), kinotreyler::core::error::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> std::result::Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn user_from_row(row: &rusqlite::Row<'_>) -> Result<User> {
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        is_premium: row.get::<_, i64>(2)? != 0,
        language: row.get(3)?,
        theme: row.get(4)?,
        referrals: row.get(5)?,
        referred_by: row.get(6)?,
        joined_at: row.get(7)?,
    })
}

const USER_COLUMNS: &str = "id, first_name, is_premium, language, theme, referrals, referred_by, joined_at";

/// Creates the user on first interaction and records a referral when one applies.
///
/// A referral is applied only when the row is new, the referrer differs from the
/// user and already exists. The user insert, the referral log entry and the
/// referrer's counter update share one transaction.
///
/// # Arguments
///
/// * `conn` - Database connection
/// * `user_id` - Telegram id of the sender
/// * `first_name` - Display name; refreshed for existing users
/// * `referrer_id` - Id from a `/start <id>` link, if any
pub fn register_user(
    conn: &DbConnection,
    user_id: i64,
    first_name: Option<&str>,
    referrer_id: Option<i64>,
) -> Result<Registration> {
    let tx = conn.unchecked_transaction()?;

    let inserted = tx.execute(
        "INSERT OR IGNORE INTO users (id, first_name, joined_at) VALUES (?1, ?2, ?3)",
        params![user_id, first_name, now()],
    )?;
    let created = inserted == 1;

    if !created {
        if let Some(name) = first_name {
            tx.execute(
                "UPDATE users SET first_name = ?1 WHERE id = ?2 AND (first_name IS NULL OR first_name != ?1)",
                params![name, user_id],
            )?;
        }
    }

    let mut referral_applied = false;
    if let Some(referrer) = referrer_id.filter(|r| created && *r != user_id) {
        let referrer_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![referrer],
            |row| row.get(0),
        )?;
        if referrer_exists {
            tx.execute("UPDATE users SET referred_by = ?1 WHERE id = ?2", params![referrer, user_id])?;
            tx.execute(
                "INSERT INTO referrals (referrer_id, referred_id, created_at) VALUES (?1, ?2, ?3)",
                params![referrer, user_id, now()],
            )?;
            tx.execute("UPDATE users SET referrals = referrals + 1 WHERE id = ?1", params![referrer])?;
            referral_applied = true;
        }
    }

    tx.commit()?;
    Ok(Registration {
        created,
        referral_applied,
    })
}

/// Loads a user by Telegram id.
pub fn get_user(conn: &DbConnection, user_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![user_id],
        user_from_row,
    )
    .optional()
}

/// Ids of every known user, oldest first. Broadcast recipients.
pub fn get_all_user_ids(conn: &DbConnection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM users ORDER BY joined_at, id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

pub fn count_users(conn: &DbConnection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

pub fn count_premium_users(conn: &DbConnection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users WHERE is_premium = 1", [], |row| row.get(0))
}

/// Grants premium, creating the user row first if the user never talked to the bot.
pub fn grant_premium(conn: &DbConnection, user_id: i64) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT OR IGNORE INTO users (id, joined_at) VALUES (?1, ?2)",
        params![user_id, now()],
    )?;
    tx.execute("UPDATE users SET is_premium = 1 WHERE id = ?1", params![user_id])?;
    tx.commit()
}

/// Clears the premium flag. Returns the number of updated rows (0 for unknown users).
pub fn revoke_premium(conn: &DbConnection, user_id: i64) -> Result<usize> {
    conn.execute("UPDATE users SET is_premium = 0 WHERE id = ?1", params![user_id])
}

/// Unknown users are not premium.
pub fn is_premium(conn: &DbConnection, user_id: i64) -> Result<bool> {
    let flag: Option<i64> = conn
        .query_row("SELECT is_premium FROM users WHERE id = ?1", params![user_id], |row| row.get(0))
        .optional()?;
    Ok(flag.unwrap_or(0) != 0)
}

pub fn get_user_language(conn: &DbConnection, user_id: i64) -> Result<String> {
    conn.query_row("SELECT language FROM users WHERE id = ?1", params![user_id], |row| row.get(0))
}

pub fn set_user_language(conn: &DbConnection, user_id: i64, language: &str) -> Result<usize> {
    conn.execute("UPDATE users SET language = ?1 WHERE id = ?2", params![language, user_id])
}

// ==================== Admins ====================

/// Ensures the primary admin is in the admin set. Called at startup.
pub fn seed_primary_admin(conn: &DbConnection, primary_admin_id: i64) -> Result<()> {
    conn.execute("INSERT OR IGNORE INTO admins (id) VALUES (?1)", params![primary_admin_id])?;
    Ok(())
}

pub fn is_admin(conn: &DbConnection, user_id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM admins WHERE id = ?1)",
        params![user_id],
        |row| row.get(0),
    )
}

/// Returns `true` when the admin was not in the set before.
pub fn add_admin(conn: &DbConnection, user_id: i64) -> Result<bool> {
    let inserted = conn.execute("INSERT OR IGNORE INTO admins (id) VALUES (?1)", params![user_id])?;
    Ok(inserted == 1)
}

/// Removes an admin. The primary admin is never removed; callers get `false`.
pub fn remove_admin(conn: &DbConnection, user_id: i64, primary_admin_id: i64) -> Result<bool> {
    if user_id == primary_admin_id {
        return Ok(false);
    }
    let deleted = conn.execute("DELETE FROM admins WHERE id = ?1", params![user_id])?;
    Ok(deleted == 1)
}

pub fn list_admins(conn: &DbConnection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM admins ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

// ==================== Channels ====================

/// Canonical form of a channel identifier: numeric chat ids as given,
/// usernames with exactly one leading `@`.
pub fn normalize_channel(identifier: &str) -> String {
    let identifier = identifier.trim();
    if identifier.parse::<i64>().is_ok() {
        identifier.to_string()
    } else {
        format!("@{}", identifier.trim_start_matches('@'))
    }
}

/// Adds a mandatory channel. A duplicate identifier is reported, not raised.
pub fn add_channel(conn: &DbConnection, identifier: &str) -> Result<ChannelInsert> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO channels (identifier) VALUES (?1)",
        params![normalize_channel(identifier)],
    )?;
    Ok(if inserted == 1 {
        ChannelInsert::Added
    } else {
        ChannelInsert::AlreadyExists
    })
}

pub fn remove_channel(conn: &DbConnection, identifier: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM channels WHERE identifier = ?1",
        params![normalize_channel(identifier)],
    )
}

/// Mandatory channel identifiers in insertion order.
pub fn list_channels(conn: &DbConnection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT identifier FROM channels ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut channels = Vec::new();
    for row in rows {
        channels.push(row?);
    }
    Ok(channels)
}

// ==================== News ====================

fn news_from_row(row: &rusqlite::Row<'_>) -> Result<News> {
    let kind: String = row.get(1)?;
    Ok(News {
        id: row.get(0)?,
        kind: kind.parse().unwrap_or(NewsKind::Text),
        content: row.get(2)?,
        caption: row.get(3)?,
        scheduled: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
    })
}

pub fn add_news(conn: &DbConnection, kind: NewsKind, caption: &str, content: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO news (kind, content, caption, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![kind.as_ref(), content, caption, now()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent news first.
pub fn list_news(conn: &DbConnection, limit: usize) -> Result<Vec<News>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, content, caption, scheduled, created_at FROM news ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], news_from_row)?;

    let mut news = Vec::new();
    for row in rows {
        news.push(row?);
    }
    Ok(news)
}

/// News flagged for the daily broadcast, oldest first.
pub fn get_scheduled_news(conn: &DbConnection) -> Result<Vec<News>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, content, caption, scheduled, created_at FROM news WHERE scheduled = 1 ORDER BY id",
    )?;
    let rows = stmt.query_map([], news_from_row)?;

    let mut news = Vec::new();
    for row in rows {
        news.push(row?);
    }
    Ok(news)
}

pub fn set_news_scheduled(conn: &DbConnection, news_id: i64, scheduled: bool) -> Result<usize> {
    conn.execute(
        "UPDATE news SET scheduled = ?1 WHERE id = ?2",
        params![scheduled as i64, news_id],
    )
}
