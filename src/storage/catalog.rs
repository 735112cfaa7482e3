//! Movie catalog: CRUD, filtered listing, search and engagement counters.

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Result};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use crate::core::config;
use crate::storage::db::DbConnection;

/// How a stored file id has to be sent back to Telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Animation,
    Document,
    Audio,
    Photo,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Movie {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Telegram file id, reusable without re-upload
    pub file_id: String,
    pub media_kind: MediaKind,
    pub genre: String,
    pub views: i64,
    pub likes: i64,
    pub dislikes: i64,
    pub premium: bool,
    pub added_by: Option<i64>,
    pub added_at: String,
}

/// Fields of a movie about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovie {
    pub name: String,
    pub description: String,
    pub file_id: String,
    pub media_kind: MediaKind,
    pub genre: String,
    pub premium: bool,
    pub added_by: i64,
}

/// Partial update. Only the editable fields are representable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    /// New media reference together with its kind
    pub media: Option<(String, MediaKind)>,
    pub genre: Option<String>,
    pub premium: Option<bool>,
}

impl MovieEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.media.is_none()
            && self.genre.is_none()
            && self.premium.is_none()
    }
}

/// Page and filter for `list_movies`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieFilter {
    pub limit: usize,
    pub offset: usize,
    /// Case-insensitive exact match
    pub genre: Option<String>,
    pub premium: Option<bool>,
}

impl Default for MovieFilter {
    fn default() -> Self {
        Self {
            limit: config::catalog::PAGE_SIZE,
            offset: 0,
            genre: None,
            premium: None,
        }
    }
}

const MOVIE_COLUMNS: &str =
    "id, name, description, file_id, media_kind, genre, views, likes, dislikes, premium, added_by, added_at";

fn movie_from_row(row: &rusqlite::Row<'_>) -> Result<Movie> {
    let media_kind: String = row.get(4)?;
    Ok(Movie {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        file_id: row.get(3)?,
        media_kind: media_kind.parse().unwrap_or(MediaKind::Video),
        genre: row.get(5)?,
        views: row.get(6)?,
        likes: row.get(7)?,
        dislikes: row.get(8)?,
        premium: row.get::<_, i64>(9)? != 0,
        added_by: row.get(10)?,
        added_at: row.get(11)?,
    })
}

fn collect(rows: impl Iterator<Item = Result<Movie>>) -> Result<Vec<Movie>> {
    let mut movies = Vec::new();
    for row in rows {
        movies.push(row?);
    }
    Ok(movies)
}

/// Persists a new movie atomically and returns its id.
pub fn create_movie(conn: &DbConnection, movie: &NewMovie) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO movies (name, description, file_id, media_kind, genre, premium, added_by, added_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            movie.name,
            movie.description,
            movie.file_id,
            movie.media_kind.as_ref(),
            movie.genre,
            movie.premium as i64,
            movie.added_by,
            Utc::now().to_rfc3339(),
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    Ok(id)
}

/// Applies a partial update. An empty edit touches nothing and returns 0.
pub fn edit_movie(conn: &DbConnection, id: i64, edit: &MovieEdit) -> Result<usize> {
    if edit.is_empty() {
        return Ok(0);
    }

    let mut assignments: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(name) = &edit.name {
        assignments.push("name = ?");
        values.push(Value::Text(name.clone()));
    }
    if let Some(description) = &edit.description {
        assignments.push("description = ?");
        values.push(Value::Text(description.clone()));
    }
    if let Some((file_id, kind)) = &edit.media {
        assignments.push("file_id = ?");
        values.push(Value::Text(file_id.clone()));
        assignments.push("media_kind = ?");
        values.push(Value::Text(kind.to_string()));
    }
    if let Some(genre) = &edit.genre {
        assignments.push("genre = ?");
        values.push(Value::Text(genre.clone()));
    }
    if let Some(premium) = edit.premium {
        assignments.push("premium = ?");
        values.push(Value::Integer(premium as i64));
    }
    values.push(Value::Integer(id));

    let sql = format!("UPDATE movies SET {} WHERE id = ?", assignments.join(", "));
    conn.execute(&sql, params_from_iter(values))
}

pub fn delete_movie(conn: &DbConnection, id: i64) -> Result<usize> {
    conn.execute("DELETE FROM movies WHERE id = ?1", params![id])
}

pub fn get_movie(conn: &DbConnection, id: i64) -> Result<Option<Movie>> {
    conn.query_row(
        &format!("SELECT {} FROM movies WHERE id = ?1", MOVIE_COLUMNS),
        params![id],
        movie_from_row,
    )
    .optional()
}

/// One page of the catalog in id order.
///
/// The genre comparison folds case in Rust: SQLite's `lower()` leaves
/// non-ASCII letters alone, so `Драма` would never match `драма`.
pub fn list_movies(conn: &DbConnection, filter: &MovieFilter) -> Result<Vec<Movie>> {
    let mut sql = format!("SELECT {} FROM movies WHERE 1 = 1", MOVIE_COLUMNS);
    let mut values: Vec<Value> = Vec::new();

    if let Some(premium) = filter.premium {
        sql.push_str(" AND premium = ?");
        values.push(Value::Integer(premium as i64));
    }
    sql.push_str(" ORDER BY id ASC");

    let Some(genre) = &filter.genre else {
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(Value::Integer(filter.limit as i64));
        values.push(Value::Integer(filter.offset as i64));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), movie_from_row)?;
        return collect(rows);
    };

    if filter.limit == 0 {
        return Ok(Vec::new());
    }
    let wanted = genre.trim().to_lowercase();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), movie_from_row)?;

    let mut page = Vec::new();
    let mut skipped = 0;
    for row in rows {
        let movie = row?;
        if movie.genre.trim().to_lowercase() != wanted {
            continue;
        }
        if skipped < filter.offset {
            skipped += 1;
            continue;
        }
        page.push(movie);
        if page.len() >= filter.limit {
            break;
        }
    }
    Ok(page)
}

/// Movies whose name, description or genre contains `query`, ignoring case.
///
/// A blank query matches nothing.
pub fn search_movies(conn: &DbConnection, query: &str, limit: usize) -> Result<Vec<Movie>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    // SQLite's lower() only folds ASCII, so fold in Rust and use instr()
    // to keep `%` and `_` in user input literal.
    let needle = query.to_lowercase();
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM movies ORDER BY id ASC",
        MOVIE_COLUMNS
    ))?;
    let rows = stmt.query_map([], movie_from_row)?;

    let mut found = Vec::new();
    for row in rows {
        let movie = row?;
        let matches = movie.name.to_lowercase().contains(&needle)
            || movie.description.to_lowercase().contains(&needle)
            || movie.genre.to_lowercase().contains(&needle);
        if matches {
            found.push(movie);
            if found.len() >= limit {
                break;
            }
        }
    }
    Ok(found)
}

/// Most viewed first; ties broken by id.
pub fn top_movies_by_views(conn: &DbConnection, limit: usize) -> Result<Vec<Movie>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM movies ORDER BY views DESC, id ASC LIMIT ?1",
        MOVIE_COLUMNS
    ))?;
    let rows = stmt.query_map(params![limit as i64], movie_from_row)?;
    collect(rows)
}

pub fn count_movies(conn: &DbConnection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))
}

/// Distinct genre labels, alphabetically.
pub fn list_genres(conn: &DbConnection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT genre FROM movies WHERE genre != '' ORDER BY genre")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut genres = Vec::new();
    for row in rows {
        genres.push(row?);
    }
    Ok(genres)
}

pub fn increment_views(conn: &DbConnection, id: i64) -> Result<usize> {
    conn.execute("UPDATE movies SET views = views + 1 WHERE id = ?1", params![id])
}

pub fn increment_likes(conn: &DbConnection, id: i64) -> Result<usize> {
    conn.execute("UPDATE movies SET likes = likes + 1 WHERE id = ?1", params![id])
}

pub fn increment_dislikes(conn: &DbConnection, id: i64) -> Result<usize> {
    conn.execute("UPDATE movies SET dislikes = dislikes + 1 WHERE id = ?1", params![id])
}
