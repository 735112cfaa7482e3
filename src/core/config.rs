use once_cell::sync::Lazy;
use std::env;

use crate::core::error::{AppError, AppResult};

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Public base URL used to register the webhook (`<PUBLIC_URL>/webhook`).
/// Read from PUBLIC_URL, falling back to WEBHOOK_URL. Unset means long polling.
pub static PUBLIC_URL: Lazy<Option<String>> = Lazy::new(|| {
    env::var("PUBLIC_URL")
        .or_else(|_| env::var("WEBHOOK_URL"))
        .ok()
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
});

/// Port the webhook listener binds to
/// Read from PORT environment variable
/// Default: 10000
pub static PORT: Lazy<u16> = Lazy::new(|| env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(10000));

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: kinotreyler.db
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "kinotreyler.db".to_string()));

/// Directory for timestamped database copies
/// Read from BACKUP_DIR environment variable
/// Default: backups
pub static BACKUP_DIR: Lazy<String> = Lazy::new(|| env::var("BACKUP_DIR").unwrap_or_else(|_| "backups".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: kinotreyler.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "kinotreyler.log".to_string()));

/// Log level for both terminal and file output (error, warn, info, debug, trace)
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    /// The primary admin. Always present in the admin set and the only one
    /// allowed to add or remove other admins.
    /// Read from PRIMARY_ADMIN_ID (or ADMIN_ID); 0 means "not configured".
    pub static PRIMARY_ADMIN_ID: Lazy<i64> = Lazy::new(|| {
        env::var("PRIMARY_ADMIN_ID")
            .or_else(|_| env::var("ADMIN_ID"))
            .ok()
            .and_then(|id| id.trim().parse().ok())
            .unwrap_or(0)
    });
}

/// Wall-clock times (UTC) of the daily jobs
pub mod schedule {
    /// Database backup
    pub const BACKUP_HOUR: u32 = 0;
    pub const BACKUP_MINUTE: u32 = 0;

    /// Broadcast of scheduled news
    pub const NEWS_HOUR: u32 = 9;
    pub const NEWS_MINUTE: u32 = 0;
}

/// Broadcast fan-out configuration
pub mod broadcast {
    /// Sends in flight at once
    pub const CONCURRENCY: usize = 8;
}

/// Catalog paging configuration
pub mod catalog {
    /// Default page size for listings and random picks
    pub const PAGE_SIZE: usize = 200;

    /// Default result cap for `/qidir`
    pub const SEARCH_LIMIT: usize = 50;

    /// Rows shown by `/delmovie` without arguments
    pub const DELETE_LISTING_LIMIT: usize = 100;

    /// Rows in the `/topmovies` chart
    pub const TOP_LIMIT: usize = 10;
}

/// Network configuration
pub mod network {
    use std::time::Duration;

    /// Timeout for Bot API requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Returns the timeout as Duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Checks that everything required to start the bot is configured.
///
/// Missing values are reported together so a single restart fixes them all.
pub fn validate() -> AppResult<()> {
    let mut missing = Vec::new();
    if BOT_TOKEN.is_empty() {
        missing.push("BOT_TOKEN");
    }
    if *admin::PRIMARY_ADMIN_ID == 0 {
        missing.push("PRIMARY_ADMIN_ID");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "missing required configuration: {}",
            missing.join(", ")
        )))
    }
}

/// Webhook endpoint registered with Telegram, if a public URL is configured
pub fn webhook_url() -> Option<String> {
    PUBLIC_URL.as_ref().map(|base| format!("{}/webhook", base))
}
