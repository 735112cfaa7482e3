//! KinoTreyler - Telegram movie catalog bot
//!
//! Users get movies by numeric code, a random pick, a listing or a search,
//! gated by mandatory channel subscriptions and premium access. Admins manage
//! the catalog through commands and a step-by-step wizard.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, the daily scheduler and the stats chart
//! - `storage`: SQLite pool, migrations, the movie catalog and backups
//! - `telegram`: Bot setup, the dispatcher handler tree and the command handlers
//! - `i18n`: Fluent-based localization

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod core;
pub mod i18n;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{schema, HandlerDeps};
