//! Telegram bot integration and handlers

pub mod admin;
pub mod bot;
pub mod broadcast;
pub mod catalog;
pub mod conversation;
pub mod handlers;
pub mod membership;

/// Bot type used across the crate
pub type Bot = teloxide::Bot;

// Re-exports for convenience
pub use bot::{create_bot, main_menu_keyboard, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
