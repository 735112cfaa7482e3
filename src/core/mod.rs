//! Core utilities, configuration, and common functionality

pub mod chart;
pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::init_logger;
