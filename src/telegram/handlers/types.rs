//! Handler types, dependencies, and user registration helpers

use std::sync::Arc;

use teloxide::types::Message;

use crate::storage::db::{self, Registration};
use crate::storage::get_connection;
use crate::telegram::bot::sender_id;
use crate::telegram::conversation::ConversationStore;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<db::DbPool>,
    pub conversations: Arc<ConversationStore>,
    /// The only user allowed to change the admin set
    pub primary_admin_id: i64,
    /// Used to build referral links
    pub bot_username: Option<String>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(db_pool: Arc<db::DbPool>, primary_admin_id: i64, bot_username: Option<String>) -> Self {
        Self {
            db_pool,
            conversations: Arc::new(ConversationStore::new()),
            primary_admin_id,
            bot_username,
        }
    }
}

/// Sender info needed to register a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: i64,
    pub first_name: Option<String>,
}

impl UserInfo {
    /// Extract user info from a Telegram message
    pub fn from_message(msg: &Message) -> Self {
        Self {
            user_id: sender_id(msg),
            first_name: msg.from.as_ref().map(|u| u.first_name.clone()),
        }
    }
}

/// Makes sure the sender has a user row, applying `referrer_id` for new users.
///
/// Returns `None` for anonymous senders and when the database is unavailable;
/// the failure is logged and the update is still handled.
pub fn ensure_user_exists(
    db_pool: &Arc<db::DbPool>,
    user: &UserInfo,
    referrer_id: Option<i64>,
) -> Option<Registration> {
    if user.user_id == 0 {
        return None;
    }

    let conn = match get_connection(db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection to register {}: {}", user.user_id, e);
            return None;
        }
    };

    match db::register_user(&conn, user.user_id, user.first_name.as_deref(), referrer_id) {
        Ok(registration) => {
            if registration.created {
                log::info!("New user registered: {}", user.user_id);
            }
            if registration.referral_applied {
                log::info!("Referral applied: {:?} invited {}", referrer_id, user.user_id);
            }
            Some(registration)
        }
        Err(e) => {
            log::error!("Failed to register user {}: {}", user.user_id, e);
            None
        }
    }
}
