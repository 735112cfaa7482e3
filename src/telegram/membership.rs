//! Mandatory channel subscription gate.

use teloxide::prelude::*;
use teloxide::types::{ChatId, Recipient, UserId};

use crate::storage::db::normalize_channel;
use crate::telegram::Bot;

/// Channels the user still has to join. Empty means the gate is open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateResult {
    pub missing: Vec<String>,
}

impl GateResult {
    pub fn passed(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Turns a stored channel identifier into something `getChatMember` accepts.
///
/// Numeric identifiers (`-100123…`) are chat ids, anything else is treated as a
/// public username and gets a leading `@` if it lacks one.
pub fn channel_recipient(identifier: &str) -> Recipient {
    let identifier = normalize_channel(identifier);
    match identifier.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(identifier),
    }
}

/// Checks the user's membership in every mandatory channel.
///
/// A channel counts as missing when the user left or was banned, and also when
/// the lookup itself fails (bot not in the channel, network error). Failures are
/// logged and never retried. No channels means the gate always passes.
pub async fn check_subscription(bot: &Bot, user_id: i64, channels: &[String]) -> GateResult {
    let mut missing = Vec::new();
    let Ok(telegram_id) = u64::try_from(user_id) else {
        log::warn!("Subscription check for invalid user id {}", user_id);
        return GateResult {
            missing: channels.to_vec(),
        };
    };

    for channel in channels {
        match bot.get_chat_member(channel_recipient(channel), UserId(telegram_id)).await {
            Ok(member) => {
                if member.kind.is_left() || member.kind.is_banned() {
                    missing.push(channel.clone());
                }
            }
            Err(e) => {
                log::warn!("Membership lookup failed for user {} in {}: {}", user_id, channel, e);
                missing.push(channel.clone());
            }
        }
    }

    GateResult { missing }
}

/// One line per channel, usernames rendered as t.me links.
pub fn format_channel_list(channels: &[String]) -> String {
    channels
        .iter()
        .map(|channel| match channel_recipient(channel) {
            Recipient::ChannelUsername(username) => {
                format!("👉 https://t.me/{}", username.trim_start_matches('@'))
            }
            Recipient::Id(_) => format!("👉 {}", channel),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
