//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};

use super::commands::{handle_help_command, handle_referral_command, handle_settings_command, handle_start_command};
use super::types::{ensure_user_exists, HandlerDeps, HandlerError, UserInfo};
use crate::i18n;
use crate::telegram::admin;
use crate::telegram::bot::{command_args, is_random_trigger, menu, parse_movie_code, sender_id, Command};
use crate::telegram::catalog::{self, Delivery};
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Routing order: known commands, then an active admin dialogue, then free
/// text (movie codes, the random keyword, menu labels), then inline buttons.
/// The same schema is used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_conversation = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(conversation_handler(deps_conversation))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

/// Logs a failed handler and tells the user something went wrong.
async fn report_failure(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, user_id: i64, context: &str, err: anyhow::Error) {
    log::error!("❌ {} failed for user {}: {:#}", context, user_id, err);
    let lang = i18n::user_lang_from_pool(&deps.db_pool, user_id);
    if let Err(e) = bot.send_message(chat_id, i18n::t(&lang, "error-generic")).await {
        log::warn!("Failed to report error to {}: {}", chat_id, e);
    }
}

async fn send_delivery(bot: &Bot, msg: &Message, deps: &HandlerDeps, user_id: i64, result: anyhow::Result<Delivery>) {
    match result {
        Ok(delivery) => {
            let lang = i18n::user_lang_from_pool(&deps.db_pool, user_id);
            if let Err(e) = catalog::reply_delivery(bot, msg.chat.id, &lang, &delivery).await {
                log::warn!("Failed to send delivery reply to {}: {}", msg.chat.id, e);
            }
        }
        Err(e) => report_failure(bot, msg.chat.id, deps, user_id, "Movie delivery", e).await,
    }
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

                let user_id = sender_id(&msg);
                let chat_id = msg.chat.id;
                let text = msg.text().unwrap_or_default();
                let db_pool = deps.db_pool.clone();

                if cmd != Command::Start {
                    ensure_user_exists(&deps.db_pool, &UserInfo::from_message(&msg), None);
                }

                let result: anyhow::Result<()> = match cmd {
                    Command::Start => {
                        handle_start_command(&bot, &msg, &deps).await?;
                        Ok(())
                    }
                    Command::Help => {
                        handle_help_command(&bot, &msg, &deps).await?;
                        Ok(())
                    }
                    Command::Referral => {
                        handle_referral_command(&bot, &msg, &deps).await?;
                        Ok(())
                    }
                    Command::Settings => {
                        handle_settings_command(&bot, &msg, &deps).await?;
                        Ok(())
                    }
                    Command::Random | Command::Randommovie => {
                        let delivery = catalog::deliver_random(&bot, &db_pool, chat_id, user_id).await;
                        send_delivery(&bot, &msg, &deps, user_id, delivery).await;
                        Ok(())
                    }
                    Command::Movies => {
                        catalog::handle_movies_command(&bot, chat_id, user_id, command_args(text), &db_pool).await
                    }
                    Command::Qidir => {
                        catalog::handle_search_command(&bot, chat_id, user_id, command_args(text), &db_pool).await
                    }
                    Command::Channels => catalog::handle_channels_command(&bot, chat_id, user_id, &db_pool).await,
                    Command::Admin => admin::handle_admin_command(&bot, chat_id, user_id, db_pool).await,
                    Command::Addmovie => {
                        admin::handle_addmovie_command(&bot, chat_id, user_id, db_pool, &deps.conversations).await
                    }
                    Command::Editmovie => admin::handle_editmovie_command(&bot, chat_id, user_id, text, db_pool).await,
                    Command::Delmovie => admin::handle_delmovie_command(&bot, chat_id, user_id, text, db_pool).await,
                    Command::Addchannel => {
                        admin::handle_addchannel_command(&bot, chat_id, user_id, text, db_pool).await
                    }
                    Command::Delchannel => {
                        admin::handle_delchannel_command(&bot, chat_id, user_id, text, db_pool).await
                    }
                    Command::Stats => admin::handle_stats_command(&bot, chat_id, user_id, db_pool).await,
                    Command::Topmovies => admin::handle_topmovies_command(&bot, chat_id, user_id, db_pool).await,
                    Command::GivePremium => {
                        admin::handle_give_premium_command(&bot, chat_id, user_id, text, db_pool).await
                    }
                    Command::RevokePremium => {
                        admin::handle_revoke_premium_command(&bot, chat_id, user_id, text, db_pool).await
                    }
                    Command::NewsAdd => {
                        admin::handle_news_add_command(&bot, chat_id, user_id, db_pool, &deps.conversations).await
                    }
                    Command::NewsList => admin::handle_news_list_command(&bot, chat_id, user_id, db_pool).await,
                    Command::NewsSchedule => {
                        admin::handle_news_schedule_command(&bot, chat_id, user_id, text, true, db_pool).await
                    }
                    Command::NewsUnschedule => {
                        admin::handle_news_schedule_command(&bot, chat_id, user_id, text, false, db_pool).await
                    }
                    Command::Broadcast => admin::handle_broadcast_command(&bot, chat_id, user_id, text, db_pool).await,
                    Command::Backup => admin::handle_backup_command(&bot, chat_id, user_id, db_pool).await,
                    Command::Addadmin => {
                        admin::handle_admin_set_command(&bot, chat_id, user_id, text, true, deps.primary_admin_id, db_pool)
                            .await
                    }
                    Command::Deladmin => {
                        admin::handle_admin_set_command(&bot, chat_id, user_id, text, false, deps.primary_admin_id, db_pool)
                            .await
                    }
                };

                if let Err(e) = result {
                    report_failure(&bot, chat_id, &deps, user_id, &format!("{:?} command", cmd), e).await;
                }
                Ok(())
            }
        },
    ))
}

/// Messages from users with an admin dialogue in progress.
fn conversation_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let conversations = deps.conversations.clone();

    Update::filter_message()
        .filter(move |msg: Message| conversations.is_active(sender_id(&msg)))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user_id = sender_id(&msg);
                if let Err(e) =
                    admin::handle_conversation_message(&bot, &msg, user_id, deps.db_pool.clone(), &deps.conversations)
                        .await
                {
                    report_failure(&bot, msg.chat.id, &deps, user_id, "Conversation step", e).await;
                }
                Ok(())
            }
        })
}

/// Free text: movie codes, the random keyword and reply keyboard labels.
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user_id = sender_id(&msg);
                let chat_id = msg.chat.id;
                let text = msg.text().unwrap_or_default().trim().to_string();
                ensure_user_exists(&deps.db_pool, &UserInfo::from_message(&msg), None);

                if let Some(movie_id) = parse_movie_code(&text) {
                    log::info!("Movie code {} requested by {}", movie_id, user_id);
                    let delivery = catalog::deliver_movie(&bot, &deps.db_pool, chat_id, user_id, movie_id).await;
                    send_delivery(&bot, &msg, &deps, user_id, delivery).await;
                    return Ok(());
                }

                if is_random_trigger(&text) {
                    let delivery = catalog::deliver_random(&bot, &deps.db_pool, chat_id, user_id).await;
                    send_delivery(&bot, &msg, &deps, user_id, delivery).await;
                    return Ok(());
                }

                let result = match text.as_str() {
                    menu::MOVIES => catalog::handle_movies_command(&bot, chat_id, user_id, "", &deps.db_pool).await,
                    menu::CHANNELS => catalog::handle_channels_command(&bot, chat_id, user_id, &deps.db_pool).await,
                    menu::SEARCH => {
                        let lang = i18n::user_lang_from_pool(&deps.db_pool, user_id);
                        bot.send_message(chat_id, i18n::t(&lang, "search-prompt")).await?;
                        Ok(())
                    }
                    menu::HELP => {
                        handle_help_command(&bot, &msg, &deps).await?;
                        Ok(())
                    }
                    menu::SETTINGS => {
                        handle_settings_command(&bot, &msg, &deps).await?;
                        Ok(())
                    }
                    _ => {
                        log::debug!("Ignoring free text from {}", user_id);
                        Ok(())
                    }
                };

                if let Err(e) = result {
                    report_failure(&bot, chat_id, &deps, user_id, "Menu action", e).await;
                }
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = catalog::handle_catalog_callback(&bot, &q, &deps.db_pool).await {
                log::error!("❌ Callback {:?} from {} failed: {:#}", q.data, q.from.id.0, e);
            }
            Ok(())
        }
    })
}
