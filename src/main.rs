use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::update_listeners::{webhooks, Polling};
use tokio::time::sleep;

use kinotreyler::cli::{Cli, Commands};
use kinotreyler::core::{config, init_logger, scheduler};
use kinotreyler::storage::backup::create_backup;
use kinotreyler::storage::db::{self, DbPool};
use kinotreyler::storage::{create_pool, get_connection};
use kinotreyler::telegram::{create_bot, schema, setup_bot_commands, Bot, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (configuration, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Backup) => {
            let path = create_backup(&config::DATABASE_PATH, &config::BACKUP_DIR)?;
            log::info!("Backup written to {}", path.display());
            Ok(())
        }
        Some(Commands::Migrate) => {
            create_pool(&config::DATABASE_PATH)?;
            log::info!("Migrations applied to {}", config::DATABASE_PATH.as_str());
            Ok(())
        }
        Some(Commands::Run { webhook }) => run_bot(webhook || config::PUBLIC_URL.is_some()).await,
        None => run_bot(config::PUBLIC_URL.is_some()).await,
    }
}

/// Waits for the Bot API to answer `getMe`, retrying transient failures.
async fn fetch_bot_username(bot: &Bot) -> Result<Option<String>> {
    const MAX_ATTEMPTS: u32 = 12;

    let mut attempt = 0;
    loop {
        match bot.get_me().await {
            Ok(me) => return Ok(me.username.clone()),
            Err(e) => {
                attempt += 1;
                if attempt >= MAX_ATTEMPTS {
                    return Err(anyhow::anyhow!(
                        "Failed to connect to Bot API after {} attempts: {}",
                        attempt,
                        e
                    ));
                }
                log::warn!(
                    "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                    attempt,
                    MAX_ATTEMPTS,
                    e
                );
                sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

fn init_database() -> Result<Arc<DbPool>> {
    let pool = create_pool(&config::DATABASE_PATH)?;
    {
        let conn = get_connection(&pool)?;
        db::seed_primary_admin(&conn, *config::admin::PRIMARY_ADMIN_ID)?;
    }
    log::info!("Database ready at {}", config::DATABASE_PATH.as_str());
    Ok(Arc::new(pool))
}

async fn run_bot(use_webhook: bool) -> Result<()> {
    log::info!("Starting bot...");

    if let Err(e) = config::validate() {
        log::error!("{}", e);
        return Err(e.into());
    }

    let db_pool = init_database()?;
    let bot = create_bot()?;

    let bot_username = fetch_bot_username(&bot).await?;
    log::info!("Bot username: {:?}", bot_username);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let jobs = scheduler::start_daily_jobs(bot.clone(), Arc::clone(&db_pool));

    let deps = HandlerDeps::new(Arc::clone(&db_pool), *config::admin::PRIMARY_ADMIN_ID, bot_username);
    let handler = schema(deps);

    if use_webhook {
        let Some(webhook_url) = config::webhook_url() else {
            return Err(anyhow::anyhow!("Webhook mode requires PUBLIC_URL"));
        };
        let url = url::Url::parse(&webhook_url)?;
        let addr = ([0, 0, 0, 0], *config::PORT).into();

        log::info!("Starting bot in webhook mode at {} (listening on {})", url, addr);
        let listener = webhooks::axum(bot.clone(), webhooks::Options::new(addr, url)).await?;

        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
            )
            .await;
    } else {
        log::info!("Starting bot in long polling mode");
        let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
    }

    for job in jobs {
        job.abort();
    }
    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
