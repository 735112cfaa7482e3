//! Daily wall-clock jobs: database backup and the scheduled news broadcast.
//!
//! Each job runs in its own `tokio::spawn`ed loop, sleeps until the next
//! occurrence of its UTC time of day, runs, and repeats. Failures are logged;
//! a failed run is not retried before the next day.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::backup::create_backup;
use crate::storage::db::{get_all_user_ids, get_scheduled_news, DbPool};
use crate::storage::get_connection;
use crate::telegram::broadcast::{broadcast_news, BroadcastReport};
use crate::telegram::Bot;

/// Time left from `now` until the next `hour:minute` UTC.
///
/// If that time has already passed today (or is exactly now) the next day's
/// occurrence is used, so the result is always positive.
pub fn duration_until(hour: u32, minute: u32, now: DateTime<Utc>) -> Duration {
    let target_time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
    let mut target = now.date_naive().and_time(target_time).and_utc();
    if target <= now {
        target += ChronoDuration::days(1);
    }
    (target - now).to_std().unwrap_or(Duration::from_secs(60))
}

/// Copies the database into the backup directory.
pub fn run_backup_job(db_path: &str, backup_dir: &str) -> AppResult<()> {
    let path = create_backup(db_path, backup_dir)?;
    log::info!("Daily backup written to {}", path.display());
    Ok(())
}

/// Sends every scheduled news item to every known user.
pub async fn run_news_job(bot: &Bot, db_pool: &Arc<DbPool>) -> AppResult<BroadcastReport> {
    let (items, recipients) = {
        let conn = get_connection(db_pool)?;
        (get_scheduled_news(&conn)?, get_all_user_ids(&conn)?)
    };

    if items.is_empty() {
        log::info!("No scheduled news for today");
        return Ok(BroadcastReport::default());
    }

    log::info!(
        "Broadcasting {} news item(s) to {} user(s)",
        items.len(),
        recipients.len()
    );
    Ok(broadcast_news(bot, &recipients, &items).await)
}

fn spawn_daily<F, Fut>(name: &'static str, hour: u32, minute: u32, job: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = AppResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        log::info!("Scheduled job '{}' runs daily at {:02}:{:02} UTC", name, hour, minute);
        loop {
            let wait = duration_until(hour, minute, Utc::now());
            log::debug!("Job '{}' sleeps for {}s", name, wait.as_secs());
            tokio::time::sleep(wait).await;

            if let Err(e) = job().await {
                log::error!("Scheduled job '{}' failed: {}", name, e);
            }
        }
    })
}

/// Starts both daily jobs. The handles are returned so callers may abort them.
pub fn start_daily_jobs(bot: Bot, db_pool: Arc<DbPool>) -> Vec<JoinHandle<()>> {
    let backup = spawn_daily(
        "backup",
        config::schedule::BACKUP_HOUR,
        config::schedule::BACKUP_MINUTE,
        || async {
            let db_path = config::DATABASE_PATH.clone();
            let backup_dir = config::BACKUP_DIR.clone();
            tokio::task::spawn_blocking(move || run_backup_job(&db_path, &backup_dir))
                .await
                .map_err(|e| AppError::Anyhow(anyhow::anyhow!("backup task panicked: {}", e)))?
        },
    );

    let news = spawn_daily(
        "news",
        config::schedule::NEWS_HOUR,
        config::schedule::NEWS_MINUTE,
        move || {
            let bot = bot.clone();
            let db_pool = Arc::clone(&db_pool);
            async move {
                let report = run_news_job(&bot, &db_pool).await?;
                log::info!(
                    "Daily news broadcast finished: {}/{} delivered, {} failed",
                    report.delivered,
                    report.total,
                    report.failed
                );
                Ok(())
            }
        },
    );

    vec![backup, news]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_duration_until_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 7, 30, 0).unwrap();
        assert_eq!(duration_until(9, 0, now), Duration::from_secs(90 * 60));
    }

    #[test]
    fn test_duration_until_rolls_to_next_day() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 1).unwrap();
        assert_eq!(duration_until(9, 0, now), Duration::from_secs(24 * 3600 - 1));

        let midnight = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(duration_until(0, 0, midnight), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_duration_until_month_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 0).unwrap();
        assert_eq!(duration_until(0, 0, now), Duration::from_secs(60));
    }

    #[test]
    fn test_backup_job_reports_missing_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.db");
        let backups = dir.path().join("backups");
        assert!(run_backup_job(missing.to_str().unwrap(), backups.to_str().unwrap()).is_err());
    }
}
