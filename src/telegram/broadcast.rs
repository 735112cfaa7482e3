//! Fan-out of one message to many users.
//!
//! Recipients are served with bounded concurrency. A failed delivery is logged
//! and counted; it never stops the run.

use futures_util::stream::{self, StreamExt};
use std::future::Future;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, InputFile};

use crate::core::config;
use crate::storage::db::{News, NewsKind};
use crate::telegram::Bot;

/// Outcome of a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn merge(&mut self, other: BroadcastReport) {
        self.total += other.total;
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Runs `send` for every recipient, at most `concurrency` at a time.
pub async fn deliver_to_all<F, Fut, E>(recipients: &[i64], concurrency: usize, send: F) -> BroadcastReport
where
    F: Fn(i64) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let results: Vec<bool> = stream::iter(recipients.iter().copied())
        .map(|user_id| {
            let fut = send(user_id);
            async move {
                match fut.await {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("Broadcast delivery to {} failed: {}", user_id, e);
                        false
                    }
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let delivered = results.iter().filter(|ok| **ok).count();
    BroadcastReport {
        total: recipients.len(),
        delivered,
        failed: recipients.len() - delivered,
    }
}

/// Sends a plain text message to every recipient.
pub async fn broadcast_text(bot: &Bot, recipients: &[i64], text: &str) -> BroadcastReport {
    deliver_to_all(recipients, config::broadcast::CONCURRENCY, move |user_id| async move {
        bot.send_message(ChatId(user_id), text).await.map(|_| ())
    })
    .await
}

/// Sends one news item to a single chat according to its kind.
pub async fn send_news(bot: &Bot, chat_id: ChatId, news: &News) -> Result<(), teloxide::RequestError> {
    match news.kind {
        NewsKind::Text => {
            let text = if news.caption.is_empty() {
                news.content.clone()
            } else {
                format!("{}\n\n{}", news.caption, news.content)
            };
            bot.send_message(chat_id, text).await?;
        }
        NewsKind::Photo => {
            bot.send_photo(chat_id, InputFile::file_id(FileId(news.content.clone())))
                .caption(news.caption.clone())
                .await?;
        }
        NewsKind::Video => {
            bot.send_video(chat_id, InputFile::file_id(FileId(news.content.clone())))
                .caption(news.caption.clone())
                .await?;
        }
    }
    Ok(())
}

/// Delivers every news item to every recipient.
pub async fn broadcast_news(bot: &Bot, recipients: &[i64], items: &[News]) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for news in items {
        let item_report = deliver_to_all(recipients, config::broadcast::CONCURRENCY, move |user_id| async move {
            send_news(bot, ChatId(user_id), news).await
        })
        .await;
        log::info!(
            "News {} delivered to {}/{} users",
            news.id,
            item_report.delivered,
            item_report.total
        );
        report.merge(item_report);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_failure_does_not_stop_delivery() {
        let attempted = Mutex::new(Vec::new());
        let recipients = vec![1, 2, 3, 4];

        let report = deliver_to_all(&recipients, 2, |user_id| {
            attempted.lock().unwrap().push(user_id);
            async move {
                if user_id == 2 {
                    Err("blocked by user")
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(
            report,
            BroadcastReport {
                total: 4,
                delivered: 3,
                failed: 1
            }
        );
        let mut attempted = attempted.into_inner().unwrap();
        attempted.sort_unstable();
        assert_eq!(attempted, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let (in_flight, peak) = (&in_flight, &peak);
        let recipients: Vec<i64> = (0..20).collect();

        deliver_to_all(&recipients, 3, move |_| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok::<(), &str>(())
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_empty_recipients() {
        let report = deliver_to_all(&[], 4, |_| async { Ok::<(), &str>(()) }).await;
        assert_eq!(report, BroadcastReport::default());
    }
}
