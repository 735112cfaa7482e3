//! Integration tests for movie delivery, the subscription gate and broadcasts
//! against a mocked Bot API.
//!
//! Run with: cargo test --test bot_integration_test

mod common;

use common::TestEnvironment;
use pretty_assertions::assert_eq;
use serial_test::serial;
use teloxide::types::ChatId;

use kinotreyler::storage::catalog::{self, MediaKind, NewMovie};
use kinotreyler::core::scheduler::run_news_job;
use kinotreyler::storage::db::{self, NewsKind};
use kinotreyler::storage::get_connection;
use kinotreyler::telegram::broadcast::{broadcast_text, BroadcastReport};
use kinotreyler::telegram::catalog::{deliver_movie, deliver_random, Delivery};
use kinotreyler::telegram::membership::check_subscription;

const USER: i64 = 123456789;

fn add_movie(env: &TestEnvironment, name: &str, premium: bool, media_kind: MediaKind) -> i64 {
    let conn = get_connection(&env.db_pool).unwrap();
    catalog::create_movie(
        &conn,
        &NewMovie {
            name: name.to_string(),
            description: format!("{} description", name),
            file_id: format!("{}-file", name.to_lowercase()),
            media_kind,
            genre: "drama".to_string(),
            premium,
            added_by: 1,
        },
    )
    .unwrap()
}

fn views(env: &TestEnvironment, id: i64) -> i64 {
    let conn = get_connection(&env.db_pool).unwrap();
    catalog::get_movie(&conn, id).unwrap().unwrap().views
}

#[tokio::test]
#[serial]
async fn test_gate_passes_without_channels() {
    let env = TestEnvironment::new().await;

    let result = check_subscription(&env.bot, USER, &[]).await;

    assert!(result.passed());
    assert!(env.requests_to("getChatMember").await.is_empty());
}

#[tokio::test]
#[serial]
async fn test_gate_reports_left_and_failed_channels() {
    let env = TestEnvironment::new().await;
    env.mock_chat_member(USER, "left").await;

    let channels = vec!["@kino_uz".to_string()];
    let result = check_subscription(&env.bot, USER, &channels).await;
    assert_eq!(result.missing, channels);

    let body = &env.requests_to("getChatMember").await[0];
    assert_eq!(body["chat_id"], "@kino_uz");
}

#[tokio::test]
#[serial]
async fn test_gate_passes_for_member() {
    let env = TestEnvironment::new().await;
    env.mock_chat_member(USER, "member").await;

    let result = check_subscription(&env.bot, USER, &["-1001234".to_string()]).await;

    assert!(result.passed());
}

#[tokio::test]
#[serial]
async fn test_lookup_error_counts_as_missing() {
    let env = TestEnvironment::new().await;
    // No mock mounted: the server answers 404 and the lookup fails.
    let result = check_subscription(&env.bot, USER, &["@closed".to_string()]).await;

    assert_eq!(result.missing, vec!["@closed".to_string()]);
}

#[tokio::test]
#[serial]
async fn test_deliver_movie_sends_media_and_counts_view() {
    let env = TestEnvironment::new().await;
    env.mock_all_telegram_api().await;
    let id = add_movie(&env, "Heat", false, MediaKind::Video);

    let delivery = deliver_movie(&env.bot, &env.db_pool, ChatId(USER), USER, id).await.unwrap();

    assert_eq!(delivery, Delivery::Sent(id));
    assert_eq!(views(&env, id), 1);

    let bodies = env.raw_requests_to("sendVideo").await;
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("heat-file"));
    assert!(bodies[0].contains("Heat description"));
    assert!(bodies[0].contains(&format!("like:{}", id)));
}

#[tokio::test]
#[serial]
async fn test_deliver_movie_uses_media_kind() {
    let env = TestEnvironment::new().await;
    env.mock_all_telegram_api().await;
    let id = add_movie(&env, "Poster", false, MediaKind::Photo);

    deliver_movie(&env.bot, &env.db_pool, ChatId(USER), USER, id).await.unwrap();

    assert_eq!(env.raw_requests_to("sendPhoto").await.len(), 1);
    assert!(env.raw_requests_to("sendVideo").await.is_empty());
}

#[tokio::test]
#[serial]
async fn test_deliver_unknown_movie() {
    let env = TestEnvironment::new().await;
    env.mock_all_telegram_api().await;

    let delivery = deliver_movie(&env.bot, &env.db_pool, ChatId(USER), USER, 404).await.unwrap();

    assert_eq!(delivery, Delivery::NotFound);
}

#[tokio::test]
#[serial]
async fn test_premium_movie_requires_premium() {
    let env = TestEnvironment::new().await;
    env.mock_all_telegram_api().await;
    let id = add_movie(&env, "Gold", true, MediaKind::Video);

    let delivery = deliver_movie(&env.bot, &env.db_pool, ChatId(USER), USER, id).await.unwrap();
    assert_eq!(delivery, Delivery::PremiumRequired);
    assert_eq!(views(&env, id), 0);

    {
        let conn = get_connection(&env.db_pool).unwrap();
        db::grant_premium(&conn, USER).unwrap();
    }
    let delivery = deliver_movie(&env.bot, &env.db_pool, ChatId(USER), USER, id).await.unwrap();
    assert_eq!(delivery, Delivery::Sent(id));
    assert_eq!(views(&env, id), 1);
}

#[tokio::test]
#[serial]
async fn test_unsubscribed_user_gets_nothing() {
    let env = TestEnvironment::new().await;
    env.mock_chat_member(USER, "left").await;
    env.mock_all_telegram_api().await;
    let id = add_movie(&env, "Heat", false, MediaKind::Video);
    {
        let conn = get_connection(&env.db_pool).unwrap();
        db::add_channel(&conn, "@kino_uz").unwrap();
    }

    let delivery = deliver_movie(&env.bot, &env.db_pool, ChatId(USER), USER, id).await.unwrap();

    assert_eq!(delivery, Delivery::NotSubscribed(vec!["@kino_uz".to_string()]));
    assert!(env.raw_requests_to("sendVideo").await.is_empty());
    assert_eq!(views(&env, id), 0);
}

#[tokio::test]
#[serial]
async fn test_views_increment_once_per_delivery() {
    let env = TestEnvironment::new().await;
    env.mock_all_telegram_api().await;
    let id = add_movie(&env, "Heat", false, MediaKind::Video);

    for _ in 0..3 {
        deliver_movie(&env.bot, &env.db_pool, ChatId(USER), USER, id).await.unwrap();
    }

    assert_eq!(views(&env, id), 3);
}

#[tokio::test]
#[serial]
async fn test_random_on_empty_catalog() {
    let env = TestEnvironment::new().await;
    env.mock_all_telegram_api().await;

    let delivery = deliver_random(&env.bot, &env.db_pool, ChatId(USER), USER).await.unwrap();

    assert_eq!(delivery, Delivery::EmptyCatalog);
}

#[tokio::test]
#[serial]
async fn test_random_picks_from_catalog() {
    let env = TestEnvironment::new().await;
    env.mock_all_telegram_api().await;
    let ids = [
        add_movie(&env, "Heat", false, MediaKind::Video),
        add_movie(&env, "Up", false, MediaKind::Video),
    ];

    let delivery = deliver_random(&env.bot, &env.db_pool, ChatId(USER), USER).await.unwrap();

    let Delivery::Sent(id) = delivery else {
        panic!("expected a sent movie, got {:?}", delivery);
    };
    assert!(ids.contains(&id));
    assert_eq!(views(&env, id), 1);
}

#[tokio::test]
#[serial]
async fn test_broadcast_continues_past_blocked_user() {
    let env = TestEnvironment::new().await;
    env.mock_blocked_chat(2).await;
    env.mock_all_telegram_api().await;

    let report = broadcast_text(&env.bot, &[1, 2, 3], "Yangi kinolar!").await;

    assert_eq!(
        report,
        BroadcastReport {
            total: 3,
            delivered: 2,
            failed: 1
        }
    );
    let mut chats: Vec<i64> = env
        .requests_to("sendMessage")
        .await
        .iter()
        .filter_map(|body| body["chat_id"].as_i64())
        .collect();
    chats.sort_unstable();
    assert_eq!(chats, vec![1, 2, 3]);
}

#[tokio::test]
#[serial]
async fn test_daily_news_sends_scheduled_items_by_kind() {
    const BLOCKED: i64 = 424242;

    let env = TestEnvironment::new().await;
    env.mock_blocked_recipient(BLOCKED).await;
    env.mock_all_telegram_api().await;
    {
        let conn = get_connection(&env.db_pool).unwrap();
        for user_id in [11, BLOCKED, 13] {
            db::register_user(&conn, user_id, Some("Reader"), None).unwrap();
        }
        let text = db::add_news(&conn, NewsKind::Text, "Yangilik", "Salom hammaga").unwrap();
        let photo = db::add_news(&conn, NewsKind::Photo, "Yangi poster", "poster-file-77").unwrap();
        db::add_news(&conn, NewsKind::Text, "", "Draft only").unwrap();
        db::set_news_scheduled(&conn, text, true).unwrap();
        db::set_news_scheduled(&conn, photo, true).unwrap();
    }

    let report = run_news_job(&env.bot, &env.db_pool).await.unwrap();

    assert_eq!(
        report,
        BroadcastReport {
            total: 6,
            delivered: 4,
            failed: 2
        }
    );

    let texts = env.sent_texts().await;
    assert_eq!(texts.len(), 3);
    assert!(texts.iter().all(|t| t == "Yangilik\n\nSalom hammaga"));

    let photos = env.raw_requests_to("sendPhoto").await;
    assert_eq!(photos.len(), 3);
    assert!(photos
        .iter()
        .all(|body| body.contains("poster-file-77") && body.contains("Yangi poster")));
    assert!(env.raw_requests_to("sendVideo").await.is_empty());
}

#[tokio::test]
#[serial]
async fn test_daily_news_without_scheduled_items_sends_nothing() {
    let env = TestEnvironment::new().await;
    env.mock_all_telegram_api().await;
    {
        let conn = get_connection(&env.db_pool).unwrap();
        db::register_user(&conn, 11, Some("Reader"), None).unwrap();
        db::add_news(&conn, NewsKind::Text, "", "Draft only").unwrap();
    }

    let report = run_news_job(&env.bot, &env.db_pool).await.unwrap();

    assert_eq!(report, BroadcastReport::default());
    assert!(env.mock_server.received_requests().await.unwrap_or_default().is_empty());
}
