//! Common test utilities
//!
//! A wiremock server standing in for the Bot API, a file-backed database and
//! JSON builders for the Telegram objects handlers receive.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use teloxide::types::{CallbackQuery, Me, Message, Update};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kinotreyler::storage::{create_pool, DbPool};
use kinotreyler::telegram::Bot;

pub const BOT_ID: u64 = 987654321;
pub const PRIMARY_ADMIN: i64 = 1000;

/// Test harness: mock Bot API, a bot pointing at it and a fresh database
pub struct TestEnvironment {
    pub mock_server: MockServer,
    pub bot: Bot,
    pub db_pool: Arc<DbPool>,
    _db_dir: TempDir,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let mock_server = MockServer::start().await;
        let bot = Bot::new("test_token_12345:ABCDEF").set_api_url(mock_server.uri().parse().unwrap());

        let db_dir = TempDir::new().unwrap();
        let db_path = db_dir.path().join("kinotreyler.db");
        let db_pool = Arc::new(create_pool(db_path.to_str().unwrap()).expect("Failed to create test database"));

        Self {
            mock_server,
            bot,
            db_pool,
            _db_dir: db_dir,
        }
    }

    /// Answers every Bot API call with a plausible success.
    ///
    /// Specific mocks must be mounted before this one to take precedence.
    pub async fn mock_all_telegram_api(&self) {
        Mock::given(method("POST"))
            .and(path_regex("(?i)/bot[^/]+/answerCallbackQuery"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": true })))
            .mount(&self.mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path_regex("(?i)/bot[^/]+/setMyCommands"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": true })))
            .mount(&self.mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_message_json()))
            .mount(&self.mock_server)
            .await;
    }

    /// `getChatMember` for `user_id` answers with `status`.
    pub async fn mock_chat_member(&self, user_id: i64, status: &str) {
        Mock::given(method("POST"))
            .and(path_regex("(?i)/bot[^/]+/getChatMember"))
            .and(body_partial_json(json!({ "user_id": user_id })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {
                    "status": status,
                    "user": { "id": user_id, "is_bot": false, "first_name": "Test" }
                }
            })))
            .mount(&self.mock_server)
            .await;
    }

    /// Any send to `chat_id` fails as if the user blocked the bot.
    pub async fn mock_blocked_chat(&self, chat_id: i64) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "chat_id": chat_id })))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&self.mock_server)
            .await;
    }

    /// Like [`Self::mock_blocked_chat`], but also catches multipart media sends.
    ///
    /// Matches on the id anywhere in the body, so use an id that appears
    /// nowhere else in the test data.
    pub async fn mock_blocked_recipient(&self, chat_id: i64) {
        Mock::given(method("POST"))
            .and(body_string_contains(chat_id.to_string()))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&self.mock_server)
            .await;
    }

    /// Request bodies sent to one Bot API method, in order.
    pub async fn requests_to(&self, api_method: &str) -> Vec<Value> {
        let suffix = format!("/{}", api_method.to_lowercase());
        self.mock_server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().to_lowercase().ends_with(&suffix))
            .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
            .collect()
    }

    /// Raw request bodies sent to one Bot API method.
    ///
    /// Media sends may be multipart, so callers search these as text.
    pub async fn raw_requests_to(&self, api_method: &str) -> Vec<String> {
        let suffix = format!("/{}", api_method.to_lowercase());
        self.mock_server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().to_lowercase().ends_with(&suffix))
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }

    /// Texts of every `sendMessage` call, in order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.requests_to("sendMessage")
            .await
            .iter()
            .filter_map(|body| body["text"].as_str().map(str::to_string))
            .collect()
    }
}

fn sent_message_json() -> Value {
    json!({
        "ok": true,
        "result": {
            "message_id": 42,
            "from": { "id": BOT_ID, "is_bot": true, "first_name": "TestBot", "username": "test_bot" },
            "chat": { "id": 123456789, "type": "private" },
            "date": 1735992000,
            "text": "Response"
        }
    })
}

fn user_json(user_id: i64) -> Value {
    json!({
        "id": user_id,
        "is_bot": false,
        "first_name": "Test",
        "username": "testuser",
        "language_code": "uz"
    })
}

/// What `getMe` returns for the test bot; command filters need it.
pub fn me() -> Me {
    serde_json::from_value(json!({
        "id": BOT_ID,
        "is_bot": true,
        "first_name": "TestBot",
        "username": "test_bot",
        "can_join_groups": false,
        "can_read_all_group_messages": false,
        "supports_inline_queries": false,
        "can_connect_to_business": false,
        "has_main_web_app": false
    }))
    .expect("Failed to deserialize Me")
}

/// Private-chat message with `extra` merged into the message object
pub fn message_with(user_id: i64, extra: Value) -> Message {
    serde_json::from_value(message_json(user_id, extra)).expect("Failed to deserialize message")
}

/// Incoming text message wrapped in an update, as the dispatcher receives it.
pub fn text_update(user_id: i64, text: &str) -> Update {
    // `Update` only deserializes reliably from text, not from a `Value`.
    serde_json::from_str(
        &json!({
            "update_id": 1,
            "message": message_json(user_id, json!({ "text": text }))
        })
        .to_string(),
    )
    .expect("Failed to deserialize update")
}

fn message_json(user_id: i64, extra: Value) -> Value {
    let mut json = json!({
        "message_id": 1,
        "date": 1735992000,
        "chat": { "id": user_id, "type": "private", "first_name": "Test" },
        "from": user_json(user_id)
    });
    if let (Some(target), Some(fields)) = (json.as_object_mut(), extra.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    json
}

pub fn text_message(user_id: i64, text: &str) -> Message {
    message_with(user_id, json!({ "text": text }))
}

pub fn video_message(user_id: i64, file_id: &str) -> Message {
    message_with(
        user_id,
        json!({
            "video": {
                "file_id": file_id,
                "file_unique_id": "unique",
                "width": 1280,
                "height": 720,
                "duration": 90,
                "mime_type": "video/mp4"
            }
        }),
    )
}

pub fn callback_query(user_id: i64, data: &str) -> CallbackQuery {
    let json = json!({
        "id": "callback_123",
        "from": user_json(user_id),
        "message": {
            "message_id": 42,
            "date": 1735992000,
            "chat": { "id": user_id, "type": "private", "first_name": "Test" },
            "from": { "id": BOT_ID, "is_bot": true, "first_name": "TestBot" },
            "text": "Original message"
        },
        "chat_instance": "chat_instance_123",
        "data": data
    });
    serde_json::from_value(json).expect("Failed to deserialize callback")
}
