use super::polling::incoming_from_update;
use super::send::split_message;
use super::types::{TgChat, TgUpdate};
use super::TelegramChannel;
use checkdoc_core::config::{TelegramConfig, TelegramMode};
use checkdoc_core::message::OutgoingMessage;
use checkdoc_core::traits::Channel;
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

const TOKEN: &str = "123:test";

fn config(mode: TelegramMode) -> TelegramConfig {
    TelegramConfig {
        enabled: true,
        bot_token: TOKEN.into(),
        mode,
        webhook_base: "https://bot.example".into(),
        ..Default::default()
    }
}

fn path(method: &str) -> String {
    format!("/bot{TOKEN}/{method}")
}

fn text_update(update_id: i64, user_id: i64, text: &str) -> serde_json::Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": 1,
            "from": {"id": user_id, "first_name": "Ann", "username": "ann"},
            "chat": {"id": user_id, "type": "private"},
            "text": text,
        }
    })
}

#[test]
fn test_split_short_message() {
    let chunks = split_message("hello", 4096);
    assert_eq!(chunks, vec!["hello"]);
}

#[test]
fn test_split_long_message() {
    let text = "a\n".repeat(3000);
    let chunks = split_message(&text, 4096);
    assert!(chunks.len() >= 2);
    for chunk in &chunks {
        assert!(chunk.len() <= 4096);
    }
    assert_eq!(chunks.concat(), text);
}

#[test]
fn test_split_respects_char_boundaries() {
    // Cyrillic letters are two bytes each.
    let text = "Привет".repeat(1000);
    let chunks = split_message(&text, 4095);
    assert!(chunks.len() >= 2);
    assert_eq!(chunks.concat(), text);
    for chunk in &chunks {
        assert!(chunk.len() <= 4095);
    }
}

#[test]
fn test_text_update_becomes_incoming() {
    let update: TgUpdate = serde_json::from_value(text_update(10, 42, "I have a fever")).unwrap();
    let incoming = incoming_from_update(update).unwrap();
    assert_eq!(incoming.channel, "telegram");
    assert_eq!(incoming.sender_id, "42");
    assert_eq!(incoming.sender_name.as_deref(), Some("@ann"));
    assert_eq!(incoming.text, "I have a fever");
    assert_eq!(incoming.reply_target.as_deref(), Some("42"));
    assert_eq!(incoming.session_key(), "telegram:42");
}

#[test]
fn test_non_text_update_is_skipped() {
    let update: TgUpdate = serde_json::from_value(json!({
        "update_id": 11,
        "message": {
            "message_id": 2,
            "from": {"id": 42, "first_name": "Ann"},
            "chat": {"id": 42},
            "photo": [{"file_id": "x", "width": 1, "height": 1}]
        }
    }))
    .unwrap();
    assert!(incoming_from_update(update).is_none());

    let no_message: TgUpdate = serde_json::from_value(json!({"update_id": 12})).unwrap();
    assert!(incoming_from_update(no_message).is_none());
}

#[test]
fn test_tg_chat_ignores_extra_fields() {
    let chat: TgChat = serde_json::from_str(r#"{"id": -100123, "type": "group"}"#).unwrap();
    assert_eq!(chat.id, -100123);
}

#[tokio::test]
async fn test_feed_update_before_start_fails() {
    let channel = TelegramChannel::new(config(TelegramMode::Webhook));
    let err = channel.feed_update(text_update(1, 42, "hi")).await.unwrap_err();
    assert!(err.to_string().contains("before channel start"));
}

#[tokio::test]
async fn test_webhook_mode_delivers_and_dedupes_updates() {
    let mut server = mockito::Server::new_async().await;
    let _commands = server
        .mock("POST", path("setMyCommands").as_str())
        .with_status(200)
        .with_body(r#"{"ok": true, "result": true}"#)
        .create_async()
        .await;
    let set_webhook = server
        .mock("POST", path("setWebhook").as_str())
        .match_body(Matcher::PartialJson(json!({
            "url": "https://bot.example/telegram/webhook"
        })))
        .with_status(200)
        .with_body(r#"{"ok": true, "result": true}"#)
        .create_async()
        .await;

    let channel = TelegramChannel::with_api_url(config(TelegramMode::Webhook), &server.url());
    assert!(!channel.webhook_active().await);
    let mut rx = channel.start().await.unwrap();
    set_webhook.assert_async().await;
    assert!(channel.webhook_active().await);

    assert!(channel.feed_update(text_update(5, 42, "hello")).await.unwrap());
    let msg = rx.recv().await.unwrap();
    assert_eq!(msg.text, "hello");

    // Redelivery of the same update is ignored.
    assert!(!channel.feed_update(text_update(5, 42, "hello")).await.unwrap());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_webhook_accepts_out_of_order_updates() {
    let mut server = mockito::Server::new_async().await;
    let _commands = server
        .mock("POST", path("setMyCommands").as_str())
        .with_status(200)
        .with_body(r#"{"ok": true, "result": true}"#)
        .create_async()
        .await;
    let _set_webhook = server
        .mock("POST", path("setWebhook").as_str())
        .with_status(200)
        .with_body(r#"{"ok": true, "result": true}"#)
        .create_async()
        .await;

    let channel = TelegramChannel::with_api_url(config(TelegramMode::Webhook), &server.url());
    let mut rx = channel.start().await.unwrap();

    // Parallel webhook connections can land a higher id first.
    assert!(channel.feed_update(text_update(11, 7, "first")).await.unwrap());
    assert!(channel.feed_update(text_update(10, 42, "second")).await.unwrap());

    let a = rx.recv().await.unwrap();
    let b = rx.recv().await.unwrap();
    assert_eq!((a.sender_id.as_str(), a.text.as_str()), ("7", "first"));
    assert_eq!((b.sender_id.as_str(), b.text.as_str()), ("42", "second"));

    assert!(!channel.feed_update(text_update(11, 7, "first")).await.unwrap());
    assert!(!channel.feed_update(text_update(10, 42, "second")).await.unwrap());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_webhook_rejected_fails_start() {
    let mut server = mockito::Server::new_async().await;
    let _commands = server
        .mock("POST", path("setMyCommands").as_str())
        .with_status(200)
        .with_body(r#"{"ok": true, "result": true}"#)
        .create_async()
        .await;
    let _set_webhook = server
        .mock("POST", path("setWebhook").as_str())
        .with_status(400)
        .with_body(r#"{"ok": false, "description": "Bad Request: bad webhook"}"#)
        .create_async()
        .await;

    let channel = TelegramChannel::with_api_url(config(TelegramMode::Webhook), &server.url());
    let err = channel.start().await.unwrap_err();
    assert!(err.to_string().contains("bad webhook"));
    assert!(!channel.webhook_active().await);
}

#[tokio::test]
async fn test_polling_mode_yields_updates() {
    let mut server = mockito::Server::new_async().await;
    let _commands = server
        .mock("POST", path("setMyCommands").as_str())
        .with_status(200)
        .with_body(r#"{"ok": true, "result": true}"#)
        .create_async()
        .await;
    let delete_webhook = server
        .mock("POST", path("deleteWebhook").as_str())
        .match_query(Matcher::UrlEncoded(
            "drop_pending_updates".into(),
            "true".into(),
        ))
        .with_status(200)
        .with_body(r#"{"ok": true, "result": true}"#)
        .create_async()
        .await;
    let body = json!({"ok": true, "result": [text_update(7, 99, "ping me")]});
    let _updates = server
        .mock("GET", path("getUpdates").as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let channel = TelegramChannel::with_api_url(config(TelegramMode::Polling), &server.url());
    let mut rx = channel.start().await.unwrap();
    delete_webhook.assert_async().await;

    let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.sender_id, "99");
    assert_eq!(msg.text, "ping me");

    channel.stop().await.unwrap();
}

#[tokio::test]
async fn test_send_falls_back_to_plain_text() {
    let mut server = mockito::Server::new_async().await;
    let html = server
        .mock("POST", path("sendMessage").as_str())
        .match_body(Matcher::PartialJson(json!({"parse_mode": "HTML"})))
        .with_status(400)
        .with_body(r#"{"ok": false, "description": "Bad Request: can't parse entities"}"#)
        .expect(1)
        .create_async()
        .await;
    let plain = server
        .mock("POST", path("sendMessage").as_str())
        .match_body(Matcher::Json(json!({"chat_id": 5, "text": "1 < 2"})))
        .with_status(200)
        .with_body(r#"{"ok": true, "result": {}}"#)
        .expect(1)
        .create_async()
        .await;

    let channel = TelegramChannel::with_api_url(config(TelegramMode::Polling), &server.url());
    channel
        .send(OutgoingMessage {
            text: "1 < 2".into(),
            reply_target: Some("5".into()),
        })
        .await
        .unwrap();

    html.assert_async().await;
    plain.assert_async().await;
}

#[tokio::test]
async fn test_send_requires_numeric_target() {
    let channel = TelegramChannel::new(config(TelegramMode::Polling));
    let missing = channel
        .send(OutgoingMessage {
            text: "x".into(),
            reply_target: None,
        })
        .await;
    assert!(missing.is_err());

    let bad = channel
        .send(OutgoingMessage {
            text: "x".into(),
            reply_target: Some("abc".into()),
        })
        .await;
    assert!(bad.unwrap_err().to_string().contains("invalid telegram chat_id"));
}
