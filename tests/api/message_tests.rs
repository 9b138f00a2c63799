//! Message API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use chat_system::application::pipeline::Outcome;

use crate::common::TestApp;

fn numbers(body: &serde_json::Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|m| m["message_number"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_messages_are_numbered_and_listed_in_order() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let chat = app.create_chat(&token).await;

    assert_eq!(app.post_message(&token, chat, "first").await, 1);
    assert_eq!(app.post_message(&token, chat, "second").await, 2);
    assert_eq!(app.drain().await, vec![Outcome::Applied, Outcome::Applied]);

    let (status, body) = app
        .get(&format!("/applications/{token}/chats/{chat}/messages"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(numbers(&body), vec![1, 2]);
    assert_eq!(body[0]["body"], "first");
}

#[tokio::test]
async fn test_keyset_pagination() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let chat = app.create_chat(&token).await;
    for i in 0..5 {
        app.post_message(&token, chat, &format!("m{i}")).await;
    }
    app.drain().await;

    let (_, page) = app
        .get(&format!("/applications/{token}/chats/{chat}/messages?after=2&limit=2"))
        .await;
    assert_eq!(numbers(&page), vec![3, 4]);
}

#[tokio::test]
async fn test_limit_out_of_range_is_rejected() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let chat = app.create_chat(&token).await;

    let (status, _) = app
        .get(&format!("/applications/{token}/chats/{chat}/messages?limit=1000"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_message_to_unpersisted_chat_is_not_found() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    app.post_json(&format!("/applications/{token}/chats"), serde_json::Value::Null)
        .await;

    // Chat 1 is allocated but still queued
    let (status, _) = app
        .post_json(
            &format!("/applications/{token}/chats/1/messages"),
            json!({ "body": "too early" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_body_is_rejected() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let chat = app.create_chat(&token).await;

    let (status, _) = app
        .post_json(
            &format!("/applications/{token}/chats/{chat}/messages"),
            json!({ "body": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.queue.pending(), 0);
}

#[tokio::test]
async fn test_search_round_trip() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let chat = app.create_chat(&token).await;
    app.post_message(&token, chat, "hello world").await;
    app.post_message(&token, chat, "goodbye").await;
    app.drain().await;

    let search = |q: &str| format!("/applications/{token}/chats/{chat}/messages/search?q={q}");

    let (status, body) = app.get(&search("hello")).await;
    assert_eq!(status, StatusCode::OK);
    let hits = body["messages"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["body"], "hello world");

    let (_, body) = app.get(&search("xyz123")).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_does_not_leak_across_chats() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let first = app.create_chat(&token).await;
    let second = app.create_chat(&token).await;
    app.post_message(&token, first, "hello").await;
    app.drain().await;

    let (_, body) = app
        .get(&format!("/applications/{token}/chats/{second}/messages/search?q=hello"))
        .await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_query_is_bad_request() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let chat = app.create_chat(&token).await;

    let (status, _) = app
        .get(&format!("/applications/{token}/chats/{chat}/messages/search"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
