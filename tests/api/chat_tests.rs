//! Chat API Tests

use axum::http::StatusCode;
use serde_json::Value;

use chat_system::application::pipeline::Outcome;
use chat_system::domain::{ChatCreation, Task};

use crate::common::TestApp;

#[tokio::test]
async fn test_create_chat_is_accepted_before_persistence() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;

    let (status, body) = app
        .post_json(&format!("/applications/{token}/chats"), Value::Null)
        .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["chat_number"], 1);
    assert_eq!(app.queue.pending(), 1);

    // Not listed until the dispatcher applied it
    let (_, chats) = app.get(&format!("/applications/{token}/chats")).await;
    assert!(chats.as_array().unwrap().is_empty());

    assert_eq!(app.drain().await, vec![Outcome::Applied]);
    let (_, chats) = app.get(&format!("/applications/{token}/chats")).await;
    assert_eq!(chats[0]["chat_number"], 1);
    assert_eq!(chats[0]["messages_count"], 0);
}

#[tokio::test]
async fn test_chat_numbers_are_scoped_per_application() {
    let app = TestApp::new();
    let shop = app.create_application("shop").await;
    let blog = app.create_application("blog").await;

    assert_eq!(app.create_chat(&shop).await, 1);
    assert_eq!(app.create_chat(&shop).await, 2);
    assert_eq!(app.create_chat(&blog).await, 1);
}

#[tokio::test]
async fn test_enqueued_task_carries_allocated_number() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    app.post_json(&format!("/applications/{token}/chats"), Value::Null)
        .await;

    let stop = tokio_util::sync::CancellationToken::new();
    stop.cancel();
    let delivery = chat_system::application::pipeline::TaskQueue::dequeue(app.queue.as_ref(), &stop)
        .await
        .unwrap()
        .unwrap();

    let Task::ChatCreation(ChatCreation { chat_number, .. }) = Task::decode(&delivery.raw).unwrap()
    else {
        panic!("expected a chat creation");
    };
    assert_eq!(chat_number, 1);
}

#[tokio::test]
async fn test_chat_for_unknown_application_is_not_found() {
    let app = TestApp::new();

    let (status, _) = app.post_json("/applications/nope/chats", Value::Null).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.queue.pending(), 0);
}
