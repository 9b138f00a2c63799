//! Background worker loops

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use chat_system::application::pipeline::{DispatcherConfig, TaskQueue, Worker};
use chat_system::config::WriteSerialization;
use chat_system::infrastructure::memory::MemorySearchIndex;

use crate::common::{fast_retry, TestApp};

/// Poll `uri` until its JSON array holds `expected` entries.
async fn wait_for_len(app: &TestApp, uri: &str, expected: usize) -> Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let (_, body) = app.get(uri).await;
        if body.as_array().map(Vec::len) == Some(expected) {
            return body;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {expected} entries at {uri}, last: {body}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn spawn(app: &TestApp) -> Worker {
    Worker::spawn(
        app.dispatcher.clone(),
        app.reconciler.clone(),
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn test_worker_applies_queued_tasks() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let worker = spawn(&app);

    let (_, body) = app
        .post_json(&format!("/applications/{token}/chats"), Value::Null)
        .await;
    let chat = body["chat_number"].as_i64().unwrap();
    wait_for_len(&app, &format!("/applications/{token}/chats"), 1).await;

    for text in ["first", "second"] {
        app.post_message(&token, chat, text).await;
    }
    let messages = wait_for_len(
        &app,
        &format!("/applications/{token}/chats/{chat}/messages"),
        2,
    )
    .await;
    assert_eq!(messages[0]["body"], "first");
    assert_eq!(messages[1]["body"], "second");
    assert_eq!(app.search.len(), 2);
    assert_eq!(app.queue.processing(), 0);

    tokio::time::timeout(Duration::from_secs(1), worker.shutdown())
        .await
        .expect("worker did not stop");
}

#[tokio::test]
async fn test_per_scope_writes_across_chats() {
    let config = DispatcherConfig {
        write_serialization: WriteSerialization::PerScope,
        max_in_flight: 4,
        retry: fast_retry(3),
    };
    let index = Arc::new(MemorySearchIndex::new());
    let app = TestApp::with_indexer(index.clone(), config);
    let token = app.create_application("shop").await;
    let first = app.create_chat(&token).await;
    let second = app.create_chat(&token).await;

    let worker = spawn(&app);
    for i in 0..10 {
        app.post_message(&token, first, &format!("first {i}")).await;
        app.post_message(&token, second, &format!("second {i}")).await;
    }

    for chat in [first, second] {
        let messages = wait_for_len(
            &app,
            &format!("/applications/{token}/chats/{chat}/messages?limit=100"),
            10,
        )
        .await;
        let numbers: Vec<i64> = messages
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["message_number"].as_i64().unwrap())
            .collect();
        assert_eq!(numbers, (1..=10).collect::<Vec<_>>());
    }
    assert_eq!(index.len(), 20);

    worker.shutdown().await;
}

#[tokio::test]
async fn test_unacknowledged_delivery_is_recovered_on_start() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let chat = app.create_chat(&token).await;
    app.post_message(&token, chat, "left behind").await;

    // A consumer took the task and died before acknowledging it
    let delivery = app.queue.dequeue(&CancellationToken::new()).await.unwrap();
    assert!(delivery.is_some());
    assert_eq!(app.queue.processing(), 1);
    assert_eq!(app.queue.pending(), 0);

    let worker = spawn(&app);
    let messages = wait_for_len(
        &app,
        &format!("/applications/{token}/chats/{chat}/messages"),
        1,
    )
    .await;
    assert_eq!(messages[0]["body"], "left behind");
    assert_eq!(app.queue.processing(), 0);

    worker.shutdown().await;
}

#[tokio::test]
async fn test_cancelled_token_stops_worker() {
    let app = TestApp::new();
    let cancel = CancellationToken::new();
    let worker = Worker::spawn(app.dispatcher.clone(), app.reconciler.clone(), cancel.clone());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), worker.shutdown())
        .await
        .expect("worker did not stop");
}
