//! Dispatcher outcomes for one delivery at a time

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use chat_system::application::pipeline::{
    Dispatcher, DispatcherConfig, FailureStage, MessageDocument, Outcome, Persister,
    SearchIndexer, TaskQueue,
};
use chat_system::config::WriteSerialization;
use chat_system::domain::{
    ApplicationRepository, ChatCreation, ChatRepository, Message, MessageCreation,
    MessageRepository, Task,
};
use chat_system::infrastructure::memory::MemorySearchIndex;
use chat_system::infrastructure::search::SearchError;
use chat_system::shared::error::AppError;

use crate::common::{fast_retry, TestApp};

/// Fails the first `failures` index calls with the given status.
struct FlakyIndexer {
    inner: MemorySearchIndex,
    failures: u32,
    status: u16,
    calls: AtomicU32,
}

impl FlakyIndexer {
    fn new(failures: u32, status: u16) -> Arc<Self> {
        Arc::new(Self {
            inner: MemorySearchIndex::new(),
            failures,
            status,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchIndexer for FlakyIndexer {
    async fn ensure_index(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn index(&self, message: &Message) -> Result<(), AppError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(SearchError::Status {
                status: self.status,
                body: "unavailable".into(),
            }
            .into());
        }
        self.inner.index(message).await
    }

    async fn search(&self, chat_id: i64, query: &str) -> Result<Vec<MessageDocument>, AppError> {
        self.inner.search(chat_id, query).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

fn config(max_attempts: u32) -> DispatcherConfig {
    DispatcherConfig {
        write_serialization: WriteSerialization::Global,
        max_in_flight: 1,
        retry: fast_retry(max_attempts),
    }
}

/// Application with one persisted chat; returns the chat's internal id.
async fn seeded(app: &TestApp) -> i64 {
    let token = app.create_application("shop").await;
    let number = app.create_chat(&token).await;
    let application = app.store.find_by_token(&token).await.unwrap().unwrap();
    ChatRepository::find_by_number(app.store.as_ref(), application.id, number)
        .await
        .unwrap()
        .unwrap()
        .id
}

fn message_task(chat_id: i64, message_number: i64, body: &str) -> Task {
    Task::MessageCreation(MessageCreation {
        chat_id,
        message_number,
        body: body.into(),
    })
}

#[tokio::test]
async fn test_chat_creation_is_applied() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let application = app.store.find_by_token(&token).await.unwrap().unwrap();

    app.queue
        .enqueue(&Task::ChatCreation(ChatCreation {
            application_id: application.id,
            chat_number: 1,
        }))
        .await
        .unwrap();

    assert_eq!(app.drain().await, vec![Outcome::Applied]);
    let chat = ChatRepository::find_by_number(app.store.as_ref(), application.id, 1)
        .await
        .unwrap();
    assert!(chat.is_some());
    assert_eq!(app.queue.processing(), 0);
}

#[tokio::test]
async fn test_two_messages_persist_and_index() {
    let app = TestApp::new();
    let chat_id = seeded(&app).await;

    for n in 1..=2 {
        let body: String = Sentence(3..6).fake();
        app.queue.enqueue(&message_task(chat_id, n, &body)).await.unwrap();
    }

    assert_eq!(app.drain().await, vec![Outcome::Applied, Outcome::Applied]);
    let stored = app.store.list_by_chat(chat_id, None, 10).await.unwrap();
    let numbers: Vec<i64> = stored.iter().map(|m| m.message_number).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert!(app.search.get(&format!("{chat_id}-1")).is_some());
    assert!(app.search.get(&format!("{chat_id}-2")).is_some());
}

#[tokio::test]
async fn test_redelivery_is_reported_as_duplicate() {
    let app = TestApp::new();
    let chat_id = seeded(&app).await;
    let task = message_task(chat_id, 1, "hello");

    app.queue.enqueue(&task).await.unwrap();
    app.queue.enqueue(&task).await.unwrap();

    assert_eq!(app.drain().await, vec![Outcome::Applied, Outcome::Duplicate]);
    assert_eq!(app.store.list_by_chat(chat_id, None, 10).await.unwrap().len(), 1);
    assert_eq!(app.search.len(), 1);
    assert!(app.queue.dead_letters().is_empty());
}

#[tokio::test]
async fn test_number_collision_with_different_body_is_dead_lettered() {
    let app = TestApp::new();
    let chat_id = seeded(&app).await;

    app.queue.enqueue(&message_task(chat_id, 1, "old body")).await.unwrap();
    assert_eq!(app.drain().await, vec![Outcome::Applied]);

    // Counter store lost its state and handed out number 1 again
    app.queue
        .enqueue(&message_task(chat_id, 1, "brand new body"))
        .await
        .unwrap();
    assert_eq!(app.drain().await, vec![Outcome::DeadLettered]);

    let stored = app.store.list_by_chat(chat_id, None, 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].body, "old body");

    let letters = app.queue.dead_letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].stage, FailureStage::Persist);
    assert!(letters[0].reason.contains("number collision"), "{}", letters[0].reason);
    assert_eq!(
        Task::decode(&letters[0].raw).unwrap(),
        message_task(chat_id, 1, "brand new body")
    );
    assert_eq!(app.queue.processing(), 0);
}

#[tokio::test]
async fn test_duplicate_message_is_reindexed() {
    let indexer = FlakyIndexer::new(0, 503);
    let app = TestApp::with_indexer(indexer.clone(), config(1));
    let chat_id = seeded(&app).await;
    MessageRepository::insert(app.store.as_ref(), chat_id, 1, "already there")
        .await
        .unwrap();

    app.queue.enqueue(&message_task(chat_id, 1, "already there")).await.unwrap();

    assert_eq!(app.drain().await, vec![Outcome::Duplicate]);
    assert_eq!(indexer.calls(), 1);
    assert!(indexer.inner.get(&format!("{chat_id}-1")).is_some());
}

#[tokio::test]
async fn test_garbage_is_dead_lettered_at_decode() {
    let app = TestApp::new();
    app.queue.push_raw("not json at all");

    assert_eq!(app.drain().await, vec![Outcome::DeadLettered]);

    let letters = app.queue.dead_letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].stage, FailureStage::Decode);
    assert_eq!(letters[0].raw, "not json at all");
    assert_eq!(app.queue.processing(), 0);
}

#[tokio::test]
async fn test_unknown_kind_is_dead_lettered() {
    let app = TestApp::new();
    app.queue
        .push_raw(r#"{"type":"chat_deletion","payload":{"app_id":1,"chat_number":1}}"#);

    assert_eq!(app.drain().await, vec![Outcome::DeadLettered]);
    let letters = app.queue.dead_letters();
    assert!(letters[0].reason.contains("chat_deletion"));
}

#[tokio::test]
async fn test_message_for_missing_chat_is_dead_lettered_at_persist() {
    let app = TestApp::new();
    app.queue.enqueue(&message_task(404, 1, "orphan")).await.unwrap();

    assert_eq!(app.drain().await, vec![Outcome::DeadLettered]);
    let letters = app.queue.dead_letters();
    assert_eq!(letters[0].stage, FailureStage::Persist);
    assert_eq!(letters[0].attempts, 1);
}

#[tokio::test]
async fn test_transient_index_failure_is_retried() {
    let indexer = FlakyIndexer::new(2, 503);
    let app = TestApp::with_indexer(indexer.clone(), config(3));
    let chat_id = seeded(&app).await;

    app.queue.enqueue(&message_task(chat_id, 1, "hello")).await.unwrap();

    assert_eq!(app.drain().await, vec![Outcome::Applied]);
    assert_eq!(indexer.calls(), 3);
    assert!(app.queue.dead_letters().is_empty());
}

#[tokio::test]
async fn test_exhausted_retries_are_dead_lettered_at_index() {
    let indexer = FlakyIndexer::new(10, 503);
    let app = TestApp::with_indexer(indexer.clone(), config(3));
    let chat_id = seeded(&app).await;

    app.queue.enqueue(&message_task(chat_id, 1, "hello")).await.unwrap();

    assert_eq!(app.drain().await, vec![Outcome::DeadLettered]);
    let letters = app.queue.dead_letters();
    assert_eq!(letters[0].stage, FailureStage::Index);
    assert_eq!(letters[0].attempts, 3);
    // The row stays; only indexing gave up
    assert_eq!(app.store.list_by_chat(chat_id, None, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_permanent_index_failure_is_not_retried() {
    let indexer = FlakyIndexer::new(10, 400);
    let app = TestApp::with_indexer(indexer.clone(), config(5));
    let chat_id = seeded(&app).await;

    app.queue.enqueue(&message_task(chat_id, 1, "hello")).await.unwrap();

    assert_eq!(app.drain().await, vec![Outcome::DeadLettered]);
    assert_eq!(indexer.calls(), 1);
}

#[tokio::test]
async fn test_starting_consumer_leaves_other_in_flight_deliveries_alone() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let (_, body) = app
        .post_json(&format!("/applications/{token}/chats"), serde_json::Value::Null)
        .await;
    let chat_number = body["chat_number"].as_i64().unwrap();

    // First instance holds the delivery while a second one starts up
    let held = app.queue.dequeue(&CancellationToken::new()).await.unwrap().unwrap();
    let second = Arc::new(Dispatcher::new(
        Arc::new(app.queue.consumer("second")),
        Persister::new(app.store.clone(), app.store.clone()),
        app.search.clone(),
        config(3),
    ));
    let cancel = CancellationToken::new();
    let running = tokio::spawn(second.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(app.queue.processing(), 1);
    assert_eq!(app.queue.pending(), 0);

    assert_eq!(app.dispatcher.process(held).await, Outcome::Applied);
    assert_eq!(app.queue.processing(), 0);
    let application = app.store.find_by_token(&token).await.unwrap().unwrap();
    let chat = ChatRepository::find_by_number(app.store.as_ref(), application.id, chat_number)
        .await
        .unwrap();
    assert!(chat.is_some());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), running)
        .await
        .expect("second dispatcher did not stop")
        .unwrap();
}
