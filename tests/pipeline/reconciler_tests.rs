//! Counter reconciliation end to end

use pretty_assertions::assert_eq;

use chat_system::application::pipeline::{ReconcileReport, SequenceAllocator};
use chat_system::domain::SequenceScope;

use crate::common::TestApp;

#[tokio::test]
async fn test_counters_converge_and_second_run_is_clean() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let chat = app.create_chat(&token).await;
    app.create_chat(&token).await;
    for text in ["a", "b", "c"] {
        app.post_message(&token, chat, text).await;
    }
    app.drain().await;

    // Inserts never touch the denormalized counters
    let (_, body) = app.get(&format!("/applications/{token}")).await;
    assert_eq!(body["chats_count"], 0);

    let report = app.reconciler.reconcile().await.unwrap();
    assert_eq!(report.applications_corrected, 1);
    assert_eq!(report.chats_corrected, 1);

    let (_, body) = app.get(&format!("/applications/{token}")).await;
    assert_eq!(body["chats_count"], 2);
    let (_, chats) = app.get(&format!("/applications/{token}/chats")).await;
    assert_eq!(chats[0]["messages_count"], 3);
    assert_eq!(chats[1]["messages_count"], 0);

    let second = app.reconciler.reconcile().await.unwrap();
    assert!(second.is_clean(), "{second:?}");
}

#[tokio::test]
async fn test_removed_rows_are_reflected() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    app.create_chat(&token).await;
    tokio_test::assert_ok!(app.reconciler.reconcile().await);

    let (_, chats) = app.get(&format!("/applications/{token}/chats")).await;
    assert_eq!(chats.as_array().unwrap().len(), 1);
    let application = chat_system::domain::ApplicationRepository::find_by_token(
        app.store.as_ref(),
        &token,
    )
    .await
    .unwrap()
    .unwrap();
    let chat = chat_system::domain::ChatRepository::find_by_number(
        app.store.as_ref(),
        application.id,
        1,
    )
    .await
    .unwrap()
    .unwrap();
    app.store.delete_chat(chat.id);

    let report = app.reconciler.reconcile().await.unwrap();
    assert_eq!(report.applications_corrected, 1);
    let (_, body) = app.get(&format!("/applications/{token}")).await;
    assert_eq!(body["chats_count"], 0);
}

#[tokio::test]
async fn test_lost_counters_are_raised_to_persisted_maximum() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    let chat = app.create_chat(&token).await;
    app.post_message(&token, chat, "one").await;
    app.post_message(&token, chat, "two").await;
    app.drain().await;

    // Counter store flushed
    app.sequences.clear();

    let report = app.reconciler.reconcile().await.unwrap();
    assert_eq!(report.sequences_raised, 2);

    // Allocation resumes after the highest persisted number
    assert_eq!(app.post_message(&token, chat, "three").await, 3);
    let (_, body) = app
        .post_json(&format!("/applications/{token}/chats"), serde_json::Value::Null)
        .await;
    assert_eq!(body["chat_number"], 2);
}

#[tokio::test]
async fn test_sequence_sync_never_lowers_counters() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    app.create_chat(&token).await;

    // Allocated but never persisted: the counter is ahead of the rows
    let application = chat_system::domain::ApplicationRepository::find_by_token(
        app.store.as_ref(),
        &token,
    )
    .await
    .unwrap()
    .unwrap();
    let scope = SequenceScope::Application(application.id);
    app.sequences.next(scope).await.unwrap();
    app.sequences.next(scope).await.unwrap();

    let report = app.reconciler.reconcile().await.unwrap();
    assert_eq!(
        report,
        ReconcileReport {
            applications_corrected: 1,
            chats_corrected: 0,
            sequences_raised: 0,
        }
    );
    assert_eq!(app.sequences.current(scope), 3);
}
