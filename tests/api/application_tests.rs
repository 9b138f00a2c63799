//! Application API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::TestApp;

#[tokio::test]
async fn test_create_application_issues_hex_token() {
    let app = TestApp::new();

    let (status, body) = app.post_json("/applications", json!({ "name": "shop" })).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "shop");
    assert_eq!(body["chats_count"], 0);
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_tokens_are_unique() {
    let app = TestApp::new();

    let first = app.create_application("a").await;
    let second = app.create_application("b").await;

    assert_ne!(first, second);
}

#[tokio::test]
async fn test_list_and_get_applications() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;
    app.create_application("blog").await;

    let (status, body) = app.get("/applications").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = app.get(&format!("/applications/{token}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "shop");
}

#[tokio::test]
async fn test_rename_application() {
    let app = TestApp::new();
    let token = app.create_application("shop").await;

    let (status, body) = app
        .put_json(&format!("/applications/{token}"), json!({ "name": "store" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "store");
    assert_eq!(body["token"], token);
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let app = TestApp::new();

    let (status, body) = app.get("/applications/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 10001);
}

#[tokio::test]
async fn test_empty_name_is_rejected() {
    let app = TestApp::new();

    let (status, body) = app.post_json("/applications", json!({ "name": "" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();

    let (status, _) = app.post_json("/applications", json!({ "title": "x" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
