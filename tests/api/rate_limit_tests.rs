//! Rate Limiting API Tests

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};

use chat_system::config::RateLimitSettings;

use crate::common::TestApp;

fn list_from(ip: &str) -> Request<Body> {
    Request::builder()
        .uri("/applications")
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_burst_exhaustion_returns_429_with_retry_after() {
    let app = TestApp::with_rate_limit(RateLimitSettings {
        requests_per_second: 0.5,
        burst_size: 2,
    });

    assert_eq!(app.send(list_from("10.0.0.1")).await.status(), StatusCode::OK);
    assert_eq!(app.send(list_from("10.0.0.1")).await.status(), StatusCode::OK);

    let limited = app.send(list_from("10.0.0.1")).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.headers()[header::RETRY_AFTER], "2");
    assert_eq!(limited.headers()["x-ratelimit-remaining"], "0");
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let app = TestApp::with_rate_limit(RateLimitSettings {
        requests_per_second: 0.1,
        burst_size: 1,
    });

    assert_eq!(app.send(list_from("10.0.0.1")).await.status(), StatusCode::OK);
    assert_eq!(app.send(list_from("10.0.0.2")).await.status(), StatusCode::OK);
    assert_eq!(
        app.send(list_from("10.0.0.1")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_allowed_responses_carry_limit_headers() {
    let app = TestApp::with_rate_limit(RateLimitSettings {
        requests_per_second: 100.0,
        burst_size: 200,
    });

    let response = app.send(list_from("10.0.0.1")).await;
    assert_eq!(response.headers()["x-ratelimit-limit"], "200");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "199");
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let app = TestApp::with_rate_limit(RateLimitSettings {
        requests_per_second: 0.1,
        burst_size: 1,
    });

    for _ in 0..5 {
        let (status, _) = app.get("/health").await;
        assert_eq!(status, StatusCode::OK);
    }
}
