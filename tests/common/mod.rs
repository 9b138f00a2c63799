//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure. Every test app runs
//! over the in-process backends, so no external services are needed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use chat_system::application::pipeline::{
    Dispatcher, DispatcherConfig, Outcome, Persister, Reconciler, RetryPolicy, SearchIndexer,
    TaskQueue,
};
use chat_system::config::{CorsSettings, RateLimitSettings, WriteSerialization};
use chat_system::infrastructure::memory::{
    MemorySearchIndex, MemorySequenceAllocator, MemoryStore, MemoryTaskQueue,
};
use chat_system::startup::{build_router, AppState, Backends};

/// Generous enough that no test trips it by accident
pub fn relaxed_rate_limit() -> RateLimitSettings {
    RateLimitSettings {
        requests_per_second: 1_000.0,
        burst_size: 10_000,
    }
}

/// Retries fast enough for tests
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
}

/// Test application builder
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryTaskQueue>,
    pub search: Arc<MemorySearchIndex>,
    pub sequences: Arc<MemorySequenceAllocator>,
    pub backends: Backends,
    pub dispatcher: Arc<Dispatcher>,
    pub reconciler: Arc<Reconciler>,
}

impl TestApp {
    /// Create a new test application over in-memory backends
    pub fn new() -> Self {
        Self::with_rate_limit(relaxed_rate_limit())
    }

    pub fn with_rate_limit(rate_limit: RateLimitSettings) -> Self {
        Self::build(rate_limit, None)
    }

    /// Same, with a custom search indexer in front of the dispatcher
    pub fn with_indexer(indexer: Arc<dyn SearchIndexer>, config: DispatcherConfig) -> Self {
        Self::build(relaxed_rate_limit(), Some((indexer, config)))
    }

    fn build(
        rate_limit: RateLimitSettings,
        dispatch: Option<(Arc<dyn SearchIndexer>, DispatcherConfig)>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryTaskQueue::new());
        let search = Arc::new(MemorySearchIndex::new());
        let sequences = Arc::new(MemorySequenceAllocator::new());

        let backends = Backends {
            applications: store.clone(),
            chats: store.clone(),
            messages: store.clone(),
            counters: store.clone(),
            sequences: sequences.clone(),
            queue: queue.clone(),
            search: search.clone(),
            health_checks: Vec::new(),
        };

        let (indexer, config) = dispatch.unwrap_or_else(|| {
            (
                search.clone() as Arc<dyn SearchIndexer>,
                DispatcherConfig {
                    write_serialization: WriteSerialization::Global,
                    max_in_flight: 1,
                    retry: fast_retry(3),
                },
            )
        });

        let dispatcher = Arc::new(Dispatcher::new(
            queue.clone(),
            Persister::new(store.clone(), store.clone()),
            indexer,
            config,
        ));
        let reconciler = Arc::new(
            Reconciler::new(store.clone(), Duration::from_secs(900))
                .with_sequence_sync(sequences.clone()),
        );

        let state = AppState::new(&backends, &rate_limit);
        let router = build_router(state, &CorsSettings {
            allowed_origins: Vec::new(),
        });

        Self {
            router,
            store,
            queue,
            search,
            sequences,
            backends,
            dispatcher,
            reconciler,
        }
    }

    /// Process every queued task, in order, and return the outcomes.
    pub async fn drain(&self) -> Vec<Outcome> {
        let stop = CancellationToken::new();
        stop.cancel();

        let mut outcomes = Vec::new();
        while let Some(delivery) = self.queue.dequeue(&stop).await.unwrap() {
            outcomes.push(self.dispatcher.process(delivery).await);
        }
        outcomes
    }

    /// Send a request and return the raw response
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Make a request and decode the JSON response body (Null if empty)
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self.send(builder.body(body).unwrap()).await;

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, Some(body)).await
    }

    /// Create an application through the API and return its token
    pub async fn create_application(&self, name: &str) -> String {
        let (status, body) = self
            .post_json("/applications", serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Create a chat through the API and persist it
    pub async fn create_chat(&self, token: &str) -> i64 {
        let (status, body) = self
            .post_json(&format!("/applications/{token}/chats"), Value::Null)
            .await;
        assert_eq!(status, StatusCode::ACCEPTED, "{body}");
        self.drain().await;
        body["chat_number"].as_i64().unwrap()
    }

    /// Queue a message through the API (not yet persisted)
    pub async fn post_message(&self, token: &str, chat_number: i64, text: &str) -> i64 {
        let (status, body) = self
            .post_json(
                &format!("/applications/{token}/chats/{chat_number}/messages"),
                serde_json::json!({ "body": text }),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED, "{body}");
        body["message_number"].as_i64().unwrap()
    }
}
