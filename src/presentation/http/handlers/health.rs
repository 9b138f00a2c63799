//! Health Check Handlers
//!
//! Provides health check endpoints for Kubernetes-style liveness and readiness checks.
//!
//! # Endpoints
//! - `GET /health` - Basic health check
//! - `GET /health/live` - Liveness check (is the server running?)
//! - `GET /health/ready` - Readiness check (can the server accept traffic?)

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::startup::AppState;

/// Server start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Initialize the server start time (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

type CheckFn = dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync;

/// A dependency checked by the readiness endpoint.
#[derive(Clone)]
pub struct HealthCheck {
    name: &'static str,
    /// Unhealthy critical dependencies make the service unready
    critical: bool,
    /// Slower answers than this report the dependency as degraded
    degraded_after: Duration,
    check: Arc<CheckFn>,
}

impl HealthCheck {
    pub fn new<F, Fut>(name: &'static str, critical: bool, degraded_after: Duration, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        Self {
            name,
            critical,
            degraded_after,
            check: Arc::new(move || check().boxed()),
        }
    }

    async fn run(&self) -> ServiceHealth {
        let start = Instant::now();
        match (self.check)().await {
            Ok(()) => {
                let latency = start.elapsed();
                ServiceHealth {
                    status: if latency < self.degraded_after {
                        HealthStatus::Healthy
                    } else {
                        HealthStatus::Degraded
                    },
                    critical: self.critical,
                    latency_ms: Some(latency.as_millis() as u64),
                    message: None,
                }
            }
            Err(e) => ServiceHealth {
                status: HealthStatus::Unhealthy,
                critical: self.critical,
                latency_ms: None,
                message: Some(format!("{} check failed: {}", self.name, e)),
            },
        }
    }
}

impl std::fmt::Debug for HealthCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCheck")
            .field("name", &self.name)
            .field("critical", &self.critical)
            .finish_non_exhaustive()
    }
}

/// Basic health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health check response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: BTreeMap<&'static str, ServiceHealth>,
}

/// Health status for individual services
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub critical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Simple liveness response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Basic health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness - checks if the server is running
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness - checks if the server can accept traffic
/// Returns 200 if ready, 503 if a critical dependency is unavailable
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let results = join_all(state.health_checks.iter().map(|check| async move {
        (check.name, check.run().await)
    }))
    .await;
    let checks: BTreeMap<&'static str, ServiceHealth> = results.into_iter().collect();

    let overall_status = determine_overall_status(checks.values());

    let response = DetailedHealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks,
    };

    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// Determine overall health based on individual checks
fn determine_overall_status<'a>(checks: impl Iterator<Item = &'a ServiceHealth>) -> HealthStatus {
    let mut overall = HealthStatus::Healthy;
    for check in checks {
        match check.status {
            HealthStatus::Unhealthy if check.critical => return HealthStatus::Unhealthy,
            HealthStatus::Healthy => {}
            _ => overall = HealthStatus::Degraded,
        }
    }
    overall
}
