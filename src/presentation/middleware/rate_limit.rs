//! Rate Limiting Middleware
//!
//! Per-client GCRA rate limiting backed by `governor`. Each client identifier
//! may burst up to `burst_size` requests, replenished at
//! `requests_per_second`; a request over the quota is rejected with 429 and
//! `Retry-After`.
//!
//! Limiter state lives in process memory, so limits apply per instance.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::StateInformationMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::Quota;
use serde::Serialize;

use crate::config::RateLimitSettings;
use crate::shared::error::ErrorResponse;
use crate::startup::AppState;

/// Slowest replenish rate accepted, one request per ~17 minutes.
const MIN_REQUESTS_PER_SECOND: f64 = 0.001;

// ============================================================================
// Rate Limit Response
// ============================================================================

/// Information about rate limit status returned to clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RateLimitInfo {
    /// Burst capacity
    pub limit: u32,
    /// Requests left in the current burst
    pub remaining: u32,
    /// Unix timestamp when the full burst is available again
    pub reset_at: i64,
    /// Seconds until the next request is allowed
    pub retry_after: u64,
}

/// Rate limit exceeded error response.
#[derive(Debug, Serialize)]
struct RateLimitExceededResponse {
    #[serde(flatten)]
    error: ErrorResponse,
    rate_limit: RateLimitInfo,
}

// ============================================================================
// Rate Limiter Implementation
// ============================================================================

type KeyedLimiter<C> =
    governor::RateLimiter<String, DefaultKeyedStateStore<String>, C, StateInformationMiddleware>;

/// Keyed rate limiter, one GCRA cell per client identifier.
pub struct RateLimiter<C: Clock = DefaultClock> {
    limiter: KeyedLimiter<C>,
    clock: C,
    quota: Quota,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        Self::with_clock(quota(requests_per_second, burst_size), DefaultClock::default())
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.requests_per_second, settings.burst_size)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(quota: Quota, clock: C) -> Self {
        let limiter = governor::RateLimiter::<
            String,
            DefaultKeyedStateStore<String>,
            C,
            governor::middleware::NoOpMiddleware<C::Instant>,
        >::new(quota, DefaultKeyedStateStore::default(), &clock)
            .with_middleware::<StateInformationMiddleware>();
        Self {
            limiter,
            clock,
            quota,
        }
    }

    /// Check if a request should be allowed.
    ///
    /// Returns `Ok(RateLimitInfo)` if allowed, `Err(RateLimitInfo)` if rate limited.
    pub fn check(&self, identifier: &str) -> Result<RateLimitInfo, RateLimitInfo> {
        match self.limiter.check_key(&identifier.to_string()) {
            Ok(snapshot) => Ok(self.info(snapshot.remaining_burst_capacity(), 0)),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                Err(self.info(0, wait.as_secs_f64().ceil().max(1.0) as u64))
            }
        }
    }

    fn info(&self, remaining: u32, retry_after: u64) -> RateLimitInfo {
        let limit = self.quota.burst_size().get();
        let until_full = self.quota.replenish_interval() * (limit - remaining.min(limit));
        RateLimitInfo {
            limit,
            remaining,
            reset_at: chrono::Utc::now().timestamp() + until_full.as_secs_f64().ceil() as i64,
            retry_after,
        }
    }

    /// Forget clients whose state is indistinguishable from a fresh one.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl<C: Clock> std::fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

fn quota(requests_per_second: f64, burst_size: u32) -> Quota {
    let burst = NonZeroU32::new(burst_size).unwrap_or(NonZeroU32::MIN);
    let period = Duration::from_secs_f64(1.0 / requests_per_second.max(MIN_REQUESTS_PER_SECOND));
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

// ============================================================================
// Identifier Extraction
// ============================================================================

/// Extract the rate limit identifier from a request.
///
/// Priority:
/// 1. X-Forwarded-For header (first hop, for reverse proxy setups)
/// 2. X-Real-IP header
/// 3. Client IP address of the connection
fn extract_identifier(request: &Request, client_ip: Option<IpAddr>) -> String {
    if let Some(forwarded_for) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first_ip) = forwarded_for.split(',').next() {
            let ip = first_ip.trim();
            if ip.parse::<IpAddr>().is_ok() {
                return format!("ip:{}", ip);
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        if real_ip.parse::<IpAddr>().is_ok() {
            return format!("ip:{}", real_ip);
        }
    }

    match client_ip {
        Some(ip) => format!("ip:{}", ip),
        None => {
            tracing::warn!("Could not determine client identifier for rate limiting");
            "ip:unknown".to_string()
        }
    }
}

// ============================================================================
// Middleware Functions
// ============================================================================

/// Rate limiting middleware for every API route.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());
    let identifier = extract_identifier(&request, client_ip);

    match state.rate_limiter.check(&identifier) {
        Ok(info) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &info);
            response
        }
        Err(info) => {
            tracing::warn!(identifier = %identifier, "Rate limit exceeded");
            create_rate_limit_response(info)
        }
    }
}

/// Add rate limit headers to a response.
fn add_rate_limit_headers(headers: &mut header::HeaderMap, info: &RateLimitInfo) {
    if let Ok(v) = header::HeaderValue::from_str(&info.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = header::HeaderValue::from_str(&info.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = header::HeaderValue::from_str(&info.reset_at.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
}

/// Create a 429 Too Many Requests response.
fn create_rate_limit_response(info: RateLimitInfo) -> Response {
    let info = RateLimitInfo {
        remaining: 0,
        ..info
    };
    let retry_after = info.retry_after;

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitExceededResponse {
            error: ErrorResponse {
                code: 10006,
                message: "You are being rate limited. Please slow down.".to_string(),
            },
            rate_limit: info.clone(),
        }),
    )
        .into_response();

    if let Ok(v) = header::HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, v);
    }
    add_rate_limit_headers(response.headers_mut(), &info);

    response
}

// ============================================================================
// Tests
// ============================================================================
