//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Sequence counters and task queue (Redis)
//! - Search store client (Elasticsearch REST)
//! - In-process backends for every port
//! - Prometheus metrics

pub mod database;
pub mod memory;
pub mod metrics;
pub mod redis_store;
pub mod repositories;
pub mod search;
