//! # Chat System Library
//!
//! Multi-tenant chat and message ingestion with:
//! - A RESTful HTTP API for applications, chats and messages
//! - Per-application chat numbers and per-chat message numbers, allocated
//!   atomically in Redis before persistence
//! - Asynchronous persistence through a Redis task queue into PostgreSQL
//! - Full-text message search in Elasticsearch
//! - Periodic reconciliation of denormalized counters
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, tasks, and repository traits
//! - **Application Layer**: Services, the ingestion pipeline, and DTOs
//! - **Infrastructure Layer**: PostgreSQL, Redis, Elasticsearch and in-memory backends
//! - **Presentation Layer**: HTTP handlers and middleware
//!
//! ## Module Structure
//!
//! ```text
//! chat_system/
//! +-- config/         Configuration management
//! +-- domain/         Entities, value objects, tasks, and traits
//! +-- application/    Services, pipeline, and DTOs
//! +-- infrastructure/ Storage, queue, search, and metrics implementations
//! +-- presentation/   HTTP routes and middleware
//! +-- shared/         Common utilities (errors, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services and the ingestion pipeline
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
