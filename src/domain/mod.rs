//! # Domain Layer
//!
//! Core types of the ingestion pipeline, independent of any storage engine.
//!
//! ## Structure
//!
//! - **entities**: Application, Chat, Message and their repository traits
//! - **value_objects**: Sequence scopes
//! - **tasks**: Deferred work carried through the task queue
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Sequence numbers are assigned before persistence and never reused

pub mod entities;
pub mod tasks;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use tasks::{ChatCreation, MessageCreation, Task, TaskDecodeError, TaskEnvelope, TaskKind};
pub use value_objects::*;
