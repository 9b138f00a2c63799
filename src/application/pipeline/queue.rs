//! Task queue contract.
//!
//! Delivery is at-least-once: [`TaskQueue::dequeue`] moves an entry into
//! the processing list of the calling consumer, and the consumer calls
//! [`TaskQueue::ack`] once the task reached a terminal state. Entries that
//! were handed out but never acknowledged (consumer crash, cancellation
//! mid-flight) are put back by [`TaskQueue::recover`] when the same consumer
//! starts again. Every queue handle belongs to exactly one consumer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::Task;
use crate::shared::error::AppError;

/// One entry handed out by the queue, still awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Envelope exactly as stored; also the handle used for acknowledgment
    pub raw: String,
}

impl Delivery {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// Where in the pipeline a task was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Decode,
    Persist,
    Index,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Decode => "decode",
            FailureStage::Persist => "persist",
            FailureStage::Index => "index",
        }
    }
}

/// A task that will not be processed again without operator action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub raw: String,
    pub stage: FailureStage,
    pub reason: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(delivery: &Delivery, stage: FailureStage, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            raw: delivery.raw.clone(),
            stage,
            reason: reason.into(),
            attempts,
            failed_at: Utc::now(),
        }
    }
}

/// Durable FIFO channel between request handlers and the dispatcher.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Append a task at the producing end.
    async fn enqueue(&self, task: &Task) -> Result<(), AppError>;

    /// Wait for the oldest entry.
    ///
    /// Blocks until an entry is available or `cancel` fires, in which case
    /// `Ok(None)` is returned promptly.
    async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<Delivery>, AppError>;

    /// Mark a delivery as finished so it is never redelivered.
    async fn ack(&self, delivery: &Delivery) -> Result<(), AppError>;

    /// Park a task that exhausted its retries or can never succeed.
    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), AppError>;

    /// Return this consumer's unacknowledged deliveries to the consuming
    /// end, oldest first.
    ///
    /// Deliveries held by other consumers are left untouched. Must only be
    /// called while this consumer is not running.
    async fn recover(&self) -> Result<usize, AppError>;
}
