//! Task dispatcher.
//!
//! A single dequeue loop routes every task to the [`Persister`] and, for
//! messages, to the [`SearchIndexer`]. Lifecycle of one delivery:
//!
//! ```text
//! dequeue -> decode -> acquire write lock -> persist (retry) -> index (retry) -> ack
//!              |                                 |                  |
//!              +---------- dead letter ----------+------------------+
//! ```
//!
//! The write lock is taken inside the loop, in dequeue order, before the
//! apply step is handed to a worker task. With `max_in_flight = 1` the loop
//! applies one task at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::indexer::SearchIndexer;
use super::locks::WriteLocks;
use super::persister::{ApplyError, Persister};
use super::queue::{DeadLetter, Delivery, FailureStage, TaskQueue};
use super::retry::RetryPolicy;
use crate::config::{WorkerSettings, WriteSerialization};
use crate::domain::{ChatCreation, MessageCreation, Task, TaskDecodeError};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Pause after a failed dequeue round trip before polling again.
const DEQUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Terminal state of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Persisted (and indexed, for messages)
    Applied,
    /// The row already existed; messages are re-indexed
    Duplicate,
    /// Parked in the dead-letter list
    DeadLettered,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::Duplicate => "duplicate",
            Outcome::DeadLettered => "dead_lettered",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub write_serialization: WriteSerialization,
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
}

impl DispatcherConfig {
    pub fn from_settings(settings: &WorkerSettings) -> Self {
        Self {
            write_serialization: settings.write_serialization,
            max_in_flight: settings.max_in_flight.max(1),
            retry: RetryPolicy::from_settings(&settings.retry),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            write_serialization: WriteSerialization::Global,
            max_in_flight: 1,
            retry: RetryPolicy::none(),
        }
    }
}

pub struct Dispatcher {
    queue: Arc<dyn TaskQueue>,
    persister: Persister,
    indexer: Arc<dyn SearchIndexer>,
    locks: WriteLocks,
    retry: RetryPolicy,
    max_in_flight: usize,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        persister: Persister,
        indexer: Arc<dyn SearchIndexer>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            queue,
            persister,
            indexer,
            locks: WriteLocks::new(config.write_serialization),
            retry: config.retry,
            max_in_flight: config.max_in_flight.max(1),
        }
    }

    /// Consume the queue until `cancel` fires.
    ///
    /// Unacknowledged deliveries left by a previous run are put back first.
    /// On cancellation no new task is started; tasks already being applied
    /// run to completion before this returns.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        match self.queue.recover().await {
            Ok(0) => {}
            Ok(n) => warn!(recovered = n, "Requeued unacknowledged tasks from a previous run"),
            Err(e) => error!(error = %e, "Failed to recover unacknowledged tasks"),
        }

        info!(
            mode = ?self.locks.mode(),
            max_in_flight = self.max_in_flight,
            "Dispatcher started"
        );

        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut in_flight = JoinSet::new();

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "Task worker panicked");
                }
            }

            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let delivery = match self.queue.dequeue(&cancel).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Error popping from queue");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(DEQUEUE_ERROR_BACKOFF) => continue,
                    }
                }
            };

            let task = match Task::decode(&delivery.raw) {
                Ok(task) => task,
                Err(e) => {
                    self.reject_undecodable(&delivery, e).await;
                    continue;
                }
            };

            let guard = self.locks.acquire(task.scope()).await;
            let this = self.clone();
            in_flight.spawn(async move {
                this.execute(&delivery, task).await;
                drop(guard);
                drop(permit);
            });
        }

        debug!(in_flight = in_flight.len(), "Dispatcher draining");
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Task worker panicked");
            }
        }
        info!("Dispatcher stopped");
    }

    /// Take one delivery to its terminal state and acknowledge it.
    pub async fn process(&self, delivery: Delivery) -> Outcome {
        let task = match Task::decode(&delivery.raw) {
            Ok(task) => task,
            Err(e) => return self.reject_undecodable(&delivery, e).await,
        };
        let _guard = self.locks.acquire(task.scope()).await;
        self.execute(&delivery, task).await
    }

    async fn execute(&self, delivery: &Delivery, task: Task) -> Outcome {
        let started = Instant::now();
        let kind = task.kind();

        let outcome = match task {
            Task::ChatCreation(creation) => self.apply_chat(delivery, creation).await,
            Task::MessageCreation(creation) => self.apply_message(delivery, creation).await,
        };

        self.acknowledge(delivery).await;
        metrics::record_processed(kind.as_str(), outcome.as_str(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn apply_chat(&self, delivery: &Delivery, creation: ChatCreation) -> Outcome {
        let attempted = self
            .retry
            .run(
                || {
                    self.persister
                        .apply_chat_creation(creation.application_id, creation.chat_number)
                },
                ApplyError::is_transient,
            )
            .await;

        match attempted.result {
            Ok(chat) => {
                debug!(
                    application_id = chat.application_id,
                    chat_number = chat.chat_number,
                    "Chat created"
                );
                Outcome::Applied
            }
            Err(ApplyError::Duplicate(reason)) => {
                error!(
                    application_id = creation.application_id,
                    chat_number = creation.chat_number,
                    %reason,
                    "Chat number already persisted, treating creation as replayed"
                );
                Outcome::Duplicate
            }
            Err(e) => {
                self.give_up(delivery, FailureStage::Persist, e.to_string(), attempted.attempts)
                    .await
            }
        }
    }

    async fn apply_message(&self, delivery: &Delivery, creation: MessageCreation) -> Outcome {
        let body = creation.body.as_str();
        let attempted = self
            .retry
            .run(
                || {
                    self.persister.apply_message_creation(
                        creation.chat_id,
                        creation.message_number,
                        body,
                    )
                },
                ApplyError::is_transient,
            )
            .await;

        let (message, outcome) = match attempted.result {
            Ok(message) => (message, Outcome::Applied),
            Err(ApplyError::Duplicate(reason)) => {
                warn!(
                    chat_id = creation.chat_id,
                    message_number = creation.message_number,
                    %reason,
                    "Message creation replayed, row already exists"
                );
                match self
                    .persister
                    .existing_message(creation.chat_id, creation.message_number)
                    .await
                {
                    Ok(Some(existing)) if existing.body == creation.body => {
                        (existing, Outcome::Duplicate)
                    }
                    Ok(Some(_)) => {
                        // Same number, different message: the counter was reset
                        return self
                            .give_up(
                                delivery,
                                FailureStage::Persist,
                                format!(
                                    "number collision: message {} of chat {} already holds a different body",
                                    creation.message_number, creation.chat_id
                                ),
                                attempted.attempts,
                            )
                            .await;
                    }
                    Ok(None) => return Outcome::Duplicate,
                    Err(e) => {
                        warn!(error = %e, "Could not reload replayed message for re-indexing");
                        return Outcome::Duplicate;
                    }
                }
            }
            Err(e) => {
                return self
                    .give_up(delivery, FailureStage::Persist, e.to_string(), attempted.attempts)
                    .await
            }
        };

        let indexed = self
            .retry
            .run(|| self.indexer.index(&message), AppError::is_transient)
            .await;

        match indexed.result {
            Ok(()) => {
                debug!(document_id = %message.document_id(), "Message indexed");
                outcome
            }
            Err(e) => {
                self.give_up(delivery, FailureStage::Index, e.to_string(), indexed.attempts)
                    .await
            }
        }
    }

    async fn reject_undecodable(&self, delivery: &Delivery, error: TaskDecodeError) -> Outcome {
        let outcome = self
            .give_up(delivery, FailureStage::Decode, error.to_string(), 1)
            .await;
        self.acknowledge(delivery).await;
        metrics::record_processed("undecodable", outcome.as_str(), 0.0);
        outcome
    }

    async fn give_up(
        &self,
        delivery: &Delivery,
        stage: FailureStage,
        reason: String,
        attempts: u32,
    ) -> Outcome {
        error!(
            stage = stage.as_str(),
            attempts,
            reason = %reason,
            "Giving up on task, moving it to the dead-letter list"
        );

        let letter = DeadLetter::new(delivery, stage, reason, attempts);
        if let Err(e) = self.queue.dead_letter(&letter).await {
            error!(error = %e, raw = %delivery.raw, "Failed to dead-letter task, task is lost");
        }
        metrics::record_dead_letter(stage.as_str());
        Outcome::DeadLettered
    }

    async fn acknowledge(&self, delivery: &Delivery) {
        if let Err(e) = self.queue.ack(delivery).await {
            warn!(error = %e, "Failed to acknowledge task, it may be delivered again");
        }
    }
}
