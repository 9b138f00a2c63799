//! In-process task queue.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::application::pipeline::{DeadLetter, Delivery, TaskQueue};
use crate::domain::Task;
use crate::shared::error::AppError;

/// Consumer name of a queue built with [`MemoryTaskQueue::new`].
const DEFAULT_CONSUMER: &str = "default";

#[derive(Debug, Default)]
struct Lists {
    /// Oldest at the front
    pending: VecDeque<String>,
    /// Per consumer, in dequeue order
    processing: HashMap<String, Vec<String>>,
    /// Newest first
    dead: Vec<DeadLetter>,
}

#[derive(Debug, Default)]
struct Shared {
    lists: Mutex<Lists>,
    available: Notify,
}

/// Same delivery semantics as the Redis queue: a dequeued entry stays in the
/// consumer's processing list until acknowledged.
///
/// Handles returned by [`MemoryTaskQueue::consumer`] share the pending and
/// dead-letter lists but each keeps its own processing list.
#[derive(Debug, Clone)]
pub struct MemoryTaskQueue {
    shared: Arc<Shared>,
    consumer: String,
}

impl Default for MemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            consumer: DEFAULT_CONSUMER.to_string(),
        }
    }

    /// Another consumer of the same queue.
    pub fn consumer(&self, name: impl Into<String>) -> Self {
        Self {
            shared: self.shared.clone(),
            consumer: name.into(),
        }
    }

    /// Append an entry verbatim, bypassing task encoding.
    pub fn push_raw(&self, raw: impl Into<String>) {
        self.shared.lists.lock().pending.push_back(raw.into());
        self.shared.available.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.shared.lists.lock().pending.len()
    }

    /// Unacknowledged deliveries held by this consumer.
    pub fn processing(&self) -> usize {
        self.shared
            .lists
            .lock()
            .processing
            .get(&self.consumer)
            .map_or(0, Vec::len)
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.shared.lists.lock().dead.clone()
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, task: &Task) -> Result<(), AppError> {
        self.push_raw(task.encode()?);
        Ok(())
    }

    async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<Delivery>, AppError> {
        loop {
            {
                let mut lists = self.shared.lists.lock();
                if let Some(raw) = lists.pending.pop_front() {
                    lists
                        .processing
                        .entry(self.consumer.clone())
                        .or_default()
                        .push(raw.clone());
                    return Ok(Some(Delivery::new(raw)));
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = self.shared.available.notified() => {}
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), AppError> {
        let mut lists = self.shared.lists.lock();
        if let Some(own) = lists.processing.get_mut(&self.consumer) {
            if let Some(pos) = own.iter().position(|raw| *raw == delivery.raw) {
                own.remove(pos);
            }
        }
        Ok(())
    }

    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), AppError> {
        self.shared.lists.lock().dead.insert(0, letter.clone());
        Ok(())
    }

    async fn recover(&self) -> Result<usize, AppError> {
        let recovered = {
            let mut lists = self.shared.lists.lock();
            let unacked = lists.processing.remove(&self.consumer).unwrap_or_default();
            for raw in unacked.iter().rev() {
                lists.pending.push_front(raw.clone());
            }
            unacked.len()
        };
        if recovered > 0 {
            self.shared.available.notify_one();
        }
        Ok(recovered)
    }
}
