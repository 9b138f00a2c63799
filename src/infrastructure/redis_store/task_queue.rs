//! Task queue on Redis lists.
//!
//! Producers `LPUSH` onto the pending list. A consumer moves the oldest
//! entry (rightmost) into its own processing list with `BLMOVE` and removes
//! it from there with `LREM` once the task reached a terminal state. On
//! restart a consumer only recovers its own processing list, so instances
//! sharing the queue never take over each other's in-flight deliveries.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{AsyncCommands, Client, RedisResult};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::application::pipeline::{DeadLetter, Delivery, TaskQueue};
use crate::domain::Task;
use crate::shared::error::AppError;

/// Names of the three lists backing one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    pub pending: String,
    pub processing: String,
    pub dead: String,
}

impl QueueKeys {
    pub fn new(queue_name: &str, consumer_id: &str) -> Self {
        Self {
            pending: queue_name.to_string(),
            processing: format!("{}:processing:{}", queue_name, consumer_id),
            dead: format!("{}:dead", queue_name),
        }
    }
}

pub struct RedisTaskQueue {
    client: Client,
    conn: ConnectionManager,
    /// Dedicated to blocking reads so they never stall producers
    consumer: Mutex<Option<MultiplexedConnection>>,
    keys: QueueKeys,
    block: Duration,
}

impl RedisTaskQueue {
    /// `block` bounds a single server-side wait; [`TaskQueue::dequeue`]
    /// keeps waiting across rounds until an entry arrives or it is cancelled.
    pub fn new(
        client: Client,
        conn: ConnectionManager,
        queue_name: &str,
        consumer_id: &str,
        block: Duration,
    ) -> Self {
        Self {
            client,
            conn,
            consumer: Mutex::new(None),
            keys: QueueKeys::new(queue_name, consumer_id),
            block,
        }
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    #[instrument(skip(self, task), fields(kind = %task.kind()))]
    async fn enqueue(&self, task: &Task) -> Result<(), AppError> {
        let raw = task.encode()?;
        let mut conn = self.conn.clone();
        let depth: i64 = conn.lpush(&self.keys.pending, raw).await?;
        debug!(depth, "Task enqueued");
        Ok(())
    }

    async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<Delivery>, AppError> {
        let mut consumer = self.consumer.lock().await;

        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if consumer.is_none() {
                *consumer = Some(self.client.get_multiplexed_async_connection().await?);
            }
            let Some(conn) = consumer.as_mut() else {
                continue;
            };

            let mut blmove = redis::cmd("BLMOVE");
            blmove
                .arg(&self.keys.pending)
                .arg(&self.keys.processing)
                .arg("RIGHT")
                .arg("LEFT")
                .arg(self.block.as_secs_f64());

            let result: RedisResult<Option<String>> = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                result = blmove.query_async(conn) => result,
            };

            match result {
                Ok(Some(raw)) => return Ok(Some(Delivery::new(raw))),
                Ok(None) => continue,
                Err(e) if e.is_timeout() => {
                    debug!("Blocking read timed out client-side, reconnecting");
                    *consumer = None;
                }
                Err(e) => {
                    *consumer = None;
                    return Err(e.into());
                }
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.lrem(&self.keys.processing, -1, &delivery.raw).await?;
        if removed == 0 {
            warn!("Acknowledged task was not in the processing list");
        }
        Ok(())
    }

    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), AppError> {
        let record = serde_json::to_string(letter)?;
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(&self.keys.dead, record).await?;
        Ok(())
    }

    async fn recover(&self) -> Result<usize, AppError> {
        let mut conn = self.conn.clone();
        let mut moved = 0usize;
        // Newest first onto the consuming end leaves the oldest rightmost.
        loop {
            let entry: Option<String> = redis::cmd("LMOVE")
                .arg(&self.keys.processing)
                .arg(&self.keys.pending)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            match entry {
                Some(_) => moved += 1,
                None => break,
            }
        }
        Ok(moved)
    }
}

impl std::fmt::Debug for RedisTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTaskQueue")
            .field("keys", &self.keys)
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}
