//! Redis Module
//!
//! Redis backs two ports of the ingestion pipeline:
//!
//! - [`RedisSequenceAllocator`]: one `INCR` counter per sequence scope
//! - [`RedisTaskQueue`]: the task list plus its processing and dead-letter lists
//!
//! # Key Layout
//!
//! ```text
//! application:{id}:next_number   chat number counter
//! chat:{id}:next_number          message number counter
//! {queue}                        pending tasks (LPUSH in, BLMOVE out from the right)
//! {queue}:processing:{consumer}  handed out to one consumer, not yet acknowledged
//! {queue}:dead                   dead letters, newest first
//! ```

mod sequence;
mod task_queue;

pub use sequence::RedisSequenceAllocator;
pub use task_queue::{QueueKeys, RedisTaskQueue};

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<(Client, ConnectionManager), redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client.clone()).await?;
    info!("Redis connection established");
    Ok((client, manager))
}

/// Round-trip check used by readiness checks.
pub async fn ping(conn: &ConnectionManager) -> Result<(), redis::RedisError> {
    let mut conn = conn.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;
    Ok(())
}
