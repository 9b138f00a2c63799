//! Sequence counters on Redis.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, instrument};

use crate::application::pipeline::SequenceAllocator;
use crate::domain::SequenceScope;
use crate::shared::error::AppError;

/// Raise KEYS[1] to ARGV[1] if lower. Returns 1 when the counter changed.
static ENSURE_AT_LEAST: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
        local current = tonumber(redis.call('GET', KEYS[1]) or '0')
        local floor = tonumber(ARGV[1])
        if current < floor then
            redis.call('SET', KEYS[1], floor)
            return 1
        end
        return 0
        "#,
    )
});

/// Allocates numbers with `INCR`, atomic across every process sharing the
/// Redis instance.
#[derive(Clone)]
pub struct RedisSequenceAllocator {
    conn: ConnectionManager,
}

impl RedisSequenceAllocator {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SequenceAllocator for RedisSequenceAllocator {
    #[instrument(skip(self), level = "debug")]
    async fn next(&self, scope: SequenceScope) -> Result<i64, AppError> {
        let mut conn = self.conn.clone();
        let key = scope.counter_key();
        let value: i64 = conn.incr(&key, 1).await?;
        debug!(key = %key, value, "Sequence number allocated");
        Ok(value)
    }

    #[instrument(skip(self), level = "debug")]
    async fn ensure_at_least(&self, scope: SequenceScope, floor: i64) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let raised: i64 = ENSURE_AT_LEAST
            .key(scope.counter_key())
            .arg(floor)
            .invoke_async(&mut conn)
            .await?;
        Ok(raised == 1)
    }
}

impl std::fmt::Debug for RedisSequenceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSequenceAllocator").finish_non_exhaustive()
    }
}
