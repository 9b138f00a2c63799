//! In-process sequence counters.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::application::pipeline::SequenceAllocator;
use crate::domain::SequenceScope;
use crate::shared::error::AppError;

/// One counter per scope. The shard lock held by `entry` makes each
/// increment atomic.
#[derive(Debug, Default)]
pub struct MemorySequenceAllocator {
    counters: DashMap<SequenceScope, i64>,
}

impl MemorySequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last number issued in `scope`, 0 if none.
    pub fn current(&self, scope: SequenceScope) -> i64 {
        self.counters.get(&scope).map(|n| *n).unwrap_or(0)
    }

    /// Drop every counter, as a flushed counter store would.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

#[async_trait]
impl SequenceAllocator for MemorySequenceAllocator {
    async fn next(&self, scope: SequenceScope) -> Result<i64, AppError> {
        let mut counter = self.counters.entry(scope).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn ensure_at_least(&self, scope: SequenceScope, floor: i64) -> Result<bool, AppError> {
        let mut counter = self.counters.entry(scope).or_insert(0);
        if *counter < floor {
            *counter = floor;
            return Ok(true);
        }
        Ok(false)
    }
}
