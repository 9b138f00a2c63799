//! Write serialization for applied creations.
//!
//! In `Global` mode every creation takes the same lock. In `PerScope` mode a
//! creation only waits for earlier creations of the same scope.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::WriteSerialization;
use crate::domain::SequenceScope;

/// Scope locks are pruned once the table grows past this many entries.
const PRUNE_THRESHOLD: usize = 1024;

pub struct WriteLocks {
    mode: WriteSerialization,
    global: Arc<Mutex<()>>,
    scopes: DashMap<SequenceScope, Arc<Mutex<()>>>,
}

impl WriteLocks {
    pub fn new(mode: WriteSerialization) -> Self {
        Self {
            mode,
            global: Arc::new(Mutex::new(())),
            scopes: DashMap::new(),
        }
    }

    pub fn mode(&self) -> WriteSerialization {
        self.mode
    }

    /// Wait for the lock covering `scope`.
    ///
    /// Waiters are served in request order (tokio mutexes are fair), so
    /// acquiring in dequeue order preserves FIFO order within a scope.
    pub async fn acquire(&self, scope: SequenceScope) -> OwnedMutexGuard<()> {
        let lock = match self.mode {
            WriteSerialization::Global => self.global.clone(),
            WriteSerialization::PerScope => {
                if self.scopes.len() > PRUNE_THRESHOLD {
                    self.prune();
                }
                self.scopes
                    .entry(scope)
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            }
        };
        lock.lock_owned().await
    }

    /// Drop scope locks nobody holds or waits for.
    fn prune(&self) {
        self.scopes.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    fn tracked_scopes(&self) -> usize {
        self.scopes.len()
    }
}
