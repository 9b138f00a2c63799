//! Sequence allocation contract.

use async_trait::async_trait;

use crate::domain::SequenceScope;
use crate::shared::error::AppError;

/// Issues monotonically increasing numbers per scope.
///
/// Implementations must be atomic across every process sharing the backing
/// store; an in-process counter is only acceptable for single-process setups.
/// A number is retired once issued, even if the task carrying it never
/// reaches the primary store. Gaps are acceptable, reuse is not.
#[async_trait]
pub trait SequenceAllocator: Send + Sync {
    /// Allocate the next number in `scope`, starting at 1.
    async fn next(&self, scope: SequenceScope) -> Result<i64, AppError>;

    /// Raise the counter of `scope` to `floor` if it is currently lower.
    ///
    /// Never lowers a counter. Returns whether the counter was changed.
    async fn ensure_at_least(&self, scope: SequenceScope, floor: i64) -> Result<bool, AppError>;
}
