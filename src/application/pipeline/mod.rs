//! Asynchronous ingestion pipeline.
//!
//! ```text
//! handler -> SequenceAllocator::next -> TaskQueue::enqueue -> 202 to caller
//!                                              |
//!                         Dispatcher (dequeue loop) -> Persister -> SearchIndexer
//!
//! Reconciler (timer loop) -> CounterRepository [-> SequenceAllocator::ensure_at_least]
//! ```
//!
//! The ports ([`SequenceAllocator`], [`TaskQueue`], [`SearchIndexer`]) are
//! implemented in `infrastructure`, once against Redis/Elasticsearch and
//! once in memory.

mod dispatcher;
mod indexer;
mod locks;
mod persister;
mod queue;
mod reconciler;
mod retry;
mod sequence;
mod worker;

pub use dispatcher::{Dispatcher, DispatcherConfig, Outcome};
pub use indexer::{MessageDocument, SearchIndexer};
pub use locks::WriteLocks;
pub use persister::{ApplyError, Persister};
pub use queue::{DeadLetter, Delivery, FailureStage, TaskQueue};
pub use reconciler::{ReconcileReport, Reconciler};
pub use retry::{Attempted, RetryPolicy};
pub use sequence::SequenceAllocator;
pub use worker::Worker;
