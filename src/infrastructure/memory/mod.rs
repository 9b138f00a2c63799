//! In-process backends.
//!
//! Implementations of every pipeline port and repository that keep their
//! state in memory. They honor the same contracts as the Postgres, Redis and
//! Elasticsearch implementations (unique numbers per scope, FIFO delivery
//! with acknowledgment, fuzzy matching) but are only shared within one
//! process. Used by tests and for running the service without external
//! stores.

mod queue;
mod search;
mod sequence;
mod store;

pub use queue::MemoryTaskQueue;
pub use search::MemorySearchIndex;
pub use sequence::MemorySequenceAllocator;
pub use store::MemoryStore;
