//! Value Objects
//!
//! Immutable value types with no identity of their own.

mod sequence_scope;

pub use sequence_scope::SequenceScope;
