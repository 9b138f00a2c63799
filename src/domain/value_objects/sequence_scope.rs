//! Sequence scopes.
//!
//! A scope is the namespace a sequence number is unique within: chat numbers
//! are scoped by application, message numbers by chat.

use std::fmt;

/// Counter namespace for sequence allocation and write serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SequenceScope {
    /// Chat numbers of one application
    Application(i64),
    /// Message numbers of one chat
    Chat(i64),
}

impl SequenceScope {
    /// Key of this scope's counter in the counter store.
    pub fn counter_key(&self) -> String {
        format!("{}:next_number", self)
    }
}

impl fmt::Display for SequenceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceScope::Application(id) => write!(f, "application:{}", id),
            SequenceScope::Chat(id) => write!(f, "chat:{}", id),
        }
    }
}
