//! Deferred creation tasks.
//!
//! A task is produced once per accepted write and carried through the task
//! queue as a JSON envelope:
//!
//! ```json
//! {"type": "message_creation", "payload": {"chat_id": 3, "message_number": 8, "body": "hi"}}
//! ```
//!
//! The set of kinds is closed. Decoding an envelope with any other `type`
//! yields [`TaskDecodeError::UnknownKind`].

use serde::{Deserialize, Serialize};

use super::value_objects::SequenceScope;

/// Discriminant of a [`Task`], as written in the envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    ChatCreation,
    MessageCreation,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatCreation => "chat_creation",
            Self::MessageCreation => "message_creation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chat_creation" => Some(Self::ChatCreation),
            "message_creation" => Some(Self::MessageCreation),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create chat `chat_number` in application `application_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCreation {
    #[serde(rename = "app_id")]
    pub application_id: i64,
    pub chat_number: i64,
}

/// Create message `message_number` in chat `chat_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCreation {
    pub chat_id: i64,
    pub message_number: i64,
    pub body: String,
}

/// A unit of deferred work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    ChatCreation(ChatCreation),
    MessageCreation(MessageCreation),
}

/// Wire representation of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Reasons an envelope cannot be turned back into a [`Task`].
///
/// None of these become valid on retry.
#[derive(Debug, thiserror::Error)]
pub enum TaskDecodeError {
    #[error("malformed task envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("unknown task kind: {0}")]
    UnknownKind(String),

    #[error("malformed {kind} payload: {source}")]
    Payload {
        kind: TaskKind,
        #[source]
        source: serde_json::Error,
    },
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::ChatCreation(_) => TaskKind::ChatCreation,
            Task::MessageCreation(_) => TaskKind::MessageCreation,
        }
    }

    /// Scope the task's sequence number belongs to.
    pub fn scope(&self) -> SequenceScope {
        match self {
            Task::ChatCreation(c) => SequenceScope::Application(c.application_id),
            Task::MessageCreation(m) => SequenceScope::Chat(m.chat_id),
        }
    }

    pub fn to_envelope(&self) -> Result<TaskEnvelope, serde_json::Error> {
        let payload = match self {
            Task::ChatCreation(c) => serde_json::to_value(c)?,
            Task::MessageCreation(m) => serde_json::to_value(m)?,
        };
        Ok(TaskEnvelope {
            kind: self.kind().as_str().to_string(),
            payload,
        })
    }

    /// Serialize to the JSON string pushed onto the queue.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_envelope()?)
    }

    pub fn from_envelope(envelope: TaskEnvelope) -> Result<Self, TaskDecodeError> {
        let kind = TaskKind::parse(&envelope.kind)
            .ok_or_else(|| TaskDecodeError::UnknownKind(envelope.kind.clone()))?;

        let payload_error = |source| TaskDecodeError::Payload { kind, source };
        match kind {
            TaskKind::ChatCreation => serde_json::from_value(envelope.payload)
                .map(Task::ChatCreation)
                .map_err(payload_error),
            TaskKind::MessageCreation => serde_json::from_value(envelope.payload)
                .map(Task::MessageCreation)
                .map_err(payload_error),
        }
    }

    /// Parse a raw queue entry.
    pub fn decode(raw: &str) -> Result<Self, TaskDecodeError> {
        let envelope: TaskEnvelope = serde_json::from_str(raw).map_err(TaskDecodeError::Envelope)?;
        Self::from_envelope(envelope)
    }
}
