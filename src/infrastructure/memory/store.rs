//! In-process primary store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::domain::{
    Application, ApplicationRepository, Chat, ChatRepository, CounterRepository, Message,
    MessageRepository, SequenceFloor, SequenceScope,
};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
struct Tables {
    applications: BTreeMap<i64, Application>,
    chats: BTreeMap<i64, Chat>,
    messages: BTreeMap<i64, Message>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Applications, chats and messages with the constraints of the SQL schema:
/// unique tokens, unique numbers per parent, and parent rows must exist.
///
/// Inserts never touch `chats_count` / `messages_count`; only the
/// [`CounterRepository`] methods do, as in Postgres.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a chat and its messages.
    pub fn delete_chat(&self, chat_id: i64) {
        let mut tables = self.tables.write();
        tables.chats.remove(&chat_id);
        tables.messages.retain(|_, m| m.chat_id != chat_id);
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn create(&self, name: &str, token: &str) -> Result<Application, AppError> {
        let mut tables = self.tables.write();
        if tables.applications.values().any(|a| a.token == token) {
            return Err(AppError::Conflict("Application token already in use".into()));
        }

        let now = Utc::now();
        let application = Application {
            id: tables.next_id(),
            name: name.to_string(),
            token: token.to_string(),
            chats_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.applications.insert(application.id, application.clone());
        Ok(application)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Application>, AppError> {
        Ok(self
            .tables
            .read()
            .applications
            .values()
            .find(|a| a.token == token)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Application>, AppError> {
        Ok(self.tables.read().applications.values().cloned().collect())
    }

    async fn update_name(&self, token: &str, name: &str) -> Result<Option<Application>, AppError> {
        let mut tables = self.tables.write();
        Ok(tables
            .applications
            .values_mut()
            .find(|a| a.token == token)
            .map(|a| {
                a.name = name.to_string();
                a.updated_at = Utc::now();
                a.clone()
            }))
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn insert(&self, application_id: i64, chat_number: i64) -> Result<Chat, AppError> {
        let mut tables = self.tables.write();
        if !tables.applications.contains_key(&application_id) {
            return Err(AppError::NotFound(format!(
                "Application {} not found",
                application_id
            )));
        }
        if tables
            .chats
            .values()
            .any(|c| c.application_id == application_id && c.chat_number == chat_number)
        {
            return Err(AppError::Conflict(format!(
                "Chat {} already exists in application {}",
                chat_number, application_id
            )));
        }

        let chat = Chat {
            id: tables.next_id(),
            application_id,
            chat_number,
            messages_count: 0,
            created_at: Utc::now(),
        };
        tables.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn find_by_number(
        &self,
        application_id: i64,
        chat_number: i64,
    ) -> Result<Option<Chat>, AppError> {
        Ok(self
            .tables
            .read()
            .chats
            .values()
            .find(|c| c.application_id == application_id && c.chat_number == chat_number)
            .cloned())
    }

    async fn list_by_application(&self, application_id: i64) -> Result<Vec<Chat>, AppError> {
        let mut chats: Vec<Chat> = self
            .tables
            .read()
            .chats
            .values()
            .filter(|c| c.application_id == application_id)
            .cloned()
            .collect();
        chats.sort_by_key(|c| c.chat_number);
        Ok(chats)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn insert(
        &self,
        chat_id: i64,
        message_number: i64,
        body: &str,
    ) -> Result<Message, AppError> {
        let mut tables = self.tables.write();
        if !tables.chats.contains_key(&chat_id) {
            return Err(AppError::NotFound(format!("Chat {} not found", chat_id)));
        }
        if tables
            .messages
            .values()
            .any(|m| m.chat_id == chat_id && m.message_number == message_number)
        {
            return Err(AppError::Conflict(format!(
                "Message {} already exists in chat {}",
                message_number, chat_id
            )));
        }

        let message = Message {
            id: tables.next_id(),
            chat_id,
            message_number,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        tables.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_by_number(
        &self,
        chat_id: i64,
        message_number: i64,
    ) -> Result<Option<Message>, AppError> {
        Ok(self
            .tables
            .read()
            .messages
            .values()
            .find(|m| m.chat_id == chat_id && m.message_number == message_number)
            .cloned())
    }

    async fn list_by_chat(
        &self,
        chat_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let after = after.unwrap_or(0);
        let mut messages: Vec<Message> = self
            .tables
            .read()
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id && m.message_number > after)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.message_number);
        messages.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(messages)
    }
}

#[async_trait]
impl CounterRepository for MemoryStore {
    async fn recompute_chats_counts(&self) -> Result<u64, AppError> {
        let mut tables = self.tables.write();
        let mut actual: BTreeMap<i64, i64> = BTreeMap::new();
        for chat in tables.chats.values() {
            *actual.entry(chat.application_id).or_default() += 1;
        }

        let mut corrected = 0;
        for application in tables.applications.values_mut() {
            let count = actual.get(&application.id).copied().unwrap_or(0);
            if application.chats_count != count {
                application.chats_count = count;
                application.updated_at = Utc::now();
                corrected += 1;
            }
        }
        Ok(corrected)
    }

    async fn recompute_messages_counts(&self) -> Result<u64, AppError> {
        let mut tables = self.tables.write();
        let mut actual: BTreeMap<i64, i64> = BTreeMap::new();
        for message in tables.messages.values() {
            *actual.entry(message.chat_id).or_default() += 1;
        }

        let mut corrected = 0;
        for chat in tables.chats.values_mut() {
            let count = actual.get(&chat.id).copied().unwrap_or(0);
            if chat.messages_count != count {
                chat.messages_count = count;
                corrected += 1;
            }
        }
        Ok(corrected)
    }

    async fn sequence_floors(&self) -> Result<Vec<SequenceFloor>, AppError> {
        let tables = self.tables.read();
        let mut floors: BTreeMap<SequenceScope, i64> = BTreeMap::new();

        for chat in tables.chats.values() {
            let floor = floors
                .entry(SequenceScope::Application(chat.application_id))
                .or_default();
            *floor = (*floor).max(chat.chat_number);
        }
        for message in tables.messages.values() {
            let floor = floors.entry(SequenceScope::Chat(message.chat_id)).or_default();
            *floor = (*floor).max(message.message_number);
        }

        Ok(floors
            .into_iter()
            .map(|(scope, max_number)| SequenceFloor { scope, max_number })
            .collect())
    }
}
