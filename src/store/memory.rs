//! In-memory message store.

use std::collections::HashSet;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::{Identity, MessageRecord, UserId};

/// A message that has passed validation but is not stored yet.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Author.
    pub sender: Identity,
    /// Addressee.
    pub recipient_id: UserId,
    /// Trimmed, validated body.
    pub content: String,
}

#[derive(Debug, Default)]
struct Inner {
    last_id: i64,
    messages: Vec<MessageRecord>,
}

/// Append-only message log guarded by a [`tokio::sync::RwLock`].
#[derive(Debug, Default)]
pub struct MessageStore {
    inner: RwLock<Inner>,
}

impl MessageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists `message`, assigning the next id and the current time.
    ///
    /// The record is visible to [`MessageStore::conversation`] as soon as
    /// this returns.
    pub async fn create(&self, message: NewMessage) -> MessageRecord {
        let mut inner = self.inner.write().await;
        inner.last_id = inner.last_id.saturating_add(1);
        let record = MessageRecord {
            id: inner.last_id,
            sender_id: message.sender.user_id,
            sender_display_name: message.sender.display_name,
            recipient_id: message.recipient_id,
            content: message.content,
            created_at: Utc::now(),
        };
        inner.messages.push(record.clone());
        record
    }

    /// Messages exchanged between `a` and `b`, newest first.
    pub async fn conversation(
        &self,
        a: UserId,
        b: UserId,
        limit: usize,
        offset: usize,
    ) -> Vec<MessageRecord> {
        let inner = self.inner.read().await;
        inner
            .messages
            .iter()
            .rev()
            .filter(|m| m.is_between(a, b))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Latest message per conversation partner of `viewer`, newest
    /// conversation first.
    pub async fn conversations(&self, viewer: UserId) -> Vec<MessageRecord> {
        let inner = self.inner.read().await;
        let mut seen = HashSet::new();
        inner
            .messages
            .iter()
            .rev()
            .filter(|m| m.sender_id == viewer || m.recipient_id == viewer)
            .filter(|m| seen.insert(m.peer_of(viewer)))
            .cloned()
            .collect()
    }

    /// Total number of stored messages.
    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    /// Returns `true` if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.messages.is_empty()
    }
}
