//! Message service: validates, persists, then notifies.

use std::sync::Arc;

use crate::auth::UserDirectory;
use crate::domain::{
    ConversationSummary, Envelope, Hub, Identity, MessagePayload, MessageRecord, UserId, preview,
};
use crate::error::{AppError, ValidationError};
use crate::store::{MessageStore, NewMessage};

/// Maximum message length, in characters, after trimming.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Orchestration layer for sending and reading direct messages.
///
/// Every send follows the same order: validate → persist → notify the
/// recipient → notify the sender's own sessions. Notification happens only
/// after the store has accepted the record, so a client reacting to the
/// push and re-reading history always finds the message.
#[derive(Debug, Clone)]
pub struct MessageService {
    store: Arc<MessageStore>,
    directory: Arc<UserDirectory>,
    hub: Hub,
}

impl MessageService {
    /// Creates a new `MessageService`.
    #[must_use]
    pub fn new(store: Arc<MessageStore>, directory: Arc<UserDirectory>, hub: Hub) -> Self {
        Self {
            store,
            directory,
            hub,
        }
    }

    /// Returns a reference to the inner [`MessageStore`].
    #[must_use]
    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// The user directory used to resolve recipients and peers.
    #[must_use]
    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    /// Sends `content` from `sender` to `recipient_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for self-messages and empty or
    /// oversized content, and [`AppError::UserNotFound`] for an unknown
    /// recipient. Delivery problems are never errors: the message is
    /// stored and clients catch up from history.
    pub async fn send(
        &self,
        sender: &Identity,
        recipient_id: UserId,
        content: &str,
    ) -> Result<MessageRecord, AppError> {
        if recipient_id == sender.user_id {
            return Err(ValidationError::SelfMessage.into());
        }
        let content = validate_content(content)?;
        if self.directory.get(recipient_id).is_none() {
            return Err(AppError::UserNotFound(recipient_id));
        }

        let record = self
            .store
            .create(NewMessage {
                sender: sender.clone(),
                recipient_id,
                content: content.to_string(),
            })
            .await;

        tracing::info!(
            from = %record.sender_id,
            to = %record.recipient_id,
            message_id = record.id,
            "message sent"
        );

        self.push(&record, record.recipient_id);
        self.push(&record, record.sender_id);

        Ok(record)
    }

    /// Conversation between `viewer` and `other`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when `other` is the viewer and
    /// [`AppError::UserNotFound`] when `other` does not exist.
    pub async fn history(
        &self,
        viewer: UserId,
        other: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MessagePayload>, AppError> {
        if viewer == other {
            return Err(ValidationError::SelfMessage.into());
        }
        if self.directory.get(other).is_none() {
            return Err(AppError::UserNotFound(other));
        }
        let records = self.store.conversation(viewer, other, limit, offset).await;
        Ok(records
            .iter()
            .map(|r| MessagePayload::for_viewer(r, viewer))
            .collect())
    }

    /// One entry per conversation partner of `viewer`, most recent
    /// conversation first, with a shortened preview of the latest message.
    pub async fn conversations(&self, viewer: UserId) -> Vec<ConversationSummary> {
        let latest = self.store.conversations(viewer).await;
        latest
            .iter()
            .map(|record| {
                let peer = record.peer_of(viewer);
                let display_name = match self.directory.get(peer) {
                    Some(account) => account.display_name.clone(),
                    None if record.sender_id == peer => record.sender_display_name.clone(),
                    None => peer.to_string(),
                };
                ConversationSummary {
                    user_id: peer,
                    display_name,
                    last_message: preview(&record.content),
                    last_message_time: record.created_at,
                }
            })
            .collect()
    }

    /// Pushes `record` to every live session of `viewer`.
    ///
    /// A shed notification is only logged; the message is already stored
    /// and clients catch up from history.
    fn push(&self, record: &MessageRecord, viewer: UserId) {
        match Envelope::message(&MessagePayload::for_viewer(record, viewer)) {
            Ok(envelope) => {
                if !self.hub.notify(viewer, &envelope) {
                    tracing::debug!(
                        message_id = record.id,
                        user_id = %viewer,
                        "live delivery skipped, client will catch up from history"
                    );
                }
            }
            Err(e) => {
                tracing::error!(message_id = record.id, error = %e, "failed to build envelope");
            }
        }
    }
}

/// Trims `content` and checks it is 1–[`MAX_MESSAGE_CHARS`] characters.
///
/// # Errors
///
/// Returns [`ValidationError::MessageEmpty`] or
/// [`ValidationError::MessageTooLong`].
pub fn validate_content(content: &str) -> Result<&str, ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MessageEmpty);
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong {
            max: MAX_MESSAGE_CHARS,
        });
    }
    Ok(trimmed)
}
