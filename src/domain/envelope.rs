//! Wire envelope pushed to live sessions.
//!
//! Every frame written to a client is an [`Envelope`]: a `type`
//! discriminator plus an event-specific `payload`. Envelopes are
//! fire-and-forget; the hub keeps no record of them once queued.
//!
//! ```json
//! { "type": "message", "payload": { "id": 12, "content": "hi", ... } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MessageRecord, UserId};

/// Discriminator used for new-message events.
pub const MESSAGE_EVENT: &str = "message";

/// Typed unit of delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event discriminator (e.g. `"message"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Event-specific payload.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope from a discriminator and an already-built payload.
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Builds a `"message"` envelope carrying `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the payload cannot be converted to
    /// a JSON value.
    pub fn message(payload: &MessagePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::new(MESSAGE_EVENT, serde_json::to_value(payload)?))
    }
}

/// Payload of a `"message"` envelope.
///
/// Mirrors the persisted record so the client can render it without a
/// follow-up fetch. `is_sent` is `true` on the copy delivered to the
/// sender's own devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessagePayload {
    /// Message id assigned by the store.
    pub id: i64,
    /// Author of the message.
    pub sender_id: UserId,
    /// Author's display name at send time.
    pub sender_display_name: String,
    /// Addressee of the message.
    pub recipient_id: UserId,
    /// Message body.
    pub content: String,
    /// Persistence timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether the viewing user is the author.
    pub is_sent: bool,
}

impl MessagePayload {
    /// Builds the payload for `record` as seen by `viewer`.
    #[must_use]
    pub fn for_viewer(record: &MessageRecord, viewer: UserId) -> Self {
        Self {
            id: record.id,
            sender_id: record.sender_id,
            sender_display_name: record.sender_display_name.clone(),
            recipient_id: record.recipient_id,
            content: record.content.clone(),
            created_at: record.created_at,
            is_sent: record.sender_id == viewer,
        }
    }
}
