//! Persisted direct message.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::UserId;

/// Content longer than this many characters is shortened in previews.
pub const PREVIEW_MAX_CHARS: usize = 50;

/// Characters kept before the ellipsis of a shortened preview.
const PREVIEW_KEEP_CHARS: usize = 47;

/// A message as stored by [`crate::store::MessageStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    /// Store-assigned id, strictly increasing.
    pub id: i64,
    /// Author.
    pub sender_id: UserId,
    /// Author's display name at send time.
    pub sender_display_name: String,
    /// Addressee.
    pub recipient_id: UserId,
    /// Trimmed message body.
    pub content: String,
    /// When the store accepted the message.
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Returns `true` if the message is between `a` and `b`, in either
    /// direction.
    #[must_use]
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.recipient_id == b)
            || (self.sender_id == b && self.recipient_id == a)
    }

    /// The participant other than `viewer`.
    #[must_use]
    pub fn peer_of(&self, viewer: UserId) -> UserId {
        if self.sender_id == viewer {
            self.recipient_id
        } else {
            self.sender_id
        }
    }
}

/// One entry of a user's conversation list: the other participant and the
/// latest message exchanged with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConversationSummary {
    /// The other participant.
    pub user_id: UserId,
    /// The other participant's display name.
    pub display_name: String,
    /// Latest message, shortened by [`preview`].
    pub last_message: String,
    /// When the latest message was stored.
    pub last_message_time: DateTime<Utc>,
}

/// Shortens `content` to 47 characters plus `...` when it is longer than
/// [`PREVIEW_MAX_CHARS`].
#[must_use]
pub fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_MAX_CHARS {
        return content.to_string();
    }
    let mut short: String = content.chars().take(PREVIEW_KEEP_CHARS).collect();
    short.push_str("...");
    short
}
