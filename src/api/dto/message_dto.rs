//! Message DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ConversationSummary, MessagePayload};

/// Request body for `POST /messages/{user_id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Message body; surrounding whitespace is trimmed.
    pub content: String,
}

/// Response body for `GET /messages/{user_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationResponse {
    /// Messages, newest first.
    pub data: Vec<MessagePayload>,
    /// Limit that was applied.
    pub limit: u32,
    /// Offset that was applied.
    pub offset: u32,
}

/// Response body for `GET /conversations`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationListResponse {
    /// One entry per conversation partner, most recent first.
    pub data: Vec<ConversationSummary>,
}
