//! Presence DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::UserId;

/// Response body for `GET /presence/{user_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PresenceResponse {
    /// User the answer is about.
    pub user_id: UserId,
    /// Whether the user has at least one live session.
    pub online: bool,
    /// Number of live sessions (devices or tabs).
    pub sessions: usize,
}

/// Response body for `GET /presence`.
#[derive(Debug, Serialize, ToSchema)]
pub struct OnlineUsersResponse {
    /// Users with at least one live session, ascending.
    pub online: Vec<UserId>,
}
