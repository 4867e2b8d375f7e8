//! User directory DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::UserAccount;
use crate::domain::UserId;

/// Public view of an account; the token is never included.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    /// User id.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Name shown to other users.
    pub display_name: String,
}

impl From<&UserAccount> for UserSummary {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            display_name: account.display_name.clone(),
        }
    }
}

/// Response body for `GET /users`.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    /// Every user except the caller, ordered by id.
    pub data: Vec<UserSummary>,
}
