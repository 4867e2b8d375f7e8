//! User directory handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{UserListResponse, UserSummary};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::ErrorResponse;

/// `GET /users` — Everyone the caller can start a conversation with.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    summary = "List users",
    description = "Returns every user except the caller, ordered by id.",
    responses(
        (status = 200, description = "Other users", body = UserListResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_users(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let data = state
        .message_service
        .directory()
        .list_except(identity.user_id)
        .into_iter()
        .map(UserSummary::from)
        .collect();
    Json(UserListResponse { data })
}

/// User routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/users", get(list_users))
}
