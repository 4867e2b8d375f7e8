//! Presence handlers backed by the hub's liveness queries.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{OnlineUsersResponse, PresenceResponse};
use crate::api::extract::ApiPath;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::UserId;
use crate::error::{AppError, ErrorResponse};

/// `GET /presence/{user_id}` — Whether a user currently has live sessions.
///
/// # Errors
///
/// Returns [`AppError::Hub`] if the hub is not running.
#[utoipa::path(
    get,
    path = "/api/v1/presence/{user_id}",
    tag = "Presence",
    summary = "User presence",
    description = "Reports whether the user has at least one live WebSocket session, and how many.",
    params(
        ("user_id" = i64, Path, description = "User id"),
    ),
    responses(
        (status = 200, description = "Presence of the user", body = PresenceResponse),
        (status = 400, description = "Malformed user id", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 503, description = "Hub unavailable", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_presence(
    _caller: AuthUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = UserId::new(user_id);
    let sessions = state.hub.session_count(user_id).await?;
    Ok(Json(PresenceResponse {
        user_id,
        online: sessions > 0,
        sessions,
    }))
}

/// `GET /presence` — All users with live sessions.
///
/// # Errors
///
/// Returns [`AppError::Hub`] if the hub is not running.
#[utoipa::path(
    get,
    path = "/api/v1/presence",
    tag = "Presence",
    summary = "Online users",
    description = "Lists every user with at least one live WebSocket session.",
    responses(
        (status = 200, description = "Online users", body = OnlineUsersResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 503, description = "Hub unavailable", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_online(
    _caller: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let online = state.hub.online_users().await?;
    Ok(Json(OnlineUsersResponse { online }))
}

/// Presence routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/presence", get(list_online))
        .route("/presence/{user_id}", get(get_presence))
}
