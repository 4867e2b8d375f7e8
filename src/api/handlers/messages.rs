//! Direct message handlers: send, read a conversation, list conversations.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    ConversationListResponse, ConversationResponse, PageParams, SendMessageRequest,
};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{MessagePayload, UserId};
use crate::error::{AppError, ErrorResponse};

/// `POST /messages/{user_id}` — Send a message to another user.
///
/// The message is stored before any live session is notified. Both the
/// recipient's sessions and the sender's other sessions receive a
/// `"message"` envelope.
///
/// # Errors
///
/// Returns [`AppError`] on invalid content, self-messages, or an unknown
/// recipient.
#[utoipa::path(
    post,
    path = "/api/v1/messages/{user_id}",
    tag = "Messages",
    summary = "Send a direct message",
    description = "Stores the message, then pushes it to every live session of the recipient and of the sender.",
    params(
        ("user_id" = i64, Path, description = "Recipient user id"),
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = MessagePayload),
        (status = 400, description = "Malformed request, invalid content or self-message", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 404, description = "Recipient not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn send_message(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .message_service
        .send(&identity, UserId::new(user_id), &req.content)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessagePayload::for_viewer(&record, identity.user_id)),
    ))
}

/// `GET /messages/{user_id}` — Conversation with another user.
///
/// # Errors
///
/// Returns [`AppError`] when the other user does not exist or is the
/// caller.
#[utoipa::path(
    get,
    path = "/api/v1/messages/{user_id}",
    tag = "Messages",
    summary = "Read a conversation",
    description = "Returns messages exchanged with the given user, newest first.",
    params(
        ("user_id" = i64, Path, description = "Other participant's user id"),
        PageParams,
    ),
    responses(
        (status = 200, description = "Conversation page", body = ConversationResponse),
        (status = 400, description = "Malformed path or query", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_conversation(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let params = params.clamped();
    let data = state
        .message_service
        .history(
            identity.user_id,
            UserId::new(user_id),
            params.limit as usize,
            params.offset as usize,
        )
        .await?;

    Ok(Json(ConversationResponse {
        data,
        limit: params.limit,
        offset: params.offset,
    }))
}

/// `GET /conversations` — The caller's conversation list.
#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "Messages",
    summary = "List conversations",
    description = "One entry per user the caller has exchanged messages with, most recent first, with a preview of the latest message.",
    responses(
        (status = 200, description = "Conversation list", body = ConversationListResponse),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_conversations(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let data = state
        .message_service
        .conversations(identity.user_id)
        .await;
    Json(ConversationListResponse { data })
}

/// Message routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route(
            "/messages/{user_id}",
            get(get_conversation).post(send_message),
        )
}
