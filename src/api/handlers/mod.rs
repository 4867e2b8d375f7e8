//! REST endpoint handlers organized by resource.

pub mod messages;
pub mod presence;
pub mod system;
pub mod users;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(messages::routes())
        .merge(presence::routes())
        .merge(users::routes())
}
