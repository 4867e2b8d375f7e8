//! Axum extractor for authenticated requests.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::Identity;
use crate::error::AppError;

/// The verified caller of a request.
///
/// Rejects with [`AppError::Unauthorized`] before the handler runs when
/// the request carries no valid credentials.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .authenticator
            .authenticate(&parts.headers)
            .map(Self)
            .ok_or_else(|| {
                tracing::debug!(path = %parts.uri.path(), "rejecting unauthenticated request");
                AppError::Unauthorized
            })
    }
}
