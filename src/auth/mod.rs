//! Authentication: turning request credentials into a verified identity.
//!
//! The delivery core only consumes the [`Authenticator`] contract; the
//! [`UserDirectory`] is the fixed-account implementation wired up by the
//! binary.

pub mod directory;
pub mod extract;

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};

use crate::domain::Identity;

pub use directory::{UserAccount, UserDirectory};
pub use extract::AuthUser;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Verified identity supplier, invoked once per request or upgrade attempt.
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// Returns the caller's identity, or `None` if the credentials are
    /// missing or invalid.
    fn authenticate(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Extracts the credential token from `Authorization: Bearer <token>` or,
/// failing that, from the [`SESSION_COOKIE`] cookie.
#[must_use]
pub fn credential_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|t| !t.is_empty())
}
