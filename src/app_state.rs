//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::config::SessionConfig;
use crate::domain::Hub;
use crate::service::MessageService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Delivery hub, shared with the message service.
    pub hub: Hub,
    /// Identity supplier for REST requests and WebSocket upgrades.
    pub authenticator: Arc<dyn Authenticator>,
    /// Message send/history orchestration.
    pub message_service: Arc<MessageService>,
    /// Per-connection WebSocket settings.
    pub session: SessionConfig,
}
