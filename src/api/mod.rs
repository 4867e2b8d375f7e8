//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` and `/ws`
//! live at the root.

pub mod dto;
pub mod extract;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST routes, the `/ws` upgrade endpoint,
/// tracing, CORS and request timeouts, bound to `state`.
///
/// With the `swagger-ui` feature the interactive docs are served at
/// `/swagger-ui` and the raw document at `/api-docs/openapi.json`.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    let timeout = TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout);

    let app = Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(timeout),
        )
        .with_state(state);

    #[cfg(feature = "swagger-ui")]
    let app = app.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    app
}

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "wantok",
        description = "Direct messages between a fixed group of users, with real-time delivery over WebSocket."
    ),
    paths(
        handlers::messages::send_message,
        handlers::messages::get_conversation,
        handlers::messages::list_conversations,
        handlers::users::list_users,
        handlers::presence::get_presence,
        handlers::presence::list_online,
        handlers::system::health_handler,
    ),
    components(schemas(
        crate::domain::MessagePayload,
        crate::domain::ConversationSummary,
        crate::domain::UserId,
        dto::SendMessageRequest,
        dto::ConversationResponse,
        dto::ConversationListResponse,
        dto::UserSummary,
        dto::UserListResponse,
        dto::PresenceResponse,
        dto::OnlineUsersResponse,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Messages", description = "Send and read direct messages"),
        (name = "Presence", description = "Live session presence"),
        (name = "Users", description = "The fixed user directory"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by the handlers.
#[derive(Debug)]
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::header::AUTHORIZATION;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{UserAccount, UserDirectory};
    use crate::config::SessionConfig;
    use crate::domain::{Hub, HubConfig};
    use crate::service::MessageService;
    use crate::store::MessageStore;

    fn make_app() -> Router {
        let Ok(accounts) = UserAccount::parse_list("1:alice:Alice:tok-a;2:bob:Bob:tok-b") else {
            panic!("valid users");
        };
        let directory = Arc::new(UserDirectory::new(accounts));
        let hub = Hub::spawn(HubConfig::default());
        let service = MessageService::new(
            Arc::new(MessageStore::new()),
            Arc::clone(&directory),
            hub.clone(),
        );
        let state = AppState {
            hub,
            authenticator: directory,
            message_service: Arc::new(service),
            session: SessionConfig::default(),
        };
        build_app(state, Duration::from_secs(5))
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let Ok(req) = builder.body(Body::from(body.unwrap_or_default().to_string())) else {
            panic!("valid request");
        };
        req
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("readable body");
        };
        let Ok(value) = serde_json::from_slice(&bytes) else {
            panic!("json body");
        };
        value
    }

    #[tokio::test]
    async fn health_is_public() {
        let Ok(response) = make_app().oneshot(request("GET", "/health", None, None)).await else {
            panic!("infallible");
        };
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["hub"], "up");
    }

    #[tokio::test]
    async fn rest_requires_credentials() {
        let app = make_app();
        for uri in ["/api/v1/presence", "/api/v1/messages/2"] {
            let Ok(response) = app.clone().oneshot(request("GET", uri, None, None)).await else {
                panic!("infallible");
            };
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
        let Ok(response) = app
            .oneshot(request("GET", "/api/v1/presence", Some("bogus"), None))
            .await
        else {
            panic!("infallible");
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn send_then_read_conversation() {
        let app = make_app();
        let Ok(response) = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/messages/2",
                Some("tok-a"),
                Some(r#"{"content":"  hello bob  "}"#),
            ))
            .await
        else {
            panic!("infallible");
        };
        assert_eq!(response.status(), StatusCode::CREATED);
        let sent = json_body(response).await;
        assert_eq!(sent["content"], "hello bob");
        assert_eq!(sent["is_sent"], true);

        let Ok(response) = app
            .oneshot(request("GET", "/api/v1/messages/1", Some("tok-b"), None))
            .await
        else {
            panic!("infallible");
        };
        assert_eq!(response.status(), StatusCode::OK);
        let page = json_body(response).await;
        assert_eq!(page["data"][0]["content"], "hello bob");
        assert_eq!(page["data"][0]["is_sent"], false);
        assert_eq!(page["data"][0]["sender_display_name"], "Alice");
    }

    #[tokio::test]
    async fn invalid_messages_are_rejected() {
        let app = make_app();
        let cases = [
            ("/api/v1/messages/2", r#"{"content":"   "}"#, StatusCode::BAD_REQUEST),
            ("/api/v1/messages/1", r#"{"content":"me"}"#, StatusCode::BAD_REQUEST),
            ("/api/v1/messages/99", r#"{"content":"hi"}"#, StatusCode::NOT_FOUND),
        ];
        for (uri, body, expected) in cases {
            let Ok(response) = app
                .clone()
                .oneshot(request("POST", uri, Some("tok-a"), Some(body)))
                .await
            else {
                panic!("infallible");
            };
            assert_eq!(response.status(), expected, "{uri} {body}");
        }
    }

    #[tokio::test]
    async fn presence_reports_offline_user() {
        let Ok(response) = make_app()
            .oneshot(request("GET", "/api/v1/presence/2", Some("tok-a"), None))
            .await
        else {
            panic!("infallible");
        };
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["online"], false);
        assert_eq!(body["sessions"], 0);
    }

    #[test]
    fn openapi_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/messages/{user_id}"));
        assert!(doc.paths.paths.contains_key("/api/v1/presence"));
        assert!(doc.paths.paths.contains_key("/api/v1/conversations"));
        assert!(doc.paths.paths.contains_key("/api/v1/users"));
        assert!(doc.paths.paths.contains_key("/health"));
        let Some(components) = doc.components else {
            panic!("components registered");
        };
        assert!(components.security_schemes.contains_key("bearer"));
    }

    #[tokio::test]
    async fn malformed_requests_use_json_error_body() {
        let app = make_app();
        let cases = [
            request("POST", "/api/v1/messages/2", Some("tok-a"), Some(r#"{"nope":1}"#)),
            request("POST", "/api/v1/messages/2", Some("tok-a"), Some("not json")),
            request("GET", "/api/v1/messages/abc", Some("tok-a"), None),
            request("GET", "/api/v1/messages/2?limit=lots", Some("tok-a"), None),
            request("GET", "/api/v1/presence/abc", Some("tok-a"), None),
        ];
        for req in cases {
            let uri = req.uri().to_string();
            let Ok(response) = app.clone().oneshot(req).await else {
                panic!("infallible");
            };
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body = json_body(response).await;
            assert_eq!(body["error"]["code"], 1001, "{uri}");
            assert!(body["error"]["message"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn conversations_list_latest_per_partner() {
        let app = make_app();
        for content in ["first", "second"] {
            let body = format!(r#"{{"content":"{content}"}}"#);
            let Ok(response) = app
                .clone()
                .oneshot(request("POST", "/api/v1/messages/2", Some("tok-a"), Some(&body)))
                .await
            else {
                panic!("infallible");
            };
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let Ok(response) = app
            .oneshot(request("GET", "/api/v1/conversations", Some("tok-b"), None))
            .await
        else {
            panic!("infallible");
        };
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let Some(entries) = body["data"].as_array() else {
            panic!("data array");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(body["data"][0]["user_id"], 1);
        assert_eq!(body["data"][0]["display_name"], "Alice");
        assert_eq!(body["data"][0]["last_message"], "second");
        assert!(body["data"][0]["last_message_time"].is_string());
    }

    #[tokio::test]
    async fn users_list_excludes_caller_and_tokens() {
        let Ok(response) = make_app()
            .oneshot(request("GET", "/api/v1/users", Some("tok-a"), None))
            .await
        else {
            panic!("infallible");
        };
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(
            body,
            serde_json::json!({
                "data": [{ "id": 2, "username": "bob", "display_name": "Bob" }]
            })
        );
    }
}
