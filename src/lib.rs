//! # wantok
//!
//! Self-hosted direct messaging for a small, fixed group of users, with
//! real-time delivery over WebSocket.
//!
//! Every message is stored first and pushed second: history is the source
//! of truth and a client that misses a push catches up by reading it.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── Authenticator (auth/)        bearer token or `session` cookie
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)             one Session per connection
//!     │
//!     ├── MessageService (service/)    validate → store → notify
//!     ├── Hub (domain/)                single control loop, per-user fan-out
//!     │
//!     └── MessageStore (store/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
pub mod ws;
