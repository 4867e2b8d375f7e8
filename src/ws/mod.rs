//! WebSocket layer: the upgrade entry point and per-connection loops.
//!
//! The endpoint at `/ws` is push-only: clients receive envelopes and
//! answer pings; anything else they send is ignored.

pub mod connection;
pub mod handler;
