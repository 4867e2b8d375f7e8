//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).
//!
//! | Variable                 | Default        |
//! |--------------------------|----------------|
//! | `LISTEN_ADDR`            | `0.0.0.0:8080` |
//! | `HUB_INGRESS_CAPACITY`   | `256`          |
//! | `SESSION_QUEUE_CAPACITY` | `256`          |
//! | `WS_WRITE_WAIT_SECS`     | `10`           |
//! | `WS_PONG_WAIT_SECS`      | `60`           |
//! | `WS_MAX_FRAME_SIZE`      | `512`          |
//! | `REQUEST_TIMEOUT_SECS`   | `30`           |
//! | `USERS`                  | empty          |
//!
//! `WS_WRITE_WAIT_SECS` and `WS_PONG_WAIT_SECS` are clamped to 1..=3600.
//!
//! `USERS` lists the fixed set of accounts as `id:username:display:token`
//! entries separated by `;`.

use std::net::SocketAddr;
use std::time::Duration;

use crate::auth::UserAccount;
use crate::domain::HubConfig;

/// Shortest accepted write or pong wait, in seconds.
const MIN_WAIT_SECS: u64 = 1;
/// Longest accepted write or pong wait, in seconds.
const MAX_WAIT_SECS: u64 = 3600;

/// Configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `LISTEN_ADDR` is not a socket address.
    #[error("invalid LISTEN_ADDR: {0}")]
    ListenAddr(#[from] std::net::AddrParseError),

    /// A `USERS` entry is malformed.
    #[error("invalid USERS entry {entry:?}: {reason}")]
    UserEntry {
        /// The offending entry.
        entry: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Per-connection timing and sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Capacity of each session's outbound queue.
    pub queue_capacity: usize,
    /// Deadline for a single write (envelope or ping).
    pub write_wait: Duration,
    /// How long the read side waits for a pong before giving up.
    pub pong_wait: Duration,
    /// Largest inbound frame accepted from a client, in bytes.
    pub max_frame_size: usize,
}

impl SessionConfig {
    /// Interval between pings: nine tenths of [`SessionConfig::pong_wait`],
    /// so a ping always lands before the read deadline.
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        (self.pong_wait / 10 * 9).max(Duration::from_millis(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(60),
            max_frame_size: 512,
        }
    }
}

/// Top-level server configuration.
///
/// Loaded once at startup via [`ServerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    /// Delivery hub settings.
    pub hub: HubConfig,
    /// Per-connection settings.
    pub session: SessionConfig,
    /// Timeout applied to plain HTTP requests.
    pub request_timeout: Duration,
    /// The fixed user directory.
    pub users: Vec<UserAccount>,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` first to optionally load a `.env`
    /// file, then falls back to defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `LISTEN_ADDR` or `USERS` is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `LISTEN_ADDR` or `USERS` is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()?;

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            queue_capacity: parse_var(&lookup, "SESSION_QUEUE_CAPACITY", defaults.queue_capacity),
            write_wait: wait_var(&lookup, "WS_WRITE_WAIT_SECS", 10),
            pong_wait: wait_var(&lookup, "WS_PONG_WAIT_SECS", 60),
            max_frame_size: parse_var(&lookup, "WS_MAX_FRAME_SIZE", defaults.max_frame_size),
        };

        let hub = HubConfig {
            ingress_capacity: parse_var(
                &lookup,
                "HUB_INGRESS_CAPACITY",
                HubConfig::default().ingress_capacity,
            ),
        };

        let request_timeout = Duration::from_secs(parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 30));

        let users = match lookup("USERS") {
            Some(list) => UserAccount::parse_list(&list)?,
            None => Vec::new(),
        };

        Ok(Self {
            listen_addr,
            hub,
            session,
            request_timeout,
            users,
        })
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Reads a wait in whole seconds, clamped to the accepted range.
fn wait_var(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Duration {
    Duration::from_secs(parse_var(lookup, key, default).clamp(MIN_WAIT_SECS, MAX_WAIT_SECS))
}
