//! One live connection bound to one authenticated user.
//!
//! A [`Session`] is the hub-side half of a connection: it carries the
//! user's identity and the producer end of a private bounded queue. The
//! consumer end, the [`Outbox`], belongs to the connection's outbound
//! loop. Once admitted, the hub is the only producer and the outbound loop
//! the only consumer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::{SessionId, UserId};

/// A serialized envelope ready to be written to a transport.
///
/// Serialized once per notification and shared by every session of the
/// target user.
pub type Frame = Arc<str>;

/// Verified identity produced by an [`crate::auth::Authenticator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user id.
    pub user_id: UserId,
    /// Human-readable name, used for logging only.
    pub display_name: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }
}

/// Address of an admitted session inside the hub: its owner plus its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    /// Owner of the session.
    pub user_id: UserId,
    /// The session itself.
    pub session_id: SessionId,
}

/// Hub-side handle of one live connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    identity: Identity,
    sender: Option<mpsc::Sender<Frame>>,
}

impl Session {
    /// Creates a session with a private queue of `capacity` frames.
    ///
    /// Returns the session (to be admitted to the hub) and the consumer end
    /// of its queue (to be drained by the outbound loop). A capacity of
    /// zero is treated as one.
    #[must_use]
    pub fn new(identity: Identity, capacity: usize) -> (Self, Outbox) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = SessionId::new();
        let session = Self {
            id,
            identity,
            sender: Some(sender),
        };
        let outbox = Outbox {
            session_id: id,
            receiver,
        };
        (session, outbox)
    }

    /// Returns this session's id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the owner of this session.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    /// Returns the owner's display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.identity.display_name
    }

    /// Returns the key under which the hub stores this session.
    #[must_use]
    pub const fn key(&self) -> SessionKey {
        SessionKey {
            user_id: self.identity.user_id,
            session_id: self.id,
        }
    }

    /// Offers a frame to the outbound queue without waiting.
    ///
    /// Returns `false` when the queue is full, when the outbound loop has
    /// already gone away, or when the session was closed. The hub treats
    /// `false` as a stalled consumer.
    pub fn enqueue(&self, frame: Frame) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => false,
        }
    }

    /// Closes the outbound queue. Calling it again does nothing.
    ///
    /// Frames already queued are still delivered; the outbound loop then
    /// sees the end of the queue and shuts the transport down.
    pub fn close(&mut self) {
        self.sender = None;
    }

    /// Returns `true` once [`Session::close`] has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.sender.is_none()
    }
}

/// Consumer end of a session's outbound queue.
#[derive(Debug)]
pub struct Outbox {
    session_id: SessionId,
    receiver: mpsc::Receiver<Frame>,
}

impl Outbox {
    /// Id of the session feeding this outbox.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Waits for the next frame. `None` means the queue was closed.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Takes a frame if one is immediately available.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

/// Lifecycle of a connection.
///
/// `Connecting → Admitted → Closing → Closed`; there is no way back, a
/// reconnect always creates a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport upgraded, not yet admitted to the hub.
    Connecting,
    /// Admitted and receiving notifications.
    Admitted,
    /// One of the loops hit a terminal condition.
    Closing,
    /// Both loops exited and the transport is released.
    Closed,
}

/// Attempted to move a [`SessionState`] along an edge that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    /// State before the attempted transition.
    pub from: SessionState,
    /// Rejected target state.
    pub to: SessionState,
}

impl SessionState {
    /// Moves to `next` if the lifecycle allows it.
    ///
    /// A connection that fails before admission may go straight from
    /// `Connecting` to `Closing`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for any other edge.
    pub const fn advance(self, next: Self) -> Result<Self, InvalidTransition> {
        match (self, next) {
            (Self::Connecting, Self::Admitted | Self::Closing)
            | (Self::Admitted, Self::Closing)
            | (Self::Closing, Self::Closed) => Ok(next),
            _ => Err(InvalidTransition {
                from: self,
                to: next,
            }),
        }
    }
}
