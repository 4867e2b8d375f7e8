//! Connection registry and fan-out coordinator.
//!
//! [`Hub`] is a handle to a single control-loop task that owns the
//! `user → sessions` map. Every operation (admit, remove, notify and the
//! read-only queries) is a command placed on one bounded mailbox and
//! processed in arrival order, so the map needs no lock and fan-out
//! decisions never race with admission or removal.
//!
//! Backpressure is shed, never absorbed:
//!
//! - A notification that finds the mailbox full is dropped and logged;
//!   [`Hub::notify`] never waits.
//! - A session whose private queue is full misses that envelope and is
//!   scheduled for removal by a separate task. Other sessions of the same
//!   user are unaffected.
//!
//! Queries, admissions and removals share the mailbox bound with
//! notifications. They wait for room instead of being shed, but while they
//! occupy slots a burst of them (for example heavy presence polling) can
//! cause concurrent notifications to be dropped. Messages are stored
//! before they are announced, so a dropped notification only delays
//! delivery until the client next reads history.
//!
//! The hub has no drain or shutdown procedure. The control loop stops
//! once every [`Hub`] handle has been dropped.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use super::session::{Frame, Session, SessionKey};
use super::{Envelope, SessionId, UserId};
use crate::error::HubError;

/// Default capacity of the hub mailbox.
pub const DEFAULT_INGRESS_CAPACITY: usize = 256;

/// Hub tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Capacity of the mailbox shared by all commands. Notifications are
    /// shed when it is full.
    pub ingress_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
        }
    }
}

#[derive(Debug)]
enum Command {
    Admit {
        session: Session,
        done: oneshot::Sender<()>,
    },
    Remove {
        key: SessionKey,
        done: Option<oneshot::Sender<bool>>,
    },
    Notify {
        user_id: UserId,
        frame: Frame,
    },
    SessionCount {
        user_id: UserId,
        reply: oneshot::Sender<usize>,
    },
    OnlineUsers {
        reply: oneshot::Sender<Vec<UserId>>,
    },
}

/// Cloneable handle to the registry control loop.
#[derive(Debug, Clone)]
pub struct Hub {
    mailbox: mpsc::Sender<Command>,
}

impl Hub {
    /// Creates the registry and spawns its control loop on the current
    /// Tokio runtime.
    #[must_use]
    pub fn spawn(config: HubConfig) -> Self {
        let (mailbox, inbox) = mpsc::channel(config.ingress_capacity.max(1));
        let state = HubState {
            sessions: HashMap::new(),
            mailbox: mailbox.downgrade(),
        };
        tokio::spawn(state.run(inbox));
        tracing::info!(
            ingress_capacity = config.ingress_capacity,
            "hub started"
        );
        Self { mailbox }
    }

    /// Admits `session` under its owner's user id.
    ///
    /// Returns once the control loop has processed the admission, so a
    /// following [`Hub::session_count`] already reflects it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the control loop is gone. The
    /// session is dropped, which closes its queue.
    pub async fn admit(&self, session: Session) -> Result<SessionKey, HubError> {
        let key = session.key();
        let (done, ack) = oneshot::channel();
        self.mailbox
            .send(Command::Admit { session, done })
            .await
            .map_err(|_| HubError::Closed)?;
        ack.await.map_err(|_| HubError::Closed)?;
        Ok(key)
    }

    /// Removes the session at `key`, closing its queue.
    ///
    /// Idempotent: returns `Ok(false)` when the session was never admitted
    /// or has already been removed.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the control loop is gone.
    pub async fn remove(&self, key: SessionKey) -> Result<bool, HubError> {
        let (done, ack) = oneshot::channel();
        self.mailbox
            .send(Command::Remove {
                key,
                done: Some(done),
            })
            .await
            .map_err(|_| HubError::Closed)?;
        ack.await.map_err(|_| HubError::Closed)
    }

    /// Queues `envelope` for every session `user_id` has at the moment the
    /// control loop processes the request.
    ///
    /// Never waits. The envelope is serialized once and shared by all
    /// target sessions. Returns `false` if the request was shed because
    /// the mailbox is full, the hub is gone, or serialization failed; a
    /// user with no sessions still yields `true`.
    pub fn notify(&self, user_id: UserId, envelope: &Envelope) -> bool {
        let frame: Frame = match serde_json::to_string(envelope) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::error!(%user_id, error = %e, "failed to serialize envelope");
                return false;
            }
        };

        match self.mailbox.try_send(Command::Notify { user_id, frame }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%user_id, kind = %envelope.kind, "hub mailbox full, dropping notification");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(%user_id, kind = %envelope.kind, "hub closed, dropping notification");
                false
            }
        }
    }

    /// Number of sessions currently admitted for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the control loop is gone.
    pub async fn session_count(&self, user_id: UserId) -> Result<usize, HubError> {
        let (reply, answer) = oneshot::channel();
        self.mailbox
            .send(Command::SessionCount { user_id, reply })
            .await
            .map_err(|_| HubError::Closed)?;
        answer.await.map_err(|_| HubError::Closed)
    }

    /// Whether `user_id` has at least one live session.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the control loop is gone.
    pub async fn is_online(&self, user_id: UserId) -> Result<bool, HubError> {
        Ok(self.session_count(user_id).await? > 0)
    }

    /// Users with at least one live session, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the control loop is gone.
    pub async fn online_users(&self) -> Result<Vec<UserId>, HubError> {
        let (reply, answer) = oneshot::channel();
        self.mailbox
            .send(Command::OnlineUsers { reply })
            .await
            .map_err(|_| HubError::Closed)?;
        answer.await.map_err(|_| HubError::Closed)
    }
}

/// State owned exclusively by the control loop.
struct HubState {
    sessions: HashMap<UserId, HashMap<SessionId, Session>>,
    /// Weak so that the loop does not keep its own mailbox open.
    mailbox: mpsc::WeakSender<Command>,
}

impl HubState {
    async fn run(mut self, mut inbox: mpsc::Receiver<Command>) {
        while let Some(command) = inbox.recv().await {
            self.handle(command);
        }
        tracing::info!(users = self.sessions.len(), "hub stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Admit { session, done } => {
                self.admit(session);
                let _ = done.send(());
            }
            Command::Remove { key, done } => {
                let removed = self.remove(key);
                if let Some(done) = done {
                    let _ = done.send(removed);
                }
            }
            Command::Notify { user_id, frame } => self.notify(user_id, &frame),
            Command::SessionCount { user_id, reply } => {
                let count = self.sessions.get(&user_id).map_or(0, HashMap::len);
                let _ = reply.send(count);
            }
            Command::OnlineUsers { reply } => {
                let mut users: Vec<UserId> = self.sessions.keys().copied().collect();
                users.sort_unstable();
                let _ = reply.send(users);
            }
        }
    }

    fn admit(&mut self, session: Session) {
        let user_id = session.user_id();
        let session_id = session.id();
        tracing::info!(
            %user_id,
            %session_id,
            display_name = session.display_name(),
            "client connected"
        );
        let user_sessions = self.sessions.entry(user_id).or_default();
        user_sessions.insert(session_id, session);
        tracing::debug!(%user_id, sessions = user_sessions.len(), "session admitted");
    }

    fn remove(&mut self, key: SessionKey) -> bool {
        let Some(user_sessions) = self.sessions.get_mut(&key.user_id) else {
            tracing::debug!(user_id = %key.user_id, session_id = %key.session_id, "remove: unknown user");
            return false;
        };
        let Some(mut session) = user_sessions.remove(&key.session_id) else {
            tracing::debug!(user_id = %key.user_id, session_id = %key.session_id, "remove: unknown session");
            return false;
        };
        session.close();
        if user_sessions.is_empty() {
            self.sessions.remove(&key.user_id);
        }
        tracing::info!(
            user_id = %key.user_id,
            session_id = %key.session_id,
            display_name = session.display_name(),
            "client disconnected"
        );
        true
    }

    fn notify(&self, user_id: UserId, frame: &Frame) {
        let Some(user_sessions) = self.sessions.get(&user_id) else {
            tracing::trace!(%user_id, "notify: user offline");
            return;
        };
        for session in user_sessions.values() {
            if !session.enqueue(Arc::clone(frame)) {
                tracing::warn!(
                    %user_id,
                    session_id = %session.id(),
                    "session queue full, disconnecting stalled client"
                );
                self.schedule_removal(session.key());
            }
        }
    }

    /// Removal goes back through the mailbox from another task; the loop
    /// must never wait on its own queue.
    fn schedule_removal(&self, key: SessionKey) {
        let Some(mailbox) = self.mailbox.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let _ = mailbox.send(Command::Remove { key, done: None }).await;
        });
    }
}
