//! Domain layer: identities, sessions, the delivery hub and its wire types.
//!
//! The hub and the session queue are the only concurrent state in the
//! service; everything else here is plain data.

pub mod envelope;
pub mod hub;
pub mod message;
pub mod session;
pub mod user_id;

pub use envelope::{Envelope, MESSAGE_EVENT, MessagePayload};
pub use hub::{Hub, HubConfig};
pub use message::{ConversationSummary, MessageRecord, preview};
pub use session::{Frame, Identity, Outbox, Session, SessionKey, SessionState};
pub use user_id::{SessionId, UserId};
