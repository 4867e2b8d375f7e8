//! Message persistence.
//!
//! The delivery core only requires that a message is durably recorded
//! before anyone is notified about it. [`MessageStore`] keeps records in
//! process memory, which satisfies that ordering for a single process.

pub mod memory;

pub use memory::{MessageStore, NewMessage};
