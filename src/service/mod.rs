//! Service layer: business logic orchestration.

pub mod message_service;

pub use message_service::MessageService;
