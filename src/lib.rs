//! Transactional outbox for the capability service.
//!
//! Capability operations stage their domain events as envelopes in the same
//! database transaction as the aggregate write. A background publisher sends
//! committed envelopes to Kafka in creation order and marks them published
//! once the broker acknowledged them.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod messaging;
pub mod metrics;
pub mod outbox;
pub mod publisher;
pub mod storage;
pub mod utils;

pub use error::OutboxError;
