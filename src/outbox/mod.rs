// ============================================================================
// Transactional Outbox
// ============================================================================
//
// Domain events are never sent to the broker directly. They are staged as
// envelopes in the same transaction as the aggregate write that raised them,
// and the publisher delivers them later.
//
// ============================================================================

pub mod envelope;
pub mod event;
pub mod registry;
mod stage;

pub use envelope::Envelope;
pub use event::{DomainEvent, EventPayload, PayloadType, PendingEvents};
pub use registry::{EventRegistration, EventRegistry, EventRegistryBuilder};
pub use stage::Outbox;
