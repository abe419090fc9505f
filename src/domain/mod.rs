// ============================================================================
// Domain Layer
// ============================================================================
//
// Aggregates and the events they raise. Nothing in here knows about the
// outbox table or the broker.
//
// ============================================================================

pub mod capability;
