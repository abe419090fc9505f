use serde::Serialize;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

// ============================================================================
// Domain Events
// ============================================================================
//
// A domain event is an immutable fact raised once by an aggregate operation.
// The outbox only ever sees events through `dyn DomainEvent`, so everything
// it needs (identity, payload type, serialized form) is reachable from the
// trait object.
//
// ============================================================================

/// Identifies the in-process type of an event payload.
#[derive(Clone, Copy)]
pub struct PayloadType {
    id: TypeId,
    name: &'static str,
}

impl PayloadType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for PayloadType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PayloadType {}

impl Hash for PayloadType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Serialization half of a domain event. Implemented for every
/// `Serialize + 'static` type.
pub trait EventPayload {
    fn payload_type(&self) -> PayloadType;

    /// Deterministic JSON for the event; field order follows the struct.
    fn to_payload(&self) -> Result<String, serde_json::Error>;
}

impl<T: Serialize + 'static> EventPayload for T {
    fn payload_type(&self) -> PayloadType {
        PayloadType::of::<T>()
    }

    fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub trait DomainEvent: EventPayload + fmt::Debug + Send + Sync {
    fn event_id(&self) -> Uuid;

    /// The aggregate this event is about. Used as the broker record key.
    fn aggregate_id(&self) -> Uuid;
}

/// Events raised by an operation and not yet staged.
pub type PendingEvents = Vec<Box<dyn DomainEvent>>;
