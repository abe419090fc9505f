use crate::error::OutboxError;
use super::event::{DomainEvent, PayloadType};

// ============================================================================
// Event Registry
// ============================================================================
//
// Startup-time table mapping an event's kind tag to its topic and payload
// type. Built once through `EventRegistryBuilder`, then shared read-only
// (usually behind an `Arc`) by the outbox and anything else that needs it.
//
// Kind tags and payload types are unique: a second registration for either
// is rejected when it is made, never resolved later by picking one.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRegistration {
    pub kind_tag: String,
    pub payload_type: PayloadType,
    pub topic: String,
}

#[derive(Debug, Default)]
pub struct EventRegistry {
    registrations: Vec<EventRegistration>,
}

impl EventRegistry {
    pub fn builder() -> EventRegistryBuilder {
        EventRegistryBuilder::default()
    }

    pub fn registrations(&self) -> impl Iterator<Item = &EventRegistration> {
        self.registrations.iter()
    }

    pub fn is_registered(&self, payload_type: PayloadType) -> bool {
        self.registrations
            .iter()
            .any(|r| r.payload_type == payload_type)
    }

    pub fn topic_for(&self, kind_tag: &str) -> Result<&str, OutboxError> {
        self.registrations
            .iter()
            .find(|r| r.kind_tag == kind_tag)
            .map(|r| r.topic.as_str())
            .ok_or_else(|| OutboxError::UnregisteredEventKind(kind_tag.to_string()))
    }

    pub fn kind_tag_for(&self, event: &dyn DomainEvent) -> Result<&str, OutboxError> {
        let payload_type = event.payload_type();
        self.registrations
            .iter()
            .find(|r| r.payload_type == payload_type)
            .map(|r| r.kind_tag.as_str())
            .ok_or_else(|| OutboxError::UnregisteredEventKind(payload_type.name().to_string()))
    }
}

#[derive(Debug, Default)]
pub struct EventRegistryBuilder {
    registrations: Vec<EventRegistration>,
}

impl EventRegistryBuilder {
    pub fn register<E: DomainEvent + 'static>(
        self,
        kind_tag: &str,
        topic: &str,
    ) -> Result<Self, OutboxError> {
        self.register_type(kind_tag, topic, PayloadType::of::<E>())
    }

    pub fn register_type(
        mut self,
        kind_tag: &str,
        topic: &str,
        payload_type: PayloadType,
    ) -> Result<Self, OutboxError> {
        let duplicate = self
            .registrations
            .iter()
            .any(|r| r.kind_tag == kind_tag || r.payload_type == payload_type);

        if duplicate {
            return Err(OutboxError::DuplicateRegistration {
                kind_tag: kind_tag.to_string(),
                payload_type: payload_type.name(),
            });
        }

        self.registrations.push(EventRegistration {
            kind_tag: kind_tag.to_string(),
            payload_type,
            topic: topic.to_string(),
        });

        Ok(self)
    }

    pub fn build(self) -> EventRegistry {
        EventRegistry {
            registrations: self.registrations,
        }
    }
}
