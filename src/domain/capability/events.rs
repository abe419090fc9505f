use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OutboxError;
use crate::outbox::{DomainEvent, EventRegistry};

// ============================================================================
// Capability Events
// ============================================================================

pub const CAPABILITIES_TOPIC: &str = "build.capabilities";

/// Capability Created - a new capability exists
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityCreated {
    pub event_id: Uuid,
    pub capability_id: Uuid,
    pub capability_name: String,
}

impl CapabilityCreated {
    pub fn new(capability_id: Uuid, capability_name: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            capability_id,
            capability_name: capability_name.into(),
        }
    }
}

impl DomainEvent for CapabilityCreated {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.capability_id
    }
}

/// Member Joined Capability
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberJoinedCapability {
    pub event_id: Uuid,
    pub capability_id: Uuid,
    pub member_email: String,
}

impl MemberJoinedCapability {
    pub fn new(capability_id: Uuid, member_email: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            capability_id,
            member_email: member_email.into(),
        }
    }
}

impl DomainEvent for MemberJoinedCapability {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.capability_id
    }
}

/// Member Left Capability
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberLeftCapability {
    pub event_id: Uuid,
    pub capability_id: Uuid,
    pub member_email: String,
}

impl MemberLeftCapability {
    pub fn new(capability_id: Uuid, member_email: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            capability_id,
            member_email: member_email.into(),
        }
    }
}

impl DomainEvent for MemberLeftCapability {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.capability_id
    }
}

/// The registry used by the capability service process.
pub fn capability_event_registry() -> Result<EventRegistry, OutboxError> {
    Ok(EventRegistry::builder()
        .register::<CapabilityCreated>("capabilitycreated", CAPABILITIES_TOPIC)?
        .register::<MemberJoinedCapability>("memberjoinedcapability", CAPABILITIES_TOPIC)?
        .register::<MemberLeftCapability>("memberleftcapability", CAPABILITIES_TOPIC)?
        .build())
}
