use uuid::Uuid;

use crate::outbox::PendingEvents;
use super::errors::CapabilityError;
use super::events::{CapabilityCreated, MemberJoinedCapability, MemberLeftCapability};

// ============================================================================
// Capability Aggregate
// ============================================================================
//
// Mutations validate, change state and raise an event. Raised events stay on
// the aggregate until the repository saves it and hands them to the caller.
//
// ============================================================================

#[derive(Debug)]
pub struct Capability {
    id: Uuid,
    name: String,
    description: String,
    members: Vec<String>,
    pending: PendingEvents,
}

impl Capability {
    pub fn create(name: &str, description: &str) -> Result<Self, CapabilityError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CapabilityError::EmptyName);
        }

        let mut capability = Self::restore(Uuid::new_v4(), name, description.trim(), Vec::new());
        capability
            .pending
            .push(Box::new(CapabilityCreated::new(capability.id, name)));

        Ok(capability)
    }

    /// Rebuild from stored state. Raises nothing.
    pub fn restore(id: Uuid, name: &str, description: &str, members: Vec<String>) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            members,
            pending: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn is_member(&self, member_email: &str) -> bool {
        self.members.iter().any(|m| m.eq_ignore_ascii_case(member_email))
    }

    pub fn join(&mut self, member_email: &str) -> Result<(), CapabilityError> {
        let email = member_email.trim();
        if email.is_empty() {
            return Err(CapabilityError::EmptyMemberEmail);
        }
        if self.is_member(email) {
            return Err(CapabilityError::AlreadyMember(email.to_string()));
        }

        self.members.push(email.to_string());
        self.pending
            .push(Box::new(MemberJoinedCapability::new(self.id, email)));
        Ok(())
    }

    pub fn leave(&mut self, member_email: &str) -> Result<(), CapabilityError> {
        let email = member_email.trim();
        if !self.is_member(email) {
            return Err(CapabilityError::NotAMember(email.to_string()));
        }

        self.members.retain(|m| !m.eq_ignore_ascii_case(email));
        self.pending
            .push(Box::new(MemberLeftCapability::new(self.id, email)));
        Ok(())
    }

    pub fn pending_events(&self) -> &PendingEvents {
        &self.pending
    }

    /// Drain raised events. Called by repositories on save.
    pub fn take_pending_events(&mut self) -> PendingEvents {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::{DomainEvent, EventPayload, PayloadType};

    #[test]
    fn test_create_raises_capability_created() {
        let mut capability = Capability::create("  Platform ", "Runs things").unwrap();

        assert_eq!(capability.name(), "Platform");
        let events = capability.take_pending_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload_type(), PayloadType::of::<CapabilityCreated>());
        assert_eq!(events[0].aggregate_id(), capability.id());
        assert!(capability.pending_events().is_empty());
    }

    #[test]
    fn test_create_rejects_blank_name() {
        assert_eq!(
            Capability::create("   ", "x").unwrap_err(),
            CapabilityError::EmptyName
        );
    }

    #[test]
    fn test_restore_raises_nothing() {
        let capability = Capability::restore(Uuid::new_v4(), "Ops", "", vec!["a@dfds.com".into()]);
        assert!(capability.pending_events().is_empty());
        assert!(capability.is_member("A@dfds.com"));
    }

    #[test]
    fn test_join_and_leave() {
        let mut capability = Capability::restore(Uuid::new_v4(), "Ops", "", Vec::new());

        capability.join("jane@dfds.com").unwrap();
        assert_eq!(
            capability.join("jane@dfds.com").unwrap_err(),
            CapabilityError::AlreadyMember("jane@dfds.com".into())
        );
        capability.leave("jane@dfds.com").unwrap();
        assert_eq!(
            capability.leave("jane@dfds.com").unwrap_err(),
            CapabilityError::NotAMember("jane@dfds.com".into())
        );

        let events = capability.take_pending_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload_type(), PayloadType::of::<MemberJoinedCapability>());
        assert_eq!(events[1].payload_type(), PayloadType::of::<MemberLeftCapability>());
    }

    #[test]
    fn test_join_rejects_blank_email() {
        let mut capability = Capability::restore(Uuid::new_v4(), "Ops", "", Vec::new());
        assert_eq!(capability.join(" ").unwrap_err(), CapabilityError::EmptyMemberEmail);
    }
}
