use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::capability::{Capability, CapabilityRepository};
use super::{CapabilityOperations, Recorded, ServiceError};

/// Capability use cases against a caller-owned transaction.
pub struct CapabilityService<R> {
    repository: R,
}

impl<R> CapabilityService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }
}

impl<R> CapabilityService<R> {
    async fn load<Tx: Send>(&self, tx: &mut Tx, capability_id: Uuid) -> Result<Capability, ServiceError>
    where
        R: CapabilityRepository<Tx>,
    {
        self.repository
            .get_by_id(tx, capability_id)
            .await?
            .ok_or(ServiceError::CapabilityNotFound(capability_id))
    }
}

#[async_trait]
impl<Tx, R> CapabilityOperations<Tx> for CapabilityService<R>
where
    Tx: Send + 'static,
    R: CapabilityRepository<Tx>,
{
    async fn create_capability(
        &self,
        tx: &mut Tx,
        name: &str,
        description: &str,
    ) -> Result<Recorded<Capability>, ServiceError> {
        let mut capability = Capability::create(name, description)?;
        let events = self.repository.save(tx, &mut capability).await?;

        tracing::debug!(capability_id = %capability.id(), name = %capability.name(), "Created capability");
        Ok(Recorded::new(capability, events))
    }

    async fn join_capability(
        &self,
        tx: &mut Tx,
        capability_id: Uuid,
        member_email: &str,
    ) -> Result<Recorded<()>, ServiceError> {
        let mut capability = self.load(tx, capability_id).await?;
        capability.join(member_email)?;
        let events = self.repository.save(tx, &mut capability).await?;
        Ok(Recorded::new((), events))
    }

    async fn leave_capability(
        &self,
        tx: &mut Tx,
        capability_id: Uuid,
        member_email: &str,
    ) -> Result<Recorded<()>, ServiceError> {
        let mut capability = self.load(tx, capability_id).await?;
        capability.leave(member_email)?;
        let events = self.repository.save(tx, &mut capability).await?;
        Ok(Recorded::new((), events))
    }

    async fn get_capability(&self, tx: &mut Tx, capability_id: Uuid) -> Result<Option<Capability>, ServiceError> {
        Ok(self.repository.get_by_id(tx, capability_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::CapabilityError;
    use crate::outbox::DomainEvent;
    use crate::storage::{InMemoryCapabilityRepository, InMemoryStorage, Storage};

    #[tokio::test]
    async fn test_operations_report_raised_events() {
        let storage = InMemoryStorage::new();
        let service = CapabilityService::new(InMemoryCapabilityRepository::new(storage.clone()));
        let mut tx = storage.begin().await.unwrap();

        let created = service.create_capability(&mut tx, "Payments", "Card rails").await.unwrap();
        assert_eq!(created.events.len(), 1);
        let id = created.value.id();

        let joined = service.join_capability(&mut tx, id, "jane@dfds.com").await.unwrap();
        assert_eq!(joined.events.len(), 1);
        assert_eq!(joined.events[0].aggregate_id(), id);

        let loaded = service.get_capability(&mut tx, id).await.unwrap().unwrap();
        assert_eq!(loaded.members(), ["jane@dfds.com".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_capability_and_domain_errors() {
        let storage = InMemoryStorage::new();
        let service = CapabilityService::new(InMemoryCapabilityRepository::new(storage.clone()));
        let mut tx = storage.begin().await.unwrap();
        let missing = Uuid::new_v4();

        let err = service.join_capability(&mut tx, missing, "a@b.c").await.err().unwrap();
        assert!(matches!(err, ServiceError::CapabilityNotFound(id) if id == missing));

        let id = service.create_capability(&mut tx, "Ops", "").await.unwrap().value.id();
        let err = service.leave_capability(&mut tx, id, "a@b.c").await.err().unwrap();
        assert!(matches!(err, ServiceError::Capability(CapabilityError::NotAMember(_))));
    }
}
